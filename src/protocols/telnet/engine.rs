//! Per-session telnet engine.
//!
//! Decodes inbound bytes into [`Event`]s and encodes outbound text. Nothing
//! here touches a socket: bytes that must go on the wire are queued as
//! [`Event::Send`] and written by whoever drains the engine.

use super::parser::{Parser, Token, Verb, IAC, SB, SE, TELOPT_COMPRESS2};
use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, trace};

/// Something the owner of the engine has to act on.
#[derive(Debug)]
pub enum Event {
    /// A line received from the client, terminator included.
    Data(Bytes),
    /// The client negotiated an option. Replies have already been queued.
    Negotiate { verb: Verb, option: u8 },
    /// Encoded bytes ready to be written to the transport.
    Send(Bytes),
    /// The session can no longer be driven.
    Error(TelnetError),
}

#[derive(Debug)]
pub enum TelnetError {
    SubnegotiationOverflow,
    Compression(io::Error),
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::SubnegotiationOverflow => write!(f, "subnegotiation buffer overflow"),
            TelnetError::Compression(e) => write!(f, "compression failed: {e}"),
        }
    }
}

impl std::error::Error for TelnetError {}

pub struct Engine {
    parser: Parser,
    tokens: Vec<Token>,
    events: VecDeque<Event>,
    /// COMPRESS2 agreed with the client.
    compress2: bool,
    /// We sent `WILL COMPRESS2` and wait for the answer.
    offered: bool,
    deflate: Option<ZlibEncoder<Vec<u8>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            tokens: Vec::new(),
            events: VecDeque::new(),
            compress2: false,
            offered: false,
            deflate: None,
        }
    }

    /// Decode bytes received from the client.
    pub fn feed(&mut self, input: &[u8]) {
        let mut tokens = std::mem::take(&mut self.tokens);
        self.parser.parse(input, &mut tokens);

        for token in tokens.drain(..) {
            match token {
                Token::Line(line) => self.events.push_back(Event::Data(line)),
                Token::Negotiation(verb, option) => self.negotiation(verb, option),
                Token::Subnegotiation(option, payload) => {
                    trace!(option, len = payload.len(), "Ignoring subnegotiation");
                }
                Token::Overflow => self
                    .events
                    .push_back(Event::Error(TelnetError::SubnegotiationOverflow)),
            }
        }

        self.tokens = tokens;
    }

    /// Next pending event, in the order they were produced.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Queue text for the client.
    ///
    /// `\n` becomes `\r\n`, a bare `\r` becomes `\r\0`.
    pub fn send_text(&mut self, text: &str) {
        self.send_data(text.as_bytes());
    }

    /// Queue arbitrary data for the client, escaping IAC.
    pub fn send_data(&mut self, data: &[u8]) {
        let mut encoded = BytesMut::with_capacity(data.len() + 8);
        for &byte in data {
            match byte {
                b'\n' => encoded.extend_from_slice(b"\r\n"),
                b'\r' => encoded.extend_from_slice(b"\r\0"),
                IAC => encoded.extend_from_slice(&[IAC, IAC]),
                _ => encoded.put_u8(byte),
            }
        }
        self.send(&encoded);
    }

    /// Advertise COMPRESS2 to the client.
    pub fn offer_compress2(&mut self) {
        if self.compress2 || self.offered {
            return;
        }
        self.offered = true;
        self.negotiate(Verb::Will, TELOPT_COMPRESS2);
    }

    /// Start the compressed stream. Everything sent afterwards is deflated.
    pub fn begin_compress2(&mut self) {
        if self.deflate.is_some() {
            return;
        }
        self.send(&[IAC, SB, TELOPT_COMPRESS2, IAC, SE]);
        self.deflate = Some(ZlibEncoder::new(Vec::new(), Compression::default()));
        debug!("Compression started");
    }

    pub fn is_compressing(&self) -> bool {
        self.deflate.is_some()
    }

    fn end_compress2(&mut self) {
        if let Some(encoder) = self.deflate.take() {
            match encoder.finish() {
                Ok(tail) => self.events.push_back(Event::Send(Bytes::from(tail))),
                Err(e) => self.events.push_back(Event::Error(TelnetError::Compression(e))),
            }
        }
    }

    fn negotiation(&mut self, verb: Verb, option: u8) {
        match (verb, option) {
            (Verb::Do, TELOPT_COMPRESS2) => {
                let was_offered = std::mem::replace(&mut self.offered, false);
                if self.compress2 {
                    return;
                }
                self.compress2 = true;
                if !was_offered {
                    self.negotiate(Verb::Will, TELOPT_COMPRESS2);
                }
            }
            (Verb::Dont, TELOPT_COMPRESS2) => {
                self.offered = false;
                if !self.compress2 {
                    return;
                }
                self.compress2 = false;
                self.end_compress2();
                self.negotiate(Verb::Wont, TELOPT_COMPRESS2);
            }
            (Verb::Do, _) => self.negotiate(Verb::Wont, option),
            (Verb::Will, _) => self.negotiate(Verb::Dont, option),
            (Verb::Dont, _) | (Verb::Wont, _) => {}
        }
        self.events.push_back(Event::Negotiate { verb, option });
    }

    fn negotiate(&mut self, verb: Verb, option: u8) {
        self.send(&[IAC, verb.byte(), option]);
    }

    fn send(&mut self, bytes: &[u8]) {
        let Some(encoder) = self.deflate.as_mut() else {
            self.events.push_back(Event::Send(Bytes::copy_from_slice(bytes)));
            return;
        };

        // Sync flush so the client can inflate every write on arrival.
        match encoder.write_all(bytes).and_then(|_| encoder.flush()) {
            Ok(()) => {
                let deflated = std::mem::take(encoder.get_mut());
                self.events.push_back(Event::Send(Bytes::from(deflated)));
            }
            Err(e) => {
                self.deflate = None;
                self.events.push_back(Event::Error(TelnetError::Compression(e)));
            }
        }
    }
}

impl fmt::Write for Engine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.send_text(s);
        Ok(())
    }
}
