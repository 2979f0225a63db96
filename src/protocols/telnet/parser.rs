//! Telnet inbound parser.
//!
//! Splits the raw byte stream into IAC commands and user data, and frames the
//! data into lines. Terminators `\r\n`, `\r\0` and a bare `\n` are all
//! normalized to `\r\n`.

use bytes::{BufMut, Bytes, BytesMut};

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

/// MUD Client Compression Protocol v2.
pub const TELOPT_COMPRESS2: u8 = 86;

/// Bytes a single line may occupy, terminator included.
pub const LINE_CAPACITY: usize = 256;

/// Largest subnegotiation payload accepted from a client.
pub const SUBNEG_CAPACITY: usize = 256;

/// Option negotiation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

impl Verb {
    fn from_byte(byte: u8) -> Option<Verb> {
        match byte {
            WILL => Some(Verb::Will),
            WONT => Some(Verb::Wont),
            DO => Some(Verb::Do),
            DONT => Some(Verb::Dont),
            _ => None,
        }
    }

    /// Wire value of the verb.
    pub fn byte(self) -> u8 {
        match self {
            Verb::Will => WILL,
            Verb::Wont => WONT,
            Verb::Do => DO,
            Verb::Dont => DONT,
        }
    }
}

/// Unit produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A complete line ending in `\r\n`, or a truncated line with no
    /// terminator when the line buffer filled up.
    Line(Bytes),
    Negotiation(Verb, u8),
    Subnegotiation(u8, Bytes),
    /// Subnegotiation payload exceeded `SUBNEG_CAPACITY`.
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(Verb),
    SbOption,
    Sb,
    SbIac,
}

pub struct Parser {
    state: State,
    line: BytesMut,
    /// Previous data byte was CR; a following LF or NUL belongs to it.
    pending_cr: bool,
    /// Dropping the tail of an overlong line up to its terminator.
    discarding: bool,
    sb_option: u8,
    sb: BytesMut,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            line: BytesMut::with_capacity(LINE_CAPACITY),
            pending_cr: false,
            discarding: false,
            sb_option: 0,
            sb: BytesMut::new(),
        }
    }

    /// Parse `input`, appending every complete token to `out`.
    ///
    /// Partial lines and partial IAC sequences are kept until the next call.
    pub fn parse(&mut self, input: &[u8], out: &mut Vec<Token>) {
        for &byte in input {
            self.step(byte, out);
        }
    }

    fn step(&mut self, byte: u8, out: &mut Vec<Token>) {
        match self.state {
            State::Data => {
                if byte == IAC {
                    self.state = State::Iac;
                } else {
                    self.data(byte, out);
                }
            }
            State::Iac => self.command(byte, out),
            State::Negotiate(verb) => {
                out.push(Token::Negotiation(verb, byte));
                self.state = State::Data;
            }
            State::SbOption => {
                self.sb_option = byte;
                self.sb.clear();
                self.state = State::Sb;
            }
            State::Sb => {
                if byte == IAC {
                    self.state = State::SbIac;
                } else {
                    self.sb_byte(byte, out);
                }
            }
            State::SbIac => match byte {
                SE => {
                    out.push(Token::Subnegotiation(self.sb_option, self.sb.split().freeze()));
                    self.state = State::Data;
                }
                IAC => {
                    self.state = State::Sb;
                    self.sb_byte(IAC, out);
                }
                _ => {
                    // Unterminated subnegotiation: close it and treat the
                    // byte as the command following IAC.
                    out.push(Token::Subnegotiation(self.sb_option, self.sb.split().freeze()));
                    self.command(byte, out);
                }
            },
        }
    }

    /// Byte following an IAC outside of a subnegotiation.
    fn command(&mut self, byte: u8, out: &mut Vec<Token>) {
        self.state = State::Data;
        match byte {
            IAC => self.data(IAC, out),
            SB => self.state = State::SbOption,
            _ => {
                if let Some(verb) = Verb::from_byte(byte) {
                    self.state = State::Negotiate(verb);
                }
                // NOP, GA, AYT and friends carry nothing for a line shell.
            }
        }
    }

    fn sb_byte(&mut self, byte: u8, out: &mut Vec<Token>) {
        if self.sb.len() >= SUBNEG_CAPACITY {
            self.sb.clear();
            self.state = State::Data;
            out.push(Token::Overflow);
            return;
        }
        self.sb.put_u8(byte);
    }

    fn data(&mut self, byte: u8, out: &mut Vec<Token>) {
        if self.pending_cr {
            self.pending_cr = false;
            if byte == b'\n' || byte == 0 {
                return;
            }
        }

        match byte {
            b'\r' => {
                self.pending_cr = true;
                self.terminate(out);
            }
            b'\n' => self.terminate(out),
            _ => {
                if self.discarding {
                    return;
                }
                if self.line.len() >= LINE_CAPACITY - 2 {
                    out.push(Token::Line(self.line.split().freeze()));
                    self.discarding = true;
                    return;
                }
                self.line.put_u8(byte);
            }
        }
    }

    fn terminate(&mut self, out: &mut Vec<Token>) {
        if self.discarding {
            self.discarding = false;
            self.line.clear();
            return;
        }
        self.line.extend_from_slice(b"\r\n");
        out.push(Token::Line(self.line.split().freeze()));
    }
}
