//! mio event loop.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking read/write syscalls. One thread owns the listener,
//! the slot table and every session; nothing here is shared or locked.
//!
//! Each readable session is drained in `READ_CHUNK` pieces. Bytes go through
//! the session's telnet engine, and every event it yields is handled before
//! the next read: lines are dispatched to the shell, encoded output is
//! written, COMPRESS2 is switched on, and engine errors tear the session
//! down.

use crate::config::Config;
use crate::error::ServerError;
use crate::protocols::telnet::{Event, Verb, TELOPT_COMPRESS2};
use crate::runtime::session::{Session, Teardown};
use crate::runtime::slots::SlotTable;
use crate::runtime::transport::{self, ReadStatus, WriteStatus, READ_CHUNK};
use crate::shell::{CommandTable, Outcome, Shell};
use bytes::Buf;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::thread;
use tracing::{debug, error, info, trace, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

const EVENTS_CAPACITY: usize = 128;

/// Sent to a client that finds every slot taken.
const REJECT_NOTICE: &[u8] = b"Too many users.\r\n";

/// The console server: listener, session table and command shell.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    slots: SlotTable<Session>,
    shell: Shell,
    banner: String,
    offer_compression: bool,
}

impl Server {
    /// Bind the listener and prepare an empty session table.
    pub fn bind(config: &Config, commands: CommandTable) -> Result<Self, ServerError> {
        let poll = Poll::new().map_err(ServerError::Setup)?;

        let listener = transport::create_listener(config.listen, config.backlog)
            .map_err(ServerError::Setup)?;
        let mut listener = TcpListener::from_std(listener);
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(ServerError::Setup)?;
        let local_addr = listener.local_addr().map_err(ServerError::Setup)?;

        info!(
            addr = %local_addr,
            max_sessions = config.max_sessions,
            commands = commands.len(),
            "Listening"
        );

        Ok(Server {
            poll,
            listener,
            local_addr,
            slots: SlotTable::new(config.max_sessions),
            shell: Shell::new(commands, config.prompt.clone()),
            banner: config.banner.clone(),
            offer_compression: config.offer_compression,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected sessions.
    pub fn sessions(&self) -> usize {
        self.slots.count()
    }

    /// Drive the event loop on the current thread.
    ///
    /// Only returns on a fatal error. Dropping the server afterwards closes
    /// the listener and every session.
    pub fn run(mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Poll(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept()?,
                    Token(slot) => {
                        if event.is_readable() || event.is_read_closed() || event.is_error() {
                            self.readable(slot)?;
                        }
                        if event.is_writable() {
                            self.writable(slot)?;
                        }
                    }
                }
            }
        }
    }

    /// Run the event loop on a dedicated background thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<Result<(), ServerError>>> {
        thread::Builder::new()
            .name("telnetd".to_string())
            .spawn(move || {
                let result = self.run();
                if let Err(ref e) = result {
                    error!(error = %e, "Server stopped");
                }
                result
            })
    }

    fn accept(&mut self) -> Result<(), ServerError> {
        loop {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ServerError::Accept(e)),
            };

            let Some(slot) = self.slots.find_free() else {
                warn!(peer = %peer, "Rejected connection (too many users)");
                reject(&mut stream, peer)?;
                continue;
            };

            self.poll
                .registry()
                .register(&mut stream, Token(slot), Interest::READABLE)
                .map_err(ServerError::Setup)?;

            let Ok(session) = self.slots.occupy(slot, Session::new(stream, peer)) else {
                continue;
            };
            info!(slot, peer = %peer, "Connection received");

            if self.offer_compression {
                session.engine.offer_compress2();
            }
            session.engine.send_text(&format!("\n{}\n", self.banner));
            let _ = self.shell.write_prompt(&mut session.engine);

            self.pump(slot)?;
        }
    }

    fn readable(&mut self, slot: usize) -> Result<(), ServerError> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let Some(session) = self.slots.get_mut(slot) else {
                return Ok(());
            };
            // Paused until the peer takes the pending output.
            if !session.backlog.is_empty() {
                return Ok(());
            }
            let peer = session.peer;

            match transport::read_chunk(&mut session.stream, &mut buf)
                .map_err(|source| ServerError::Read { peer, source })?
            {
                ReadStatus::Data(n) => {
                    trace!(slot, bytes = n, "Read");
                    session.engine.feed(&buf[..n]);
                    self.pump(slot)?;
                }
                ReadStatus::Closed => {
                    info!(slot, peer = %peer, "Connection closed");
                    return self.release(slot, Teardown::Disconnected);
                }
                ReadStatus::Drained => return Ok(()),
            }
        }
    }

    /// Flush output that did not fit in the socket earlier.
    ///
    /// Once the backlog is gone a closing session is released, any other
    /// session goes back to reading.
    fn writable(&mut self, slot: usize) -> Result<(), ServerError> {
        let Some(session) = self.slots.get_mut(slot) else {
            return Ok(());
        };
        if session.backlog.is_empty() {
            return Ok(());
        }

        match transport::write_all(&mut session.stream, &session.backlog) {
            Ok(WriteStatus::Blocked(written)) => {
                session.backlog.advance(written);
                return Ok(());
            }
            Ok(_) => session.backlog.clear(),
            Err(e) => return Err(ServerError::write(session.peer, e)),
        }

        if let Some(reason) = session.closing {
            return self.release(slot, reason);
        }
        self.poll
            .registry()
            .reregister(&mut session.stream, Token(slot), Interest::READABLE)
            .map_err(ServerError::Setup)?;

        // Input that arrived while paused raised no new edge.
        self.readable(slot)
    }

    /// Handle every pending engine event of a session.
    fn pump(&mut self, slot: usize) -> Result<(), ServerError> {
        loop {
            let Some(session) = self.slots.get_mut(slot) else {
                return Ok(());
            };
            let Some(event) = session.engine.next_event() else {
                return Ok(());
            };

            match event {
                Event::Data(line) => {
                    let Session {
                        engine,
                        display_name,
                        ..
                    } = session;
                    let outcome = self
                        .shell
                        .dispatch(slot, display_name, engine, &line)
                        .unwrap_or(Outcome::Continue);

                    if outcome == Outcome::Close {
                        return self.close(slot, Teardown::Quit);
                    }
                }
                Event::Send(bytes) => self.transmit(slot, &bytes)?,
                Event::Negotiate {
                    verb: Verb::Do,
                    option: TELOPT_COMPRESS2,
                } => {
                    if !session.engine.is_compressing() {
                        debug!(slot, "Client accepted COMPRESS2");
                        session.engine.begin_compress2();
                    }
                }
                Event::Negotiate { verb, option } => {
                    debug!(slot, ?verb, option, "Ignoring negotiation");
                }
                Event::Error(e) => {
                    warn!(slot, peer = %session.peer, error = %e, "Telnet error");
                    return self.release(slot, Teardown::Error);
                }
            }
        }
    }

    /// Write encoded bytes to a session. Free slots swallow the write.
    fn transmit(&mut self, slot: usize, bytes: &[u8]) -> Result<(), ServerError> {
        let Some(session) = self.slots.get_mut(slot) else {
            return Ok(());
        };

        // Keep ordering behind anything already waiting.
        if !session.backlog.is_empty() {
            session.backlog.extend_from_slice(bytes);
            return Ok(());
        }

        match transport::write_all(&mut session.stream, bytes) {
            Ok(WriteStatus::Complete) => Ok(()),
            Ok(WriteStatus::Dropped) => {
                debug!(slot, "Dropped output");
                Ok(())
            }
            Ok(WriteStatus::Blocked(written)) => {
                trace!(slot, pending = bytes.len() - written, "Socket full, buffering");
                session.backlog.extend_from_slice(&bytes[written..]);
                self.poll
                    .registry()
                    .reregister(&mut session.stream, Token(slot), Interest::WRITABLE)
                    .map_err(ServerError::Setup)
            }
            Err(e) => Err(ServerError::write(session.peer, e)),
        }
    }

    /// Flush what the session still has to say, then release it.
    ///
    /// Output the socket cannot take yet keeps the slot occupied until
    /// `writable` has drained it. Unprocessed input is dropped.
    fn close(&mut self, slot: usize, reason: Teardown) -> Result<(), ServerError> {
        while let Some(event) = self
            .slots
            .get_mut(slot)
            .and_then(|session| session.engine.next_event())
        {
            if let Event::Send(bytes) = event {
                self.transmit(slot, &bytes)?;
            }
        }

        let Some(session) = self.slots.get_mut(slot) else {
            return Ok(());
        };
        if session.backlog.is_empty() {
            return self.release(slot, reason);
        }
        debug!(slot, pending = session.backlog.len(), "Closing once output drains");
        session.closing = Some(reason);
        Ok(())
    }

    /// Close the socket, drop the engine and free the slot. Named sessions
    /// are announced to everyone still connected.
    fn release(&mut self, slot: usize, reason: Teardown) -> Result<(), ServerError> {
        let Some(mut session) = self.slots.release(slot) else {
            return Ok(());
        };
        let _ = self.poll.registry().deregister(&mut session.stream);
        debug!(slot, peer = %session.peer, ?reason, "Session released");

        let name = session.display_name.take();
        drop(session);

        match name {
            Some(name) => self.broadcast(&name, reason.notice()),
            None => Ok(()),
        }
    }

    /// Send `"<from>: <message>"` to every connected session.
    fn broadcast(&mut self, from: &str, message: &str) -> Result<(), ServerError> {
        let line = format!("{from}: {message}\n");

        for slot in self.slots.occupied() {
            if let Some(session) = self.slots.get_mut(slot) {
                session.engine.send_text(&line);
            }
            self.pump(slot)?;
        }
        Ok(())
    }
}

/// Tell an unregistered client the table is full. The stream is closed when
/// the caller drops it.
fn reject(stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
    transport::write_all(stream, REJECT_NOTICE)
        .map(|_| ())
        .map_err(|e| ServerError::write(peer, e))
}
