//! Per-connection session state.

use crate::protocols::telnet::Engine;
use bytes::BytesMut;
use mio::net::TcpStream;
use std::net::SocketAddr;

/// One occupied slot: the client socket plus its shell state.
pub struct Session {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Created on accept, dropped with the session.
    pub engine: Engine,
    /// Unset until a command binds it.
    pub display_name: Option<String>,
    /// Encoded output the socket could not take yet. While non-empty the
    /// session is registered for writability only and input stays unread.
    pub backlog: BytesMut,
    /// Set when the session ended with output still in `backlog`.
    pub closing: Option<Teardown>,
}

impl Session {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            engine: Engine::new(),
            display_name: None,
            backlog: BytesMut::new(),
            closing: None,
        }
    }
}

/// Why a session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The peer closed the connection.
    Disconnected,
    /// A command asked for the session to end.
    Quit,
    /// The telnet engine reported an error.
    Error,
}

impl Teardown {
    /// Notice broadcast on behalf of a named session.
    pub fn notice(self) -> &'static str {
        match self {
            Teardown::Disconnected | Teardown::Quit => "** HAS DISCONNECTED **",
            Teardown::Error => "** HAS HAD AN ERROR **",
        }
    }
}
