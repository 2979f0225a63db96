//! Fatal server errors.
//!
//! Anything in here ends the event loop. Per-session conditions (bad input,
//! peer disconnects, telnet protocol errors) never become a `ServerError`.

use std::io;
use std::net::SocketAddr;

#[derive(Debug)]
pub enum ServerError {
    /// Socket creation, bind, listen or poll registration failed.
    Setup(io::Error),
    /// The readiness wait failed for a reason other than a signal.
    Poll(io::Error),
    Accept(io::Error),
    /// Unexpected error while reading from a client.
    Read { peer: SocketAddr, source: io::Error },
    /// Unexpected error while writing to a client.
    Write { peer: SocketAddr, source: io::Error },
    /// The socket accepted zero bytes without reporting an error.
    WriteZero { peer: SocketAddr },
}

impl ServerError {
    /// Classify a failed write to `peer`.
    pub fn write(peer: SocketAddr, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::WriteZero {
            ServerError::WriteZero { peer }
        } else {
            ServerError::Write { peer, source }
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Setup(e) => write!(f, "listener setup failed: {e}"),
            ServerError::Poll(e) => write!(f, "poll() failed: {e}"),
            ServerError::Accept(e) => write!(f, "accept() failed: {e}"),
            ServerError::Read { peer, source } => {
                write!(f, "recv(client) failed for {peer}: {source}")
            }
            ServerError::Write { peer, source } => write!(f, "send() failed for {peer}: {source}"),
            ServerError::WriteZero { peer } => {
                write!(f, "send() unexpectedly returned 0 for {peer}")
            }
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Setup(e) | ServerError::Poll(e) | ServerError::Accept(e) => Some(e),
            ServerError::Read { source, .. } | ServerError::Write { source, .. } => Some(source),
            ServerError::WriteZero { .. } => None,
        }
    }
}
