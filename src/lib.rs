//! telnet-shell: a multi-user command console reachable over telnet.
//!
//! A single event-loop thread accepts clients into a fixed table of
//! sessions. Each line a client types is matched against a table of named
//! commands and the handler's output is sent back through the session's
//! telnet engine.

pub mod config;
pub mod error;
pub mod protocols;
pub mod runtime;
pub mod shell;

pub use config::Config;
pub use error::ServerError;
pub use runtime::Server;
