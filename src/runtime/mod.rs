//! Single-threaded, readiness-driven runtime.
//!
//! - `slots`: fixed-capacity session table, index doubles as the poll token
//! - `session`: per-connection state owned by the table
//! - `transport`: socket setup and read/write classification
//! - `event_loop`: the mio loop tying the pieces to the shell

mod event_loop;
pub mod session;
pub mod slots;
pub mod transport;

pub use event_loop::Server;
