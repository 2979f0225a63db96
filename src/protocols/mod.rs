//! Protocol implementations.
//!
//! - `telnet`: line parsing, option negotiation and MCCP2 compression for
//!   console sessions
pub mod telnet;
