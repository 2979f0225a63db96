//! Telnet protocol engine.
//!
//! Turns the raw byte stream of one connection into line and negotiation
//! events and encodes outbound text for the wire:
//! - IAC command parsing with `IAC IAC` escaping
//! - Line framing with CR LF / CR NUL / LF normalization
//! - Option negotiation: only COMPRESS2 (MCCP2) is supported locally
//! - MCCP2 output compression once the client agrees
//!
//! ## Wire Format
//!
//! ```text
//! Client:  help\r\n                 -> Event::Data("help\r\n")
//! Client:  IAC DO COMPRESS2         -> IAC WILL COMPRESS2, Event::Negotiate
//! Server:  IAC SB COMPRESS2 IAC SE  -> zlib stream follows
//! ```

pub mod engine;
pub mod parser;

pub use engine::{Engine, Event, TelnetError};
pub use parser::{Verb, LINE_CAPACITY, TELOPT_COMPRESS2};
