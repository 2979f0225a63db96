//! Socket helpers for the event loop.
//!
//! Classifies read/write results into what the loop must do next. Errors
//! returned from here are fatal to the whole server.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// Bytes pulled from a session per read call.
pub const READ_CHUNK: usize = 512;

/// Result of a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Data(usize),
    /// Orderly shutdown by the peer.
    Closed,
    /// Nothing left to read until the next readiness event.
    Drained,
}

/// Result of pushing a buffer to a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Complete,
    /// Interrupted or reset by the peer; the rest of the buffer is dropped.
    Dropped,
    /// The socket buffer is full after `written` bytes.
    Blocked(usize),
}

/// Read once, retrying on signal interruption.
pub fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadStatus> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Ok(ReadStatus::Closed),
            Ok(n) => return Ok(ReadStatus::Data(n)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadStatus::Drained),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Write all of `buf` unless the peer goes away or the socket would block.
///
/// A write that makes no progress is reported as `ErrorKind::WriteZero`.
pub fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> io::Result<WriteStatus> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => written += n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(WriteStatus::Blocked(written));
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::ConnectionReset
                ) =>
            {
                return Ok(WriteStatus::Dropped);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(WriteStatus::Complete)
}

/// Create the listening socket: address reuse, non-blocking, given backlog.
pub fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Writer replaying a scripted sequence of results.
    struct Scripted {
        results: VecDeque<io::Result<usize>>,
        data: Vec<u8>,
    }

    impl Scripted {
        fn new(results: Vec<io::Result<usize>>) -> Self {
            Self {
                results: results.into(),
                data: Vec::new(),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let result = self.results.pop_front().unwrap_or(Ok(buf.len()));
            if let Ok(n) = result {
                self.data.extend_from_slice(&buf[..n.min(buf.len())]);
            }
            result
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for Scripted {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            self.results.pop_front().unwrap_or(Ok(0))
        }
    }

    fn err(kind: io::ErrorKind) -> io::Result<usize> {
        Err(io::Error::from(kind))
    }

    #[test]
    fn test_partial_writes_complete() {
        let mut w = Scripted::new(vec![Ok(2), Ok(3)]);
        assert_eq!(write_all(&mut w, b"hello world").unwrap(), WriteStatus::Complete);
        assert_eq!(w.data, b"hello world");
    }

    #[test]
    fn test_reset_and_interrupt_are_silent() {
        let mut w = Scripted::new(vec![Ok(1), err(io::ErrorKind::ConnectionReset)]);
        assert_eq!(write_all(&mut w, b"abc").unwrap(), WriteStatus::Dropped);
        assert_eq!(w.data, b"a");

        let mut w = Scripted::new(vec![err(io::ErrorKind::Interrupted)]);
        assert_eq!(write_all(&mut w, b"abc").unwrap(), WriteStatus::Dropped);
        assert!(w.data.is_empty());
    }

    #[test]
    fn test_would_block_reports_progress() {
        let mut w = Scripted::new(vec![Ok(4), err(io::ErrorKind::WouldBlock)]);
        assert_eq!(write_all(&mut w, b"abcdefgh").unwrap(), WriteStatus::Blocked(4));
    }

    #[test]
    fn test_other_write_errors_are_fatal() {
        let mut w = Scripted::new(vec![err(io::ErrorKind::BrokenPipe)]);
        let e = write_all(&mut w, b"abc").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let mut w = Scripted::new(vec![Ok(0)]);
        let e = write_all(&mut w, b"abc").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_empty_write_is_complete() {
        let mut w = Scripted::new(vec![Ok(0)]);
        assert_eq!(write_all(&mut w, b"").unwrap(), WriteStatus::Complete);
    }

    #[test]
    fn test_read_classification() {
        let mut r = Scripted::new(vec![
            err(io::ErrorKind::Interrupted),
            Ok(5),
            err(io::ErrorKind::WouldBlock),
            Ok(0),
            err(io::ErrorKind::ConnectionAborted),
        ]);
        let mut buf = [0u8; READ_CHUNK];

        assert_eq!(read_chunk(&mut r, &mut buf).unwrap(), ReadStatus::Data(5));
        assert_eq!(read_chunk(&mut r, &mut buf).unwrap(), ReadStatus::Drained);
        assert_eq!(read_chunk(&mut r, &mut buf).unwrap(), ReadStatus::Closed);
        assert!(read_chunk(&mut r, &mut buf).is_err());
    }
}
