//! The transport seam below ATT.
//!
//! ATT runs over the fixed L2CAP channel `0x0004`, which the platform opens
//! and hands to this crate as a [`Channel`]: a byte-oriented connection with
//! shared-reference I/O so that the dispatch loop can block in [`recv`] while
//! notifier threads call [`send`]. PDU framing is the platform's job; one
//! `recv` returns one ATT PDU.
//!
//! This module also provides [`L2capWriter`], the MTU-bounded buffer every
//! response and notification is encoded into. Its chunk/commit protocol is
//! what lets the list responses (Find Information, Read By Type, Read By
//! Group) pack as many uniform entries as the MTU allows without ever
//! emitting a truncated entry.
//!
//! [`Channel`]: trait.Channel.html
//! [`recv`]: trait.Channel.html#tymethod.recv
//! [`send`]: trait.Channel.html#tymethod.send
//! [`L2capWriter`]: struct.L2capWriter.html

use crate::uuid::Uuid;
use std::io;

/// A connected, thread-safe L2CAP channel to one central.
///
/// All methods take `&self`: the connection's read loop and its notifier
/// threads share one channel. Implementations must support concurrent
/// `recv`/`send`; callers serialize `send` so each PDU reaches the socket
/// atomically.
pub trait Channel: Send + Sync {
    /// Reads one inbound PDU into `buf`, blocking until data arrives.
    ///
    /// Returns the number of bytes read; 0 means the peer closed the
    /// connection.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one outbound PDU, returning the number of bytes written.
    fn send(&self, pdu: &[u8]) -> io::Result<usize>;

    /// Shuts down the connection, unblocking any pending `recv`.
    fn shutdown(&self) -> io::Result<()>;
}

impl Channel for std::net::TcpStream {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self;
        io::Read::read(&mut stream, buf)
    }

    fn send(&self, pdu: &[u8]) -> io::Result<usize> {
        let mut stream = self;
        io::Write::write(&mut stream, pdu)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::net::TcpStream::shutdown(self, std::net::Shutdown::Both)
    }
}

#[cfg(unix)]
impl Channel for std::os::unix::net::UnixStream {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self;
        io::Read::read(&mut stream, buf)
    }

    fn send(&self, pdu: &[u8]) -> io::Result<usize> {
        let mut stream = self;
        io::Write::write(&mut stream, pdu)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, std::net::Shutdown::Both)
    }
}

/// An MTU-bounded PDU buffer with chunked commit.
///
/// Writes outside a chunk go straight into the buffer and refuse bytes that
/// would exceed the MTU (`*_fit` methods report whether the value was
/// accepted). Between [`chunk`] and [`commit`], writes are staged without a
/// bound; `commit` appends the staged bytes only if the whole chunk still
/// fits, so a list entry is either fully present in the response or not at
/// all.
///
/// [`chunk`]: #method.chunk
/// [`commit`]: #method.commit
pub struct L2capWriter {
    mtu: usize,
    buf: Vec<u8>,
    chunk: Option<Vec<u8>>,
}

impl L2capWriter {
    /// Creates a writer bounded by the connection's negotiated MTU.
    pub fn new(mtu: u16) -> Self {
        Self {
            mtu: usize::from(mtu),
            buf: Vec::with_capacity(usize::from(mtu)),
            chunk: None,
        }
    }

    /// Opens a chunk. Subsequent writes are staged until [`commit`],
    /// [`commit_fit`] or a failed `commit` resolves them.
    ///
    /// Panics if a chunk is already open.
    ///
    /// [`commit`]: #method.commit
    /// [`commit_fit`]: #method.commit_fit
    pub fn chunk(&mut self) {
        assert!(self.chunk.is_none(), "chunk already open");
        self.chunk = Some(Vec::new());
    }

    /// Writes a single byte; reports whether it was accepted.
    pub fn write_byte_fit(&mut self, byte: u8) -> bool {
        self.write_fit_all(&[byte])
    }

    /// Writes a `u16` in little-endian byte order; reports whether it was
    /// accepted.
    pub fn write_u16_fit(&mut self, value: u16) -> bool {
        self.write_fit_all(&value.to_le_bytes())
    }

    /// Writes a UUID in wire (little-endian) order; reports whether it was
    /// accepted.
    pub fn write_uuid_fit(&mut self, uuid: &Uuid) -> bool {
        match uuid {
            Uuid::Uuid16(u) => self.write_fit_all(&u.0.to_le_bytes()),
            Uuid::Uuid128(u) => self.write_fit_all(u.as_bytes()),
        }
    }

    /// Writes as much of `data` as fits, returning the number of bytes
    /// accepted. Inside a chunk everything is staged; the bound is applied
    /// when the chunk resolves.
    pub fn write_fit(&mut self, data: &[u8]) -> usize {
        match &mut self.chunk {
            Some(chunk) => {
                chunk.extend_from_slice(data);
                data.len()
            }
            None => {
                let n = data.len().min(self.mtu - self.buf.len());
                self.buf.extend_from_slice(&data[..n]);
                n
            }
        }
    }

    fn write_fit_all(&mut self, data: &[u8]) -> bool {
        match &mut self.chunk {
            Some(chunk) => {
                chunk.extend_from_slice(data);
                true
            }
            None => {
                if self.buf.len() + data.len() > self.mtu {
                    false
                } else {
                    self.buf.extend_from_slice(data);
                    true
                }
            }
        }
    }

    /// Drops the first `offset` bytes of the open chunk, exposing the tail.
    ///
    /// Reports `false` (leaving the chunk untouched) when `offset` is past
    /// the end of the chunk. This implements the Read Blob value offset.
    pub fn chunk_seek(&mut self, offset: u16) -> bool {
        let chunk = self.chunk.as_mut().expect("no open chunk");
        let offset = usize::from(offset);
        if offset > chunk.len() {
            return false;
        }
        chunk.drain(..offset);
        true
    }

    /// Closes the chunk, appending it to the PDU only if the whole chunk
    /// fits within the MTU.
    ///
    /// On overflow the staged bytes are discarded, the buffer is left at its
    /// pre-[`chunk`] state, and `false` is returned, telling enumeration
    /// loops to stop.
    ///
    /// [`chunk`]: #method.chunk
    pub fn commit(&mut self) -> bool {
        let chunk = self.chunk.take().expect("no open chunk");
        if self.buf.len() + chunk.len() > self.mtu {
            return false;
        }
        self.buf.extend_from_slice(&chunk);
        true
    }

    /// Closes the chunk, appending as much of it as fits within the MTU.
    ///
    /// This is the unconditional variant used for single-element responses,
    /// where a truncated value is valid (the client continues with Read
    /// Blob).
    pub fn commit_fit(&mut self) {
        let chunk = self.chunk.take().expect("no open chunk");
        let n = chunk.len().min(self.mtu - self.buf.len());
        self.buf.extend_from_slice(&chunk[..n]);
    }

    /// Returns the number of committed bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer and returns the finished PDU.
    ///
    /// Panics if a chunk is still open.
    pub fn bytes(self) -> Vec<u8> {
        assert!(self.chunk.is_none(), "unresolved chunk");
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::{Uuid, Uuid128, Uuid16};

    #[test]
    fn fit_writes_respect_mtu() {
        let mut w = L2capWriter::new(4);
        assert!(w.write_byte_fit(0x0B));
        assert!(w.write_u16_fit(0x1234));
        assert!(!w.write_u16_fit(0x5678));
        assert!(w.write_byte_fit(0xFF));
        assert!(!w.write_byte_fit(0x00));
        assert_eq!(w.bytes(), vec![0x0B, 0x34, 0x12, 0xFF]);
    }

    #[test]
    fn write_fit_truncates_outside_chunk() {
        let mut w = L2capWriter::new(3);
        assert_eq!(w.write_fit(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(w.bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn commit_overflow_reverts() {
        let mut w = L2capWriter::new(5);
        assert!(w.write_byte_fit(0x05));

        w.chunk();
        w.write_u16_fit(0x0001);
        w.write_u16_fit(0x2800);
        assert!(w.commit());

        // Second entry does not fit; the buffer must revert to the first.
        w.chunk();
        w.write_u16_fit(0x0002);
        w.write_u16_fit(0x2801);
        assert!(!w.commit());

        assert_eq!(w.bytes(), vec![0x05, 0x01, 0x00, 0x00, 0x28]);
    }

    #[test]
    fn commit_fit_truncates() {
        let mut w = L2capWriter::new(4);
        assert!(w.write_byte_fit(0x0B));
        w.chunk();
        w.write_fit(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        w.commit_fit();
        assert_eq!(w.bytes(), vec![0x0B, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn chunk_seek_bounds() {
        let mut w = L2capWriter::new(23);
        w.chunk();
        w.write_fit(&[1, 2, 3, 4]);
        assert!(!w.chunk_seek(16));
        assert!(w.chunk_seek(2));
        w.commit_fit();
        assert_eq!(w.bytes(), vec![3, 4]);
    }

    #[test]
    fn seek_to_end_yields_empty() {
        let mut w = L2capWriter::new(23);
        w.chunk();
        w.write_fit(&[1, 2]);
        assert!(w.chunk_seek(2));
        w.commit_fit();
        assert!(w.bytes().is_empty());
    }

    #[test]
    fn uuid_wire_order() {
        let mut w = L2capWriter::new(23);
        assert!(w.write_uuid_fit(&Uuid::from(Uuid16(0x2800))));
        assert_eq!(w.len(), 2);
        assert!(w.write_uuid_fit(&Uuid::from(Uuid128::from(Uuid16(0x180F)))));
        assert_eq!(w.len(), 18);
        let bytes = w.bytes();
        assert_eq!(&bytes[..2], &[0x00, 0x28]);
        assert_eq!(&bytes[14..16], &[0x0F, 0x18]);
    }
}
