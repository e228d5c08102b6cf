//! Application-supplied attribute behavior.
//!
//! An attribute may attach any subset of three capabilities: producing a
//! value on read, consuming a value on write, and streaming values through a
//! [`Notifier`] once the central subscribes. Plain closures with the matching
//! signature implement the traits directly.
//!
//! [`Notifier`]: struct.Notifier.html

use crate::att::{ErrorCode, Notifier};
use crate::Error;

/// Context shared by every handler invocation.
#[derive(Debug, Clone)]
pub struct Request {
    /// Identity of the connected central (its address, as reported by the
    /// platform).
    pub peer: String,
    /// The connection's negotiated MTU at the time of the request.
    pub mtu: u16,
}

/// Context for a read handler invocation.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub req: Request,
    /// Maximum number of value bytes the response can carry (`MTU - 1`).
    pub cap: usize,
    /// Value offset requested by a Read Blob; 0 for plain reads. A handler
    /// that honors this must serve the value starting at the offset, since
    /// the server does not re-apply it to handler-produced values.
    pub offset: usize,
}

/// Produces an attribute value on demand.
pub trait ReadHandler: Send + Sync {
    fn read(&self, rsp: &mut ResponseWriter, req: &ReadRequest);
}

impl<F> ReadHandler for F
where
    F: Fn(&mut ResponseWriter, &ReadRequest) + Send + Sync,
{
    fn read(&self, rsp: &mut ResponseWriter, req: &ReadRequest) {
        self(rsp, req)
    }
}

/// Consumes an attribute value written by the central.
///
/// The returned `ErrorCode` is forwarded to the central verbatim in an Error
/// Response; `Ok(())` yields a Write Response.
pub trait WriteHandler: Send + Sync {
    fn write(&self, req: &Request, value: &[u8]) -> Result<(), ErrorCode>;
}

impl<F> WriteHandler for F
where
    F: Fn(&Request, &[u8]) -> Result<(), ErrorCode> + Send + Sync,
{
    fn write(&self, req: &Request, value: &[u8]) -> Result<(), ErrorCode> {
        self(req, value)
    }
}

/// Streams values to a subscribed central.
///
/// Runs on its own thread, spawned when the central enables notifications.
/// The handler must watch [`Notifier::done`] and return promptly once it
/// reports `true`.
///
/// [`Notifier::done`]: struct.Notifier.html#method.done
pub trait NotifyHandler: Send + Sync {
    fn notify(&self, req: &Request, notifier: Notifier);
}

impl<F> NotifyHandler for F
where
    F: Fn(&Request, Notifier) + Send + Sync,
{
    fn notify(&self, req: &Request, notifier: Notifier) {
        self(req, notifier)
    }
}

/// The capabilities attached to one attribute. All optional.
#[derive(Default)]
pub struct Handlers {
    pub read: Option<Box<dyn ReadHandler>>,
    pub write: Option<Box<dyn WriteHandler>>,
    pub notify: Option<Box<dyn NotifyHandler>>,
}

/// A bounded buffer a read handler writes the attribute value into.
///
/// The capacity is the request's `cap` (`MTU - 1`), so a handler cannot
/// produce a value the response PDU could not carry.
pub struct ResponseWriter {
    buf: Vec<u8>,
    cap: usize,
}

impl ResponseWriter {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Appends all of `data`, or returns `Error::Eof` without writing
    /// anything when it does not fit.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.buf.len() + data.len() > self.cap {
            return Err(Error::Eof);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Appends as many bytes of `data` as fit, returning the number written.
    pub fn write_truncate(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.cap - self.buf.len());
        self.buf.extend_from_slice(&data[..n]);
        n
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remaining capacity in bytes.
    pub fn space_left(&self) -> usize {
        self.cap - self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_writes() {
        let mut w = ResponseWriter::new(4);
        w.write(&[1, 2]).unwrap();
        assert!(w.write(&[3, 4, 5]).is_err());
        assert_eq!(w.len(), 2);
        assert_eq!(w.write_truncate(&[3, 4, 5]), 2);
        assert_eq!(w.space_left(), 0);
        assert_eq!(w.into_bytes(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn closures_are_handlers() {
        let read = |rsp: &mut ResponseWriter, _req: &ReadRequest| {
            rsp.write_truncate(&[0x42]);
        };
        let mut rsp = ResponseWriter::new(22);
        ReadHandler::read(
            &read,
            &mut rsp,
            &ReadRequest {
                req: Request {
                    peer: "11:22:33:44:55:66".into(),
                    mtu: 23,
                },
                cap: 22,
                offset: 0,
            },
        );
        assert_eq!(rsp.into_bytes(), vec![0x42]);

        let write =
            |_req: &Request, _value: &[u8]| -> Result<(), ErrorCode> { Err(ErrorCode::from(0x80)) };
        let handlers = Handlers {
            write: Some(Box::new(write)),
            ..Handlers::default()
        };
        let req = Request {
            peer: String::new(),
            mtu: 23,
        };
        let result = handlers.write.as_ref().unwrap().write(&req, &[0]);
        assert_eq!(result, Err(ErrorCode::from(0x80)));
    }
}
