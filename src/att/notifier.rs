//! Per-(connection, characteristic) notification streams.

use crate::att::{Handle, Opcode};
use crate::l2cap::{Channel, L2capWriter};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A streaming handle for one enabled Client Characteristic Configuration.
///
/// Created when the central writes the notify or indicate bit into a CCC
/// descriptor and handed to the characteristic's [`NotifyHandler`], which
/// runs on its own thread. Cloning is cheap; every clone shares the same
/// stop signal, and the connection keeps one clone so it can cancel the
/// stream when the CCC is cleared or the connection closes.
///
/// [`NotifyHandler`]: trait.NotifyHandler.html
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    chan: Arc<dyn Channel>,
    write_lock: Arc<Mutex<()>>,
    value_handle: Handle,
    mtu: u16,
    stopped: AtomicBool,
}

impl Notifier {
    pub(crate) fn new(
        chan: Arc<dyn Channel>,
        write_lock: Arc<Mutex<()>>,
        value_handle: Handle,
        mtu: u16,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                chan,
                write_lock,
                value_handle,
                mtu,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Maximum notification payload in bytes (`MTU - 3`), fixed when the
    /// stream was enabled.
    pub fn cap(&self) -> usize {
        usize::from(self.inner.mtu) - 3
    }

    /// Sends a Handle Value Notification carrying `data`, truncated to
    /// [`cap`] bytes.
    ///
    /// Returns the number of payload bytes transmitted (the channel's write
    /// count minus the notification header).
    ///
    /// [`cap`]: #method.cap
    pub fn write(&self, data: &[u8]) -> io::Result<usize> {
        if self.done() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "notifier stopped",
            ));
        }

        let mut w = L2capWriter::new(self.inner.mtu);
        let mut header = 0;
        if w.write_byte_fit(Opcode::HandleValueNotification.raw()) {
            header += 1;
        }
        if w.write_u16_fit(self.inner.value_handle.as_u16()) {
            header += 2;
        }
        w.write_fit(data);
        let pdu = w.bytes();

        let n = {
            let _guard = self.inner.write_lock.lock().unwrap();
            self.inner.chan.send(&pdu)?
        };
        Ok(n.saturating_sub(header))
    }

    /// Reports whether the stream has been cancelled. Notify handlers must
    /// poll this and return promptly once it turns `true`.
    pub fn done(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Cancels the stream. Idempotent; no notification is sent.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct SinkChannel {
        sent: Mutex<Vec<Vec<u8>>>,
        shutdowns: AtomicUsize,
    }

    impl SinkChannel {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                shutdowns: AtomicUsize::new(0),
            }
        }
    }

    impl Channel for SinkChannel {
        fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn send(&self, pdu: &[u8]) -> io::Result<usize> {
            self.sent.lock().unwrap().push(pdu.to_vec());
            Ok(pdu.len())
        }

        fn shutdown(&self) -> io::Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn notifier(chan: Arc<SinkChannel>, mtu: u16) -> Notifier {
        Notifier::new(
            chan,
            Arc::new(Mutex::new(())),
            Handle::from_raw(0x002F),
            mtu,
        )
    }

    #[test]
    fn write_frames_notification() {
        let chan = Arc::new(SinkChannel::new());
        let n = notifier(chan.clone(), 23);

        assert_eq!(n.write(&[0xAA, 0xBB]).unwrap(), 2);
        let sent = chan.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[vec![0x1B, 0x2F, 0x00, 0xAA, 0xBB]]);
    }

    #[test]
    fn payload_truncated_to_cap() {
        let chan = Arc::new(SinkChannel::new());
        let n = notifier(chan.clone(), 23);
        assert_eq!(n.cap(), 20);

        let big = vec![0x55; 64];
        assert_eq!(n.write(&big).unwrap(), 20);
        let sent = chan.sent.lock().unwrap();
        assert_eq!(sent[0].len(), 23);
    }

    #[test]
    fn stop_is_idempotent_and_fails_writes() {
        let chan = Arc::new(SinkChannel::new());
        let n = notifier(chan.clone(), 23);
        let clone = n.clone();

        assert!(!n.done());
        n.stop();
        n.stop();
        assert!(clone.done());
        assert!(clone.write(&[0x01]).is_err());
        assert!(chan.sent.lock().unwrap().is_empty());
    }
}
