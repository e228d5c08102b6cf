//! Attribute handles and handle ranges.

use crate::att::{AttError, ErrorCode};
use crate::bytes::{ByteReader, FromBytes};
use crate::Error;
use std::fmt;

/// A 16-bit handle uniquely identifying an attribute on an ATT server.
///
/// The `0x0000` handle (`NULL`) is invalid and must not be used.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u16);

impl Handle {
    /// The `0x0000` handle is not used for actual attributes, but as a
    /// special placeholder when no attribute handle is valid (eg. in error
    /// responses).
    pub const NULL: Self = Handle(0x0000);

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Create an attribute handle from a raw u16.
    pub fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl FromBytes<'_> for Handle {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Handle(bytes.read_u16_le()?))
    }
}

/// A (de)serializable handle range that isn't checked for validity.
#[derive(Debug, Copy, Clone)]
pub struct RawHandleRange {
    start: Handle,
    end: Handle,
}

impl RawHandleRange {
    /// Checks that this handle range is valid according to the Bluetooth
    /// spec.
    ///
    /// Returns an `AttError` that should be sent as a response if the range
    /// is invalid.
    pub fn check(&self) -> Result<HandleRange, AttError> {
        if self.start.0 > self.end.0 || self.start.0 == 0 {
            Err(AttError::new(ErrorCode::InvalidHandle, self.start))
        } else {
            Ok(HandleRange {
                start: self.start,
                end: self.end,
            })
        }
    }
}

impl FromBytes<'_> for RawHandleRange {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            start: Handle::from_bytes(bytes)?,
            end: Handle::from_bytes(bytes)?,
        })
    }
}

/// A handle range that has been checked for validity: `start <= end`,
/// `start != NULL`.
#[derive(Debug, Copy, Clone)]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

impl HandleRange {
    /// First handle in the range (inclusive).
    pub fn start(&self) -> Handle {
        self.start
    }

    /// Last handle in the range (inclusive).
    pub fn end(&self) -> Handle {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u16, end: u16) -> RawHandleRange {
        RawHandleRange {
            start: Handle::from_raw(start),
            end: Handle::from_raw(end),
        }
    }

    #[test]
    fn check_rejects_inverted_and_null() {
        assert!(range(0x0002, 0x0001).check().is_err());
        assert!(range(0x0000, 0x0001).check().is_err());
        let ok = range(0x0001, 0xFFFF).check().unwrap();
        assert_eq!(ok.start(), Handle::from_raw(1));
        assert_eq!(ok.end(), Handle::from_raw(0xFFFF));
    }

    #[test]
    fn decode() {
        let mut r = ByteReader::new(&[0x01, 0x00, 0xFF, 0xFF]);
        let raw = RawHandleRange::from_bytes(&mut r).unwrap();
        assert_eq!(raw.check().unwrap().start().as_u16(), 0x0001);
    }
}
