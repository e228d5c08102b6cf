//! BLE UUIDs (16 or 128 bits).
//!
//! Bluetooth assigns UUIDs to identify services and characteristics. Many
//! common UUIDs can be represented and transmitted as 16-bit aliases instead
//! of the full 128 bits; an alias is expanded by placing it in bytes 2..4 of
//! the Bluetooth Base UUID, `00000000-0000-1000-8000-00805F9B34FB`.
//!
//! On the ATT wire every UUID travels little-endian, so [`Uuid128`] stores
//! its 16 bytes in wire order and can be written out verbatim.

use crate::bytes::{ByteReader, FromBytes};
use crate::Error;
use std::fmt;

/// The Bluetooth Base UUID in wire (little-endian) byte order.
///
/// A 16-bit alias `0xABCD` expands into this with `CD AB` at offsets 12..14.
const BASE_UUID: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A 16-bit UUID alias.
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Uuid16(pub u16);

/// A full 128-bit UUID, stored in wire (little-endian) byte order.
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Uuid128([u8; 16]);

impl Uuid128 {
    /// Creates a 128-bit UUID from 16 raw bytes in wire (little-endian)
    /// order.
    pub const fn from_wire_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a 128-bit UUID from 16 raw bytes in big-endian order, the
    /// order UUID string literals are written in.
    pub fn from_be_bytes(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// Returns the UUID's bytes in wire (little-endian) order.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<Uuid16> for Uuid128 {
    fn from(alias: Uuid16) -> Self {
        let mut buf = BASE_UUID;
        buf[12..14].copy_from_slice(&alias.0.to_le_bytes());
        Uuid128(buf)
    }
}

/// Conversion from the ecosystem UUID type, which stores bytes big-endian.
impl From<uuid::Uuid> for Uuid128 {
    fn from(uuid: uuid::Uuid) -> Self {
        Uuid128::from_be_bytes(*uuid.as_bytes())
    }
}

impl FromBytes<'_> for Uuid16 {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let array = bytes.read_array()?;
        Ok(Uuid16(u16::from_le_bytes(array)))
    }
}

impl FromBytes<'_> for Uuid128 {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Uuid128(bytes.read_array()?))
    }
}

impl fmt::Debug for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid16({:04x})", self.0)
    }
}

impl fmt::Debug for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical form is big-endian, so walk the wire bytes backwards.
        for (i, byte) in self.0.iter().rev().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// An attribute protocol UUID: either a 16-bit alias or a full 128-bit UUID.
///
/// 32-bit aliases are not used by ATT and must be widened to 128 bits.
#[derive(Copy, Clone, Eq)]
pub enum Uuid {
    Uuid16(Uuid16),
    Uuid128(Uuid128),
}

impl Uuid {
    /// Returns the length of the UUID's wire representation in bytes (2 or
    /// 16).
    pub fn len(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid128(_) => 16,
        }
    }

    /// Appends the UUID's wire representation (little-endian) to `out`.
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        match self {
            Uuid::Uuid16(u) => out.extend_from_slice(&u.0.to_le_bytes()),
            Uuid::Uuid128(u) => out.extend_from_slice(u.as_bytes()),
        }
    }
}

/// Decodes a UUID from all remaining bytes of the reader, which must be
/// exactly 2 or 16.
impl FromBytes<'_> for Uuid {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(match bytes.bytes_left() {
            2 => Uuid::Uuid16(Uuid16::from_bytes(bytes)?),
            16 => Uuid::Uuid128(Uuid128::from_bytes(bytes)?),
            _ => return Err(Error::InvalidLength),
        })
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // 16-bit aliases can be compared directly
            (Uuid::Uuid16(a), Uuid::Uuid16(b)) => a == b,

            // All other combinations widen to 128 bits
            (Uuid::Uuid128(a), b) | (b, Uuid::Uuid128(a)) => {
                let b: Uuid128 = (*b).into();
                *a == b
            }
        }
    }
}

impl PartialEq<Uuid16> for Uuid {
    fn eq(&self, other: &Uuid16) -> bool {
        self == &Uuid::from(*other)
    }
}

impl PartialEq<Uuid128> for Uuid {
    fn eq(&self, other: &Uuid128) -> bool {
        self == &Uuid::from(*other)
    }
}

impl From<Uuid16> for Uuid {
    fn from(u: Uuid16) -> Self {
        Uuid::Uuid16(u)
    }
}

impl From<Uuid128> for Uuid {
    fn from(u: Uuid128) -> Self {
        Uuid::Uuid128(u)
    }
}

impl From<uuid::Uuid> for Uuid {
    fn from(u: uuid::Uuid) -> Self {
        Uuid::Uuid128(u.into())
    }
}

impl From<Uuid> for Uuid128 {
    fn from(u: Uuid) -> Self {
        match u {
            Uuid::Uuid16(alias) => alias.into(),
            Uuid::Uuid128(full) => full,
        }
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(u) => u.fmt(f),
            Uuid::Uuid128(u) => u.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen() {
        let uuid = Uuid128::from(Uuid16(0xfd6f));

        assert_eq!(
            format!("{:?}", uuid),
            "0000fd6f-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn eq_across_widths() {
        let short = Uuid::from(Uuid16(0x2800));
        let full = Uuid::from(Uuid128::from(Uuid16(0x2800)));
        assert_eq!(short, full);
        assert_eq!(full, short);
        assert_ne!(short, Uuid::from(Uuid16(0x2801)));
        assert!(short == Uuid16(0x2800));
    }

    #[test]
    fn wire_round_trip() {
        let mut out = Vec::new();
        Uuid::from(Uuid16(0x2902)).write_wire(&mut out);
        assert_eq!(out, [0x02, 0x29]);

        let mut r = ByteReader::new(&out);
        let back = Uuid::from_bytes(&mut r).unwrap();
        assert_eq!(back, Uuid::from(Uuid16(0x2902)));

        // Wrong width is rejected
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03]);
        assert!(Uuid::from_bytes(&mut r).is_err());
    }

    #[test]
    fn from_ecosystem_uuid() {
        let u = uuid::Uuid::parse_str("0000fd6f-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(Uuid128::from(u), Uuid128::from(Uuid16(0xfd6f)));
    }
}
