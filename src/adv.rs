//! Advertising Data payload assembly.
//!
//! Part of GAP (Generic Access Profile). An advertising PDU carries up to 31
//! bytes of AD structures of the form `[len, type, payload...]`, where `len`
//! counts the type byte plus the payload.
//!
//! Also see the [assigned numbers document][gap] hosted by the SIG.
//!
//! [gap]: https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile

use crate::uuid::Uuid;
use bitflags::bitflags;

/// Maximum payload of an advertising PDU or scan response.
pub const MAX_EIR_PACKET_LENGTH: usize = 31;

bitflags! {
    /// BR/EDR and LE compatibility flags.
    ///
    /// This is mandatory for most devices and can only be omitted if all
    /// flags are 0.
    pub struct Flags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0b00000001;
        const LE_GENERAL_DISCOVERABLE = 0b00000010;
        const BR_EDR_NOT_SUPPORTED    = 0b00000100;
        const SIMUL_LE_BR_CONTROLLER  = 0b00001000;
        const SIMUL_LE_BR_HOST        = 0b00010000;
    }
}

impl Flags {
    /// Returns flags suitable for discoverable devices that want to establish a connection.
    ///
    /// The created `Flags` value specifies that this device is not BR/EDR (classic Bluetooth)
    /// capable and is in General Discoverable mode.
    pub fn discoverable() -> Flags {
        Self::BR_EDR_NOT_SUPPORTED | Self::LE_GENERAL_DISCOVERABLE
    }

    /// Returns flags suitable for non-connectable devices that just broadcast advertising packets.
    ///
    /// Creates a `Flags` value that specifies that BR/EDR (classic Bluetooth) is not supported and
    /// that this device is not discoverable.
    pub fn broadcast() -> Flags {
        Self::BR_EDR_NOT_SUPPORTED
    }
}

/// Data Type constants.
///
/// https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile
enum Type {}

impl Type {
    const FLAGS: u8 = 0x01;
    #[allow(unused)]
    const INCOMPLETE_LIST_OF_16BIT_SERVICE_UUIDS: u8 = 0x02;
    const COMPLETE_LIST_OF_16BIT_SERVICE_UUIDS: u8 = 0x03;
    const INCOMPLETE_LIST_OF_128BIT_SERVICE_UUIDS: u8 = 0x06;
    #[allow(unused)]
    const COMPLETE_LIST_OF_128BIT_SERVICE_UUIDS: u8 = 0x07;
    const SHORTENED_LOCAL_NAME: u8 = 0x08;
    const COMPLETE_LOCAL_NAME: u8 = 0x09;
    const MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;
}

/// A fixed-capacity advertising payload under construction.
///
/// Append methods degrade gracefully at the 31-byte boundary: payloads are
/// truncated to the remaining space and appends that cannot place a useful
/// field are no-ops, so a packet is always valid to hand to the controller.
#[derive(Default)]
pub struct AdvPacket {
    buf: Vec<u8>,
}

impl AdvPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payload bytes used so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The used prefix of the payload.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// The payload as the fixed 31-byte block the controller takes,
    /// right-padded with zeros.
    pub fn bytes(&self) -> [u8; MAX_EIR_PACKET_LENGTH] {
        let mut out = [0; MAX_EIR_PACKET_LENGTH];
        out[..self.buf.len()].copy_from_slice(&self.buf);
        out
    }

    /// Appends an AD structure `[len, typ, data...]`, truncating `data` to
    /// the remaining space. No-op when not even an empty field fits.
    pub fn append_field(&mut self, typ: u8, data: &[u8]) -> &mut Self {
        let space = MAX_EIR_PACKET_LENGTH - self.buf.len();
        if space < 2 {
            return self;
        }
        let data = &data[..data.len().min(space - 2)];
        self.buf.push(data.len() as u8 + 1);
        self.buf.push(typ);
        self.buf.extend_from_slice(data);
        self
    }

    /// Appends a Flags field.
    pub fn append_flags(&mut self, flags: Flags) -> &mut Self {
        self.append_field(Type::FLAGS, &[flags.bits()])
    }

    /// Appends the device name.
    ///
    /// Uses the *Complete Local Name* type when the whole name fits and
    /// *Shortened Local Name* with as many leading bytes as fit otherwise;
    /// when not a single name byte fits, nothing is appended.
    pub fn append_name(&mut self, name: &str) -> &mut Self {
        let space = MAX_EIR_PACKET_LENGTH - self.buf.len();
        if space < 3 {
            return self;
        }
        let typ = if 2 + name.len() <= space {
            Type::COMPLETE_LOCAL_NAME
        } else {
            Type::SHORTENED_LOCAL_NAME
        };
        self.append_field(typ, name.as_bytes())
    }

    /// Appends a Manufacturer Specific Data field with the company
    /// identifier in little-endian order.
    pub fn append_manufacturer_data(&mut self, company: u16, data: &[u8]) -> &mut Self {
        let mut payload = company.to_le_bytes().to_vec();
        payload.extend_from_slice(data);
        self.append_field(Type::MANUFACTURER_SPECIFIC_DATA, &payload)
    }

    /// Appends service UUIDs, one AD structure each, as long as they fit;
    /// reports whether every UUID was placed.
    ///
    /// 16-bit UUIDs use the complete-list type; 128-bit UUIDs use the
    /// incomplete-list type, and at most one of those fits a packet that
    /// already carries flags.
    pub fn append_uuid_fit(&mut self, uuids: &[Uuid]) -> bool {
        let mut all_fit = true;
        for uuid in uuids {
            let space = MAX_EIR_PACKET_LENGTH - self.buf.len();
            match uuid {
                Uuid::Uuid16(u) => {
                    if space < 4 {
                        all_fit = false;
                        continue;
                    }
                    self.append_field(
                        Type::COMPLETE_LIST_OF_16BIT_SERVICE_UUIDS,
                        &u.0.to_le_bytes(),
                    );
                }
                Uuid::Uuid128(u) => {
                    if space < 18 {
                        all_fit = false;
                        continue;
                    }
                    self.append_field(Type::INCOMPLETE_LIST_OF_128BIT_SERVICE_UUIDS, u.as_bytes());
                }
            }
        }
        all_fit
    }
}
