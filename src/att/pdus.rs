//! Opcode and error-code tables of the ATT protocol, and the error-response
//! codec.

use crate::att::Handle;

enum_with_unknown! {
    /// Error codes that can be sent from the ATT server to the client in response to a request.
    ///
    /// Used as the payload of `ErrorRsp` PDUs.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum ErrorCode(u8) {
        /// Attempted to use a `Handle` that isn't valid on this server.
        InvalidHandle = 0x01,
        /// Attribute isn't readable.
        ReadNotPermitted = 0x02,
        /// Attribute isn't writable.
        WriteNotPermitted = 0x03,
        /// Attribute PDU is invalid.
        InvalidPdu = 0x04,
        /// Authentication needed before attribute can be read/written.
        InsufficientAuthentication = 0x05,
        /// Server doesn't support this operation.
        RequestNotSupported = 0x06,
        /// Offset was past the end of the attribute.
        InvalidOffset = 0x07,
        /// Authorization needed before attribute can be read/written.
        InsufficientAuthorization = 0x08,
        /// Too many "prepare write" requests have been queued.
        PrepareQueueFull = 0x09,
        /// No attribute found within the specified attribute handle range.
        AttributeNotFound = 0x0A,
        /// Attribute can't be read/written using *Read Blob* request.
        AttributeNotLong = 0x0B,
        /// The encryption key in use is too weak to access an attribute.
        InsufficientEncryptionKeySize = 0x0C,
        /// Attribute value has an incorrect length for the operation.
        InvalidAttributeValueLength = 0x0D,
        /// Request has encountered an "unlikely" error and could not be completed.
        UnlikelyError = 0x0E,
        /// Attribute cannot be read/written without an encrypted connection.
        InsufficientEncryption = 0x0F,
        /// Attribute type is an invalid grouping attribute according to a higher-layer spec.
        UnsupportedGroupType = 0x10,
        /// Server didn't have enough resources to complete a request.
        InsufficientResources = 0x11,
    }
}

enum_with_unknown! {
    /// Specifies an ATT operation to perform.
    ///
    /// The byte values assigned to opcodes are chosen so that the most significant 2 bits indicate
    /// additional information that can be useful in some cases:
    ///
    /// ```notrust
    /// MSb                            LSb
    /// +-----------+---------+----------+
    /// | Signature | Command |  Method  |
    /// |   1 bit   |  1 bit  |  6 bits  |
    /// +-----------+---------+----------+
    /// ```
    ///
    /// * **`Signature`** is set to 1 to indicate that the Attribute Opcode and Parameters are
    ///   followed by an Authentication Signature. This is only allowed for the *Write Command*,
    ///   resulting in the `SignedWriteCommand`.
    /// * **`Command`** is set to 1 when the PDU is a command. Unlike *Requests*, commands are not
    ///   followed by a server response.
    /// * **`Method`** defines which operation to perform.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum Opcode(u8) {
        ErrorRsp = 0x01,
        ExchangeMtuReq = 0x02,
        ExchangeMtuRsp = 0x03,
        FindInformationReq = 0x04,
        FindInformationRsp = 0x05,
        FindByTypeValueReq = 0x06,
        FindByTypeValueRsp = 0x07,
        ReadByTypeReq = 0x08,
        ReadByTypeRsp = 0x09,
        ReadReq = 0x0A,
        ReadRsp = 0x0B,
        ReadBlobReq = 0x0C,
        ReadBlobRsp = 0x0D,
        ReadMultipleReq = 0x0E,
        ReadMultipleRsp = 0x0F,
        ReadByGroupReq = 0x10,
        ReadByGroupRsp = 0x11,
        WriteReq = 0x12,
        WriteRsp = 0x13,
        WriteCommand = 0x52,
        SignedWriteCommand = 0xD2,
        PrepareWriteReq = 0x16,
        PrepareWriteRsp = 0x17,
        ExecuteWriteReq = 0x18,
        ExecuteWriteRsp = 0x19,
        HandleValueNotification = 0x1B,
        HandleValueIndication = 0x1D,
        HandleValueConfirmation = 0x1E,
    }
}

impl Opcode {
    /// Returns the raw byte corresponding to the opcode `self`.
    pub fn raw(&self) -> u8 {
        u8::from(*self)
    }

    /// Returns whether the `Command` bit in this opcode is set.
    ///
    /// Commands sent to the server are not followed by a server response
    /// (ie. it is not indicated whether they succeed).
    pub fn is_command(&self) -> bool {
        self.raw() & 0x40 != 0
    }

    /// Maps a request opcode to its response opcode.
    ///
    /// Returns `None` for responses, commands, notifications and unknown
    /// opcodes, which have no response of their own.
    pub fn response(&self) -> Option<Opcode> {
        Some(match self {
            Opcode::ExchangeMtuReq => Opcode::ExchangeMtuRsp,
            Opcode::FindInformationReq => Opcode::FindInformationRsp,
            Opcode::FindByTypeValueReq => Opcode::FindByTypeValueRsp,
            Opcode::ReadByTypeReq => Opcode::ReadByTypeRsp,
            Opcode::ReadReq => Opcode::ReadRsp,
            Opcode::ReadBlobReq => Opcode::ReadBlobRsp,
            Opcode::ReadMultipleReq => Opcode::ReadMultipleRsp,
            Opcode::ReadByGroupReq => Opcode::ReadByGroupRsp,
            Opcode::WriteReq => Opcode::WriteRsp,
            Opcode::PrepareWriteReq => Opcode::PrepareWriteRsp,
            Opcode::ExecuteWriteReq => Opcode::ExecuteWriteRsp,
            _ => return None,
        })
    }
}

/// An error on the ATT protocol layer. Can be sent as a response.
#[derive(Debug, PartialEq, Eq)]
pub struct AttError {
    code: ErrorCode,
    handle: Handle,
}

impl AttError {
    pub fn new(code: ErrorCode, handle: Handle) -> Self {
        Self { code, handle }
    }

    /// The error code describing this error.
    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    /// The handle of the attribute causing the error.
    ///
    /// This can be the `NULL` handle if there's no attribute to blame.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Encodes the 5-byte Error Response PDU answering the request `req`.
    pub fn response_to(&self, req: Opcode) -> Vec<u8> {
        let handle = self.handle.as_u16();
        vec![
            Opcode::ErrorRsp.raw(),
            req.raw(),
            handle as u8,
            (handle >> 8) as u8,
            u8::from(self.code),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_layout() {
        let err = AttError::new(ErrorCode::ReadNotPermitted, Handle::from_raw(0x0010));
        assert_eq!(
            err.response_to(Opcode::ReadReq),
            vec![0x01, 0x0A, 0x10, 0x00, 0x02]
        );
    }

    #[test]
    fn request_response_pairs() {
        for &req in &[0x02u8, 0x04, 0x06, 0x08, 0x0A, 0x0C, 0x0E, 0x10, 0x12, 0x16, 0x18] {
            let rsp = Opcode::from(req).response();
            assert_eq!(rsp.map(|o| o.raw()), Some(req + 1));
        }
        assert_eq!(Opcode::WriteCommand.response(), None);
        assert_eq!(Opcode::ErrorRsp.response(), None);
    }

    #[test]
    fn command_bit() {
        assert!(Opcode::WriteCommand.is_command());
        assert!(Opcode::SignedWriteCommand.is_command());
        assert!(!Opcode::WriteReq.is_command());
        assert!(!Opcode::ReadReq.is_command());
    }

    #[test]
    fn unknown_opcodes_round_trip() {
        let op = Opcode::from(0xC3);
        assert_eq!(op, Opcode::Unknown(0xC3));
        assert_eq!(op.raw(), 0xC3);
        assert_eq!(u8::from(ErrorCode::from(0x85)), 0x85);
    }
}
