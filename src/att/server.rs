//! The per-connection ATT request dispatcher.

use crate::att::{
    AttError, Attribute, AttributeDb, ErrorCode, Handle, HandleRange, Notifier, Opcode, Owner,
    Props, RawHandleRange, ReadRequest, Request, ResponseWriter, SecurityLevel,
};
use crate::bytes::{ByteReader, FromBytes};
use crate::gatt::{CCC_INDICATE, CCC_NOTIFY, CLIENT_CHARACTERISTIC_CONFIG, PRIMARY_SERVICE};
use crate::l2cap::{Channel, L2capWriter};
use crate::utils::HexSlice;
use crate::Error;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};
use std::thread;

/// ATT_MTU before (or without) an MTU exchange.
pub const DEFAULT_MTU: u16 = 23;

/// Largest ATT_MTU this server will negotiate.
pub const MAX_MTU: u16 = 256;

/// L2CAP implementations shall support a minimum MTU size of 48 bytes; the
/// default value is 672 bytes, which bounds the PDUs a central can send us.
const READ_BUF_LEN: usize = 672;

/// Find Information response format: handle + 16-bit UUID pairs.
const FORMAT_UUID16: u8 = 0x01;
/// Find Information response format: handle + 128-bit UUID pairs.
const FORMAT_UUID128: u8 = 0x02;

/// One connected central: the server side of a single ATT bearer.
///
/// Owns the connection's protocol state (negotiated MTU, link security,
/// notifier registry) and dispatches every inbound PDU against the shared
/// [`AttributeDb`]. Run [`serve`] on a dedicated thread per connection.
///
/// [`AttributeDb`]: struct.AttributeDb.html
/// [`serve`]: #method.serve
pub struct Central {
    db: Arc<AttributeDb>,
    chan: Arc<dyn Channel>,
    addr: String,
    mtu: u16,
    security: SecurityLevel,
    write_lock: Arc<Mutex<()>>,
    notifiers: Mutex<HashMap<Handle, Notifier>>,
}

impl Central {
    /// Creates the server end of a connection to the central at `addr`.
    pub fn new(db: Arc<AttributeDb>, chan: Arc<dyn Channel>, addr: impl Into<String>) -> Self {
        Self {
            db,
            chan,
            addr: addr.into(),
            mtu: DEFAULT_MTU,
            security: SecurityLevel::Low,
            write_lock: Arc::new(Mutex::new(())),
            notifiers: Mutex::new(HashMap::new()),
        }
    }

    /// The central's address, as reported by the platform.
    pub fn id(&self) -> &str {
        &self.addr
    }

    /// The currently negotiated ATT_MTU.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Current link security level.
    pub fn security(&self) -> SecurityLevel {
        self.security
    }

    /// Records a link security change signalled by the platform's security
    /// manager.
    pub fn set_security(&mut self, level: SecurityLevel) {
        self.security = level;
    }

    /// Reads and dispatches PDUs until the central disconnects or the
    /// channel fails, then closes the connection.
    pub fn serve(&mut self) {
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            let n = match self.chan.recv(&mut buf) {
                Ok(0) => {
                    debug!("central {}: connection closed by peer", self.addr);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    debug!("central {}: read failed: {}", self.addr, e);
                    break;
                }
            };

            if let Some(rsp) = self.dispatch(&buf[..n]) {
                let result = {
                    let _guard = self.write_lock.lock().unwrap();
                    self.chan.send(&rsp)
                };
                if let Err(e) = result {
                    warn!("central {}: write failed: {}", self.addr, e);
                }
            }
        }
        self.close();
    }

    /// Stops every notifier registered on this connection, then shuts the
    /// channel down. Safe to call more than once.
    pub fn close(&self) {
        let notifiers = mem::take(&mut *self.notifiers.lock().unwrap());
        for notifier in notifiers.values() {
            notifier.stop();
        }
        if let Err(e) = self.chan.shutdown() {
            debug!("central {}: shutdown failed: {}", self.addr, e);
        }
    }

    /// Processes one inbound PDU and returns the response to write back, if
    /// any.
    ///
    /// Protocol errors come back as Error Response PDUs; they never fail the
    /// connection. Write Commands produce no response at all, not even on
    /// failure.
    pub fn dispatch(&mut self, pdu: &[u8]) -> Option<Vec<u8>> {
        let mut r = ByteReader::new(pdu);
        let op = match r.read_u8() {
            Ok(byte) => Opcode::from(byte),
            Err(_) => return None,
        };
        let body = r.read_rest();
        debug!("ATT<- {:?} {:?}", op, HexSlice(body));

        match self.process(op, body) {
            Ok(rsp) => rsp,
            Err(err) if op == Opcode::WriteCommand => {
                debug!("ATT-- {:?} silently dropped: {:?}", op, err);
                None
            }
            Err(err) => {
                debug!("ATT-> {:?}", err);
                Some(err.response_to(op))
            }
        }
    }

    fn process(&mut self, op: Opcode, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        match op {
            Opcode::ExchangeMtuReq => self.exchange_mtu(body),
            Opcode::FindInformationReq => self.find_information(body),
            Opcode::FindByTypeValueReq => self.find_by_type_value(body),
            Opcode::ReadByTypeReq => self.read_by_type(body),
            Opcode::ReadReq => self.read(body),
            Opcode::ReadBlobReq => self.read_blob(body),
            Opcode::ReadByGroupReq => self.read_by_group(body),
            Opcode::WriteReq | Opcode::WriteCommand => self.write(op, body),
            _ => Err(AttError::new(ErrorCode::RequestNotSupported, Handle::NULL)),
        }
    }

    /// REQ: client MTU (u16). RSP: server MTU (u16), which both sides adopt.
    fn exchange_mtu(&mut self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let client = r.read_u16_le().map_err(invalid_pdu)?;
        self.mtu = client.max(DEFAULT_MTU).min(MAX_MTU);
        trace!("central {}: MTU {} -> {}", self.addr, client, self.mtu);
        Ok(Some(vec![
            Opcode::ExchangeMtuRsp.raw(),
            self.mtu as u8,
            (self.mtu >> 8) as u8,
        ]))
    }

    /// REQ: handle range. RSP: UUID format byte, then uniform
    /// `{handle, type}` pairs.
    fn find_information(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let range = parse_range(&mut r)?;

        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::FindInformationRsp.raw());

        let mut uuid_len = None;
        for attr in self.db.subrange(&range) {
            let len = attr.att_type.len();
            match uuid_len {
                None => {
                    uuid_len = Some(len);
                    w.write_byte_fit(if len == 2 { FORMAT_UUID16 } else { FORMAT_UUID128 });
                }
                Some(expected) if expected != len => break,
                Some(_) => {}
            }

            w.chunk();
            w.write_u16_fit(attr.handle.as_u16());
            w.write_uuid_fit(&attr.att_type);
            if !w.commit() {
                break;
            }
        }

        if uuid_len.is_none() {
            return Err(AttError::new(ErrorCode::AttributeNotFound, range.start()));
        }
        Ok(Some(w.bytes()))
    }

    /// REQ: handle range, 16-bit type, value. RSP: `{start, end}` handle
    /// pairs of the matching service groups.
    ///
    /// Only the "Discover Primary Service By Service UUID" sub-procedure is
    /// supported, so the type must be Primary Service.
    fn find_by_type_value(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let range = parse_range(&mut r)?;
        let att_type = r.read_u16_le().map_err(invalid_pdu)?;
        let value = r.read_rest();

        if crate::uuid::Uuid16(att_type) != PRIMARY_SERVICE {
            return Err(AttError::new(ErrorCode::AttributeNotFound, range.start()));
        }

        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::FindByTypeValueRsp.raw());

        let mut wrote = false;
        for attr in self.db.subrange(&range) {
            if attr.att_type != PRIMARY_SERVICE {
                continue;
            }
            if attr.value.as_deref() != Some(value) {
                continue;
            }
            let (start, end) = match attr.owner {
                Owner::Service { start, end } => (start, end),
                _ => continue,
            };

            w.chunk();
            w.write_u16_fit(start.as_u16());
            w.write_u16_fit(end.as_u16());
            if !w.commit() {
                break;
            }
            wrote = true;
        }

        if !wrote {
            return Err(AttError::new(ErrorCode::AttributeNotFound, range.start()));
        }
        Ok(Some(w.bytes()))
    }

    /// REQ: handle range, type UUID. RSP: element length byte, then uniform
    /// `{handle, value}` pairs.
    fn read_by_type(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let range = parse_range(&mut r)?;
        let att_type = crate::uuid::Uuid::from_bytes(&mut r).map_err(invalid_pdu)?;

        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::ReadByTypeRsp.raw());

        let mut elem_len = None;
        for attr in self.db.subrange(&range) {
            if attr.att_type != att_type {
                continue;
            }
            self.check_secure(attr, Props::READ)
                .map_err(|code| AttError::new(code, range.start()))?;

            let value = self.read_value(attr, 0);
            match elem_len {
                None => {
                    elem_len = Some(value.len());
                    w.write_byte_fit((value.len() + 2) as u8);
                }
                Some(expected) if expected != value.len() => break,
                Some(_) => {}
            }

            w.chunk();
            w.write_u16_fit(attr.handle.as_u16());
            w.write_fit(&value);
            if !w.commit() {
                break;
            }
        }

        if elem_len.is_none() {
            return Err(AttError::new(ErrorCode::AttributeNotFound, range.start()));
        }
        Ok(Some(w.bytes()))
    }

    /// REQ: handle. RSP: attribute value, truncated to `MTU - 1`.
    fn read(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let handle = Handle::from_bytes(&mut r).map_err(invalid_pdu)?;
        let attr = self.readable(handle)?;

        let value = self.read_value(attr, 0);
        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::ReadRsp.raw());
        w.chunk();
        w.write_fit(&value);
        w.commit_fit();
        Ok(Some(w.bytes()))
    }

    /// REQ: handle, value offset. RSP: the value's tail from the offset on.
    ///
    /// For a stored value the server applies the offset itself; a read
    /// handler receives the offset through the request and is expected to
    /// have applied it already.
    fn read_blob(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let handle = Handle::from_bytes(&mut r).map_err(invalid_pdu)?;
        let offset = r.read_u16_le().map_err(invalid_pdu)?;
        let attr = self.readable(handle)?;

        let (value, seek) = match &attr.value {
            Some(stored) => (stored.clone(), offset),
            None => (self.read_value(attr, usize::from(offset)), 0),
        };

        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::ReadBlobRsp.raw());
        w.chunk();
        w.write_fit(&value);
        if !w.chunk_seek(seek) {
            return Err(AttError::new(ErrorCode::InvalidOffset, handle));
        }
        w.commit_fit();
        Ok(Some(w.bytes()))
    }

    /// REQ: handle range, group type. RSP: element length byte, then uniform
    /// `{start, end, value}` triples.
    ///
    /// Only the "Discover All Primary Services" sub-procedure is supported;
    /// any other group type is rejected.
    fn read_by_group(&self, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let range = parse_range(&mut r)?;
        let group_type = crate::uuid::Uuid::from_bytes(&mut r).map_err(invalid_pdu)?;

        if group_type != PRIMARY_SERVICE {
            return Err(AttError::new(ErrorCode::UnsupportedGroupType, range.start()));
        }

        let mut w = L2capWriter::new(self.mtu);
        w.write_byte_fit(Opcode::ReadByGroupRsp.raw());

        let mut elem_len = None;
        for attr in self.db.subrange(&range) {
            if attr.att_type != PRIMARY_SERVICE {
                continue;
            }
            let value = match &attr.value {
                Some(value) => value,
                None => continue,
            };
            match elem_len {
                None => {
                    elem_len = Some(value.len());
                    w.write_byte_fit((value.len() + 4) as u8);
                }
                Some(expected) if expected != value.len() => break,
                Some(_) => {}
            }
            let (start, end) = match attr.owner {
                Owner::Service { start, end } => (start, end),
                _ => continue,
            };

            w.chunk();
            w.write_u16_fit(start.as_u16());
            w.write_u16_fit(end.as_u16());
            w.write_fit(value);
            if !w.commit() {
                break;
            }
        }

        if elem_len.is_none() {
            return Err(AttError::new(ErrorCode::AttributeNotFound, range.start()));
        }
        Ok(Some(w.bytes()))
    }

    /// REQ: handle, value. RSP: Write Response, or nothing for the command
    /// form.
    ///
    /// A write into a CCC descriptor toggles the notification stream instead
    /// of reaching a handler; everything else is dispatched to the owning
    /// characteristic's or descriptor's write handler.
    fn write(&self, op: Opcode, body: &[u8]) -> Result<Option<Vec<u8>>, AttError> {
        let mut r = ByteReader::new(body);
        let handle = Handle::from_bytes(&mut r).map_err(invalid_pdu)?;
        let value = r.read_rest();

        let no_rsp = op.is_command();
        let attr = self
            .db
            .at(handle)
            .ok_or_else(|| AttError::new(ErrorCode::InvalidHandle, handle))?;

        let access = if no_rsp {
            Props::WRITE_NO_RSP
        } else {
            Props::WRITE
        };
        if !attr.props.contains(access) {
            return Err(AttError::new(ErrorCode::WriteNotPermitted, handle));
        }
        self.check_secure(attr, access)
            .map_err(|code| AttError::new(code, handle))?;

        let write_rsp = || {
            if no_rsp {
                None
            } else {
                Some(vec![Opcode::WriteRsp.raw()])
            }
        };

        if attr.att_type != CLIENT_CHARACTERISTIC_CONFIG {
            let handler = match &attr.owner {
                Owner::Characteristic(chr) => chr.handlers.write.as_ref(),
                Owner::Descriptor { handlers, .. } => handlers.write.as_ref(),
                Owner::Service { .. } => None,
            };
            let handler =
                handler.ok_or_else(|| AttError::new(ErrorCode::WriteNotPermitted, handle))?;
            return match handler.write(&self.request(), value) {
                Ok(()) => Ok(write_rsp()),
                Err(code) => Err(AttError::new(code, handle)),
            };
        }

        // CCC write: two little-endian flag bytes gating the notifier.
        if value.len() != 2 {
            return Err(AttError::new(
                ErrorCode::InvalidAttributeValueLength,
                handle,
            ));
        }
        let ccc = u16::from_le_bytes([value[0], value[1]]);
        if ccc & (CCC_NOTIFY | CCC_INDICATE) != 0 {
            self.start_notify(attr);
        } else {
            self.stop_notify(attr.handle);
        }
        Ok(write_rsp())
    }

    /// Looks up `handle` and enforces read permission and read security.
    fn readable(&self, handle: Handle) -> Result<&Attribute, AttError> {
        let attr = self
            .db
            .at(handle)
            .ok_or_else(|| AttError::new(ErrorCode::InvalidHandle, handle))?;
        if !attr.props.contains(Props::READ) {
            return Err(AttError::new(ErrorCode::ReadNotPermitted, handle));
        }
        self.check_secure(attr, Props::READ)
            .map_err(|code| AttError::new(code, handle))?;
        Ok(attr)
    }

    fn check_secure(&self, attr: &Attribute, access: Props) -> Result<(), ErrorCode> {
        if attr.secure.contains(access) && self.security < SecurityLevel::Med {
            return Err(ErrorCode::InsufficientAuthentication);
        }
        Ok(())
    }

    /// Returns the attribute's value: the stored bytes, or whatever the read
    /// handler produces into a `MTU - 1` bounded writer.
    fn read_value(&self, attr: &Attribute, offset: usize) -> Vec<u8> {
        if let Some(stored) = &attr.value {
            return stored.clone();
        }

        let cap = usize::from(self.mtu - 1);
        let mut rsp = ResponseWriter::new(cap);
        let req = ReadRequest {
            req: self.request(),
            cap,
            offset,
        };
        let handler = match &attr.owner {
            Owner::Characteristic(chr) => chr.handlers.read.as_ref(),
            Owner::Descriptor { handlers, .. } => handlers.read.as_ref(),
            Owner::Service { .. } => None,
        };
        if let Some(handler) = handler {
            handler.read(&mut rsp, &req);
        }
        rsp.into_bytes()
    }

    fn request(&self) -> Request {
        Request {
            peer: self.addr.clone(),
            mtu: self.mtu,
        }
    }

    /// Registers a notifier for the characteristic behind the CCC attribute
    /// `attr` and spawns its notify handler. No-op if one is already live.
    fn start_notify(&self, attr: &Attribute) {
        let chr = match &attr.owner {
            Owner::Descriptor { chr, .. } => chr.clone(),
            _ => {
                warn!("CCC {:?} is not a descriptor attribute", attr.handle);
                return;
            }
        };

        let mut notifiers = self.notifiers.lock().unwrap();
        if notifiers.contains_key(&attr.handle) {
            return;
        }
        let notifier = Notifier::new(
            self.chan.clone(),
            self.write_lock.clone(),
            chr.value_handle,
            self.mtu,
        );
        notifiers.insert(attr.handle, notifier.clone());
        drop(notifiers);
        trace!(
            "central {}: notifications on for {:?}",
            self.addr,
            chr.value_handle
        );

        if chr.handlers.notify.is_none() {
            return;
        }
        let req = self.request();
        let spawned = thread::Builder::new()
            .name(format!("notify-{:04x}", chr.value_handle.as_u16()))
            .spawn(move || {
                if let Some(handler) = &chr.handlers.notify {
                    handler.notify(&req, notifier);
                }
            });
        if let Err(e) = spawned {
            warn!("central {}: failed to spawn notify handler: {}", self.addr, e);
        }
    }

    fn stop_notify(&self, ccc: Handle) {
        if let Some(notifier) = self.notifiers.lock().unwrap().remove(&ccc) {
            notifier.stop();
            trace!("central {}: notifications off for {:?}", self.addr, ccc);
        }
    }
}

fn invalid_pdu(_: Error) -> AttError {
    AttError::new(ErrorCode::InvalidPdu, Handle::NULL)
}

/// Parses and validates the handle-range prefix shared by the discovery
/// requests.
fn parse_range(r: &mut ByteReader<'_>) -> Result<HandleRange, AttError> {
    RawHandleRange::from_bytes(r).map_err(invalid_pdu)?.check()
}
