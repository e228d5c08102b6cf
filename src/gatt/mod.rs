//! Implementation of the Generic Attribute Profile (GATT).
//!
//! GATT organizes attributes into *services* containing *characteristics*,
//! which in turn carry *descriptors*. This module provides the builders an
//! application describes its profile with, and [`build_attributes`], which
//! lowers the description into the flat, handle-ordered [`AttributeDb`] the
//! ATT dispatcher serves.
//!
//! A service occupies a contiguous handle range: its declaration attribute,
//! then per characteristic a declaration attribute, the value attribute and
//! any descriptors. A characteristic that supports notifications gets a
//! Client Characteristic Configuration descriptor appended automatically
//! unless the application declared its own.
//!
//! [`build_attributes`]: fn.build_attributes.html
//! [`AttributeDb`]: ../att/struct.AttributeDb.html

use crate::att::{
    Attribute, AttributeDb, CharacteristicInner, Handle, Handlers, NotifyHandler, Owner, Props,
    ReadHandler, WriteHandler,
};
use crate::uuid::{Uuid, Uuid16};
use std::sync::Arc;

pub const GAP_SERVICE: Uuid16 = Uuid16(0x1800);
pub const GATT_SERVICE: Uuid16 = Uuid16(0x1801);

pub const PRIMARY_SERVICE: Uuid16 = Uuid16(0x2800);
pub const SECONDARY_SERVICE: Uuid16 = Uuid16(0x2801);
pub const INCLUDE: Uuid16 = Uuid16(0x2802);
pub const CHARACTERISTIC: Uuid16 = Uuid16(0x2803);

pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid16 = Uuid16(0x2902);
pub const SERVER_CHARACTERISTIC_CONFIG: Uuid16 = Uuid16(0x2903);

pub const DEVICE_NAME: Uuid16 = Uuid16(0x2A00);
pub const APPEARANCE: Uuid16 = Uuid16(0x2A01);
pub const PERIPHERAL_PRIVACY_FLAG: Uuid16 = Uuid16(0x2A02);
pub const RECONNECTION_ADDRESS: Uuid16 = Uuid16(0x2A03);
pub const PERIPHERAL_PREFERRED_CONN_PARAMS: Uuid16 = Uuid16(0x2A04);
pub const SERVICE_CHANGED: Uuid16 = Uuid16(0x2A05);

/// CCC value bit enabling notifications.
pub const CCC_NOTIFY: u16 = 0x0001;
/// CCC value bit enabling indications.
pub const CCC_INDICATE: u16 = 0x0002;

/// A primary service under construction.
pub struct Service {
    uuid: Uuid,
    characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            characteristics: Vec::new(),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    /// Adds a characteristic and returns it for configuration.
    pub fn add_characteristic(&mut self, uuid: impl Into<Uuid>) -> &mut Characteristic {
        self.characteristics.push(Characteristic::new(uuid.into()));
        self.characteristics.last_mut().unwrap()
    }
}

/// A characteristic under construction.
///
/// Access properties accumulate as value sources are attached: a stored
/// value or read handler makes it readable, a write handler writable, a
/// notify handler notifiable.
pub struct Characteristic {
    uuid: Uuid,
    props: Props,
    secure: Props,
    value: Option<Vec<u8>>,
    handlers: Handlers,
    descriptors: Vec<Descriptor>,
}

impl Characteristic {
    fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            props: Props::empty(),
            secure: Props::empty(),
            value: None,
            handlers: Handlers::default(),
            descriptors: Vec::new(),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn props(&self) -> Props {
        self.props
    }

    /// Stores a fixed value, making the characteristic readable without a
    /// handler.
    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) -> &mut Self {
        self.value = Some(value.into());
        self.props |= Props::READ;
        self
    }

    /// Replaces the access properties. Normally they accumulate from the
    /// attached value sources; this is for declarations that advertise
    /// capabilities the attribute layer does not serve itself (eg.
    /// indicate-only Service Changed).
    pub fn set_props(&mut self, props: Props) -> &mut Self {
        self.props = props;
        self
    }

    /// Marks the given access modes as requiring an elevated link.
    pub fn set_secure(&mut self, modes: Props) -> &mut Self {
        self.secure = modes;
        self
    }

    /// Attaches a read handler, invoked whenever the value is read and no
    /// stored value exists.
    pub fn handle_read(&mut self, handler: impl ReadHandler + 'static) -> &mut Self {
        self.handlers.read = Some(Box::new(handler));
        self.props |= Props::READ;
        self
    }

    /// Attaches a write handler.
    pub fn handle_write(&mut self, handler: impl WriteHandler + 'static) -> &mut Self {
        self.handlers.write = Some(Box::new(handler));
        self.props |= Props::WRITE | Props::WRITE_NO_RSP;
        self
    }

    /// Attaches a notify handler, spawned when a central subscribes through
    /// the CCC descriptor.
    pub fn handle_notify(&mut self, handler: impl NotifyHandler + 'static) -> &mut Self {
        self.handlers.notify = Some(Box::new(handler));
        self.props |= Props::NOTIFY | Props::INDICATE;
        self
    }

    /// Adds a descriptor and returns it for configuration.
    pub fn add_descriptor(&mut self, uuid: impl Into<Uuid>) -> &mut Descriptor {
        self.descriptors.push(Descriptor::new(uuid.into()));
        self.descriptors.last_mut().unwrap()
    }
}

/// A characteristic descriptor under construction.
pub struct Descriptor {
    uuid: Uuid,
    props: Props,
    secure: Props,
    value: Option<Vec<u8>>,
    handlers: Handlers,
}

impl Descriptor {
    fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            props: Props::empty(),
            secure: Props::empty(),
            value: None,
            handlers: Handlers::default(),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    /// Stores a fixed value, making the descriptor readable.
    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) -> &mut Self {
        self.value = Some(value.into());
        self.props |= Props::READ;
        self
    }

    /// Stores a fixed UTF-8 value (eg. a Characteristic User Description).
    pub fn set_string_value(&mut self, value: &str) -> &mut Self {
        self.set_value(value.as_bytes())
    }

    /// Marks the given access modes as requiring an elevated link.
    pub fn set_secure(&mut self, modes: Props) -> &mut Self {
        self.secure = modes;
        self
    }

    pub fn handle_read(&mut self, handler: impl ReadHandler + 'static) -> &mut Self {
        self.handlers.read = Some(Box::new(handler));
        self.props |= Props::READ;
        self
    }

    pub fn handle_write(&mut self, handler: impl WriteHandler + 'static) -> &mut Self {
        self.handlers.write = Some(Box::new(handler));
        self.props |= Props::WRITE | Props::WRITE_NO_RSP;
        self
    }
}

/// Lowers services into the flat attribute database, assigning strictly
/// increasing handles starting at `base`.
pub fn build_attributes(services: Vec<Service>, base: u16) -> AttributeDb {
    assert!(base != 0, "handle 0x0000 is reserved");

    let mut attrs = Vec::new();
    let mut next = base;
    for service in services {
        let decl_index = attrs.len();
        let start = Handle::from_raw(next);
        let mut value = Vec::new();
        service.uuid.write_wire(&mut value);
        attrs.push(Attribute {
            handle: start,
            att_type: PRIMARY_SERVICE.into(),
            value: Some(value),
            props: Props::READ,
            secure: Props::empty(),
            owner: Owner::Service { start, end: start },
        });
        next += 1;

        for chr in service.characteristics {
            let value_handle = Handle::from_raw(next + 1);
            let mut descriptors = chr.descriptors;
            if chr.props.intersects(Props::NOTIFY | Props::INDICATE)
                && !descriptors
                    .iter()
                    .any(|d| d.uuid == CLIENT_CHARACTERISTIC_CONFIG)
            {
                let mut ccc = Descriptor::new(CLIENT_CHARACTERISTIC_CONFIG.into());
                ccc.set_value(vec![0x00, 0x00]);
                ccc.props = Props::READ | Props::WRITE | Props::WRITE_NO_RSP;
                descriptors.push(ccc);
            }

            let inner = Arc::new(CharacteristicInner {
                value_handle,
                handlers: chr.handlers,
            });

            // Declaration value: properties, value handle, characteristic
            // UUID, all little-endian.
            let mut decl = vec![
                chr.props.bits(),
                value_handle.as_u16() as u8,
                (value_handle.as_u16() >> 8) as u8,
            ];
            chr.uuid.write_wire(&mut decl);
            attrs.push(Attribute {
                handle: Handle::from_raw(next),
                att_type: CHARACTERISTIC.into(),
                value: Some(decl),
                props: Props::READ,
                secure: Props::empty(),
                owner: Owner::Characteristic(inner.clone()),
            });
            attrs.push(Attribute {
                handle: value_handle,
                att_type: chr.uuid,
                value: chr.value,
                props: chr.props,
                secure: chr.secure,
                owner: Owner::Characteristic(inner.clone()),
            });
            next += 2;

            for desc in descriptors {
                attrs.push(Attribute {
                    handle: Handle::from_raw(next),
                    att_type: desc.uuid,
                    value: desc.value,
                    props: desc.props,
                    secure: desc.secure,
                    owner: Owner::Descriptor {
                        handlers: Arc::new(desc.handlers),
                        chr: inner.clone(),
                    },
                });
                next += 1;
            }
        }

        attrs[decl_index].owner = Owner::Service {
            start,
            end: Handle::from_raw(next - 1),
        };
    }

    AttributeDb::new(attrs)
}

/// The mandatory Generic Access service (`0x1800`) with the device name and
/// appearance characteristics.
pub fn gap_service(name: &str) -> Service {
    let mut service = Service::new(GAP_SERVICE);
    service.add_characteristic(DEVICE_NAME).set_value(name.as_bytes());
    service
        .add_characteristic(APPEARANCE)
        .set_value(vec![0x00, 0x00]);
    service
}

/// The Generic Attribute service (`0x1801`) with an indicate-only Service
/// Changed characteristic.
pub fn gatt_service() -> Service {
    let mut service = Service::new(GATT_SERVICE);
    service
        .add_characteristic(SERVICE_CHANGED)
        .set_props(Props::INDICATE);
    service
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::Uuid128;

    #[test]
    fn handles_are_contiguous_per_service() {
        let mut first = Service::new(Uuid16(0x1800));
        {
            let chr = first.add_characteristic(Uuid16(0x2A00));
            chr.set_value(&b"x"[..]);
            chr.add_descriptor(Uuid16(0x2901)).set_string_value("a");
            chr.add_descriptor(Uuid16(0x2904)).set_value(vec![0x00]);
        }
        let mut second = Service::new(Uuid16(0x1801));
        second.add_characteristic(Uuid16(0x2A05)).set_value(vec![]);

        let db = build_attributes(vec![first, second], 1);
        assert_eq!(db.len(), 8);

        let decl = db.at(Handle::from_raw(1)).unwrap();
        assert_eq!(decl.value.as_deref(), Some(&[0x00, 0x18][..]));
        match decl.owner {
            Owner::Service { start, end } => {
                assert_eq!(start.as_u16(), 1);
                assert_eq!(end.as_u16(), 5);
            }
            _ => panic!("service declaration must carry its group"),
        }

        match db.at(Handle::from_raw(6)).unwrap().owner {
            Owner::Service { start, end } => {
                assert_eq!(start.as_u16(), 6);
                assert_eq!(end.as_u16(), 8);
            }
            _ => panic!("service declaration must carry its group"),
        }
    }

    #[test]
    fn characteristic_declaration_encoding() {
        let mut service = Service::new(Uuid16(0x180D));
        service
            .add_characteristic(Uuid16(0x2A37))
            .handle_notify(|_req: &crate::att::Request, _n: crate::att::Notifier| {});

        let db = build_attributes(vec![service], 1);
        let decl = db.at(Handle::from_raw(2)).unwrap();
        assert_eq!(decl.att_type, CHARACTERISTIC);
        assert_eq!(decl.value.as_deref(), Some(&[0x30, 0x03, 0x00, 0x37, 0x2A][..]));
        assert_eq!(decl.props, Props::READ);
    }

    #[test]
    fn notify_characteristic_gets_a_ccc() {
        let mut service = Service::new(Uuid16(0x180D));
        service
            .add_characteristic(Uuid16(0x2A37))
            .handle_notify(|_req: &crate::att::Request, _n: crate::att::Notifier| {});

        let db = build_attributes(vec![service], 1);
        let ccc = db.at(Handle::from_raw(4)).unwrap();
        assert_eq!(ccc.att_type, CLIENT_CHARACTERISTIC_CONFIG);
        assert_eq!(ccc.value.as_deref(), Some(&[0x00, 0x00][..]));
        assert!(ccc.props.contains(Props::READ | Props::WRITE));
        match &ccc.owner {
            Owner::Descriptor { chr, .. } => assert_eq!(chr.value_handle.as_u16(), 3),
            _ => panic!("CCC must be a descriptor"),
        }
    }

    #[test]
    fn explicit_ccc_is_not_duplicated() {
        let mut service = Service::new(Uuid16(0x180D));
        {
            let chr = service.add_characteristic(Uuid16(0x2A37));
            chr.handle_notify(|_req: &crate::att::Request, _n: crate::att::Notifier| {});
            chr.add_descriptor(CLIENT_CHARACTERISTIC_CONFIG)
                .set_value(vec![0x00, 0x00])
                .handle_write(|_req: &crate::att::Request, _v: &[u8]| Ok(()));
        }

        let db = build_attributes(vec![service], 1);
        let cccs = db
            .iter()
            .filter(|a| a.att_type == CLIENT_CHARACTERISTIC_CONFIG)
            .count();
        assert_eq!(cccs, 1);
    }

    #[test]
    fn full_width_service_uuid() {
        let uuid = Uuid128::from(Uuid16(0x180F));
        let mut service = Service::new(uuid);
        service.add_characteristic(Uuid16(0x2A19)).set_value(vec![100]);

        let db = build_attributes(vec![service], 1);
        let decl = db.at(Handle::from_raw(1)).unwrap();
        assert_eq!(decl.value.as_deref(), Some(&uuid.as_bytes()[..]));
    }

    #[test]
    fn mandatory_services_layout() {
        let db = build_attributes(vec![gap_service("dev"), gatt_service()], 1);

        let name = db.at(Handle::from_raw(3)).unwrap();
        assert_eq!(name.att_type, DEVICE_NAME);
        assert_eq!(name.value.as_deref(), Some(&b"dev"[..]));

        // Service Changed is indicate-only and grows a CCC.
        let changed = db.at(Handle::from_raw(8)).unwrap();
        assert_eq!(changed.att_type, SERVICE_CHANGED);
        assert_eq!(changed.props, Props::INDICATE);
        let ccc = db.at(Handle::from_raw(9)).unwrap();
        assert_eq!(ccc.att_type, CLIENT_CHARACTERISTIC_CONFIG);
    }
}
