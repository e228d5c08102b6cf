//! Implementation of the Attribute Protocol (ATT), server role.
//!
//! ATT always runs over L2CAP channel `0x0004`, which is connected by default
//! as soon as the Link-Layer connection is established.
//!
//! ATT is used by GATT, the *Generic Attribute Profile*, which introduces the
//! concepts of *Services* and *Characteristics* that can all be accessed and
//! discovered over the Attribute Protocol (see the [`gatt`] module for the
//! schema builders).
//!
//! # Attributes
//!
//! The ATT server hosts an ordered list of *Attributes*, which consist of the
//! following:
//!
//! * A 16-bit *Attribute Handle* ([`Handle`]) uniquely identifying the
//!   attribute; handles are strictly increasing across the database.
//! * A 16- or 128-bit UUID identifying the attribute type.
//! * The attribute's *value*. A stored value is served directly; an absent
//!   value is produced on demand by the attribute's read handler.
//! * A set of access properties ([`Props`]) and a second mask marking which
//!   access modes require an elevated link ([`Attribute::secure`]).
//! * A back-reference ([`Owner`]) to the schema object the attribute belongs
//!   to, which is what permission checks and handler dispatch switch on.
//!
//! [`gatt`]: ../gatt/index.html
//! [`Handle`]: struct.Handle.html
//! [`Props`]: struct.Props.html
//! [`Owner`]: enum.Owner.html
//! [`Attribute::secure`]: struct.Attribute.html#structfield.secure

mod db;
mod handle;
mod handlers;
mod notifier;
mod pdus;
mod server;

pub use self::db::AttributeDb;
pub use self::handle::{Handle, HandleRange, RawHandleRange};
pub use self::handlers::{
    Handlers, NotifyHandler, ReadHandler, ReadRequest, Request, ResponseWriter, WriteHandler,
};
pub use self::notifier::Notifier;
pub use self::pdus::{AttError, ErrorCode, Opcode};
pub use self::server::{Central, DEFAULT_MTU, MAX_MTU};

use crate::uuid::Uuid;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Attribute access properties.
    ///
    /// On a characteristic these are also encoded into the declaration
    /// attribute's value, so the bit layout is the one from the GATT
    /// characteristic properties field.
    pub struct Props: u8 {
        const BROADCAST    = 0x01;
        const READ         = 0x02;
        const WRITE_NO_RSP = 0x04;
        const WRITE        = 0x08;
        const NOTIFY       = 0x10;
        const INDICATE     = 0x20;
        const AUTH_WRITES  = 0x40;
        const EXTENDED     = 0x80;
    }
}

/// Security level of the link to a central.
///
/// Fresh connections start at `Low`; the platform's security manager raises
/// the level after pairing/encryption (which is outside this crate).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    Low,
    Med,
    High,
}

/// An attribute hosted by the server.
pub struct Attribute {
    /// Unique server-side identifier for the attribute.
    pub handle: Handle,
    /// The type of the attribute, eg. "Primary Service" or a characteristic
    /// value UUID.
    pub att_type: Uuid,
    /// Stored value bytes. `None` means the value is produced by the owner's
    /// read handler.
    pub value: Option<Vec<u8>>,
    /// Permitted access modes.
    pub props: Props,
    /// Access modes that additionally require an elevated link.
    pub secure: Props,
    /// The schema object this attribute belongs to.
    pub owner: Owner,
}

/// Back-reference from an attribute to the schema object that owns it.
///
/// The dispatcher switches on this tag at permission-check and
/// handler-invocation sites.
#[derive(Clone)]
pub enum Owner {
    /// A service declaration. Carries the service's handle group, emitted by
    /// the grouping discovery requests.
    Service { start: Handle, end: Handle },

    /// A characteristic declaration or value attribute.
    Characteristic(Arc<CharacteristicInner>),

    /// A descriptor attribute. `handlers` are the descriptor's own; `chr`
    /// links back (non-owning) to the described characteristic, whose value
    /// handle and notify handler the CCC write path needs.
    Descriptor {
        handlers: Arc<Handlers>,
        chr: Arc<CharacteristicInner>,
    },
}

/// The runtime seat of a characteristic, shared by its declaration attribute,
/// its value attribute and its descriptors.
pub struct CharacteristicInner {
    /// Handle of the characteristic's value attribute.
    pub value_handle: Handle,
    /// The read/write/notify capabilities attached by the application.
    pub handlers: Handlers,
}
