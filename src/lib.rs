//! A GATT server core for BLE peripherals.
//!
//! This crate implements the server side of the Attribute Protocol (ATT) and
//! the GATT service framework built on top of it: an immutable attribute
//! database assembled from services, characteristics and descriptors, a
//! per-connection request dispatcher, and a notification subsystem that
//! streams characteristic values to a subscribed central.
//!
//! The pieces below the attribute layer are deliberately not part of this
//! crate: HCI transport, advertising control and the platform L2CAP socket
//! are external collaborators. The only thing the dispatcher needs from the
//! platform is a [`Channel`], a byte-oriented connection that can be read and
//! written from multiple threads.
//!
//! # Typical use
//!
//! 1. Describe services with the builders in [`gatt`] and lower them into an
//!    [`AttributeDb`] with [`build_attributes`].
//! 2. For every connected central, create an [`att::Central`] with the shared
//!    database and the connection's channel, and run its `serve` loop on its
//!    own thread.
//! 3. Assemble the advertising payload with [`AdvPacket`].
//!
//! [`Channel`]: l2cap/trait.Channel.html
//! [`gatt`]: gatt/index.html
//! [`AttributeDb`]: att/struct.AttributeDb.html
//! [`build_attributes`]: gatt/fn.build_attributes.html
//! [`att::Central`]: att/struct.Central.html
//! [`AdvPacket`]: adv/struct.AdvPacket.html

#[macro_use]
mod utils;
pub mod adv;
pub mod att;
pub mod bytes;
mod error;
pub mod gatt;
pub mod l2cap;
pub mod uuid;

pub use self::error::Error;
