//! Domain types and ports for deferred card-payment collection.
//!
//! Value objects validate on construction; the `ports` module defines the
//! storage and gateway traits the application layer is written against.

pub mod card;
pub mod item;
pub mod money;
pub mod order;
pub mod pending;
pub mod ports;
