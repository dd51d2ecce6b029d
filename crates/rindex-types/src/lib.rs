//! Foundation types for rindex.
//!
//! This crate provides the identity, temporal and record types shared by every
//! other rindex crate.
//!
//! # Key Types
//!
//! - [`EntityId`] - opaque entity identifier, generated from time + randomness
//! - [`Timestamp`] - wall-clock milliseconds since the UNIX epoch
//! - [`Entity`] - a uniquely identified field map with creation/update stamps

pub mod entity;
pub mod error;
pub mod id;
pub mod temporal;

pub use entity::{Entity, Fields};
pub use error::TypeError;
pub use id::EntityId;
pub use temporal::Timestamp;
