//! Crowdchain Types - Core type definitions shared by every Crowdchain crate.
//!
//! This crate provides:
//! - Addresses (20-byte, Bech32m encoded with the `crowd` prefix)
//! - Hashes (32-byte, blake3 digests)
//! - Native amounts
//! - The injected logical clock used for snapshots and delays

pub mod address;
pub mod hash;
pub mod clock;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use clock::{Clock, ManualClock, SharedClock, Timestamp};
pub use error::TypesError;

/// Native value unit (wei-like, no decimals applied).
pub type Amount = u128;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Amount, Clock, Hash, ManualClock, SharedClock, Timestamp, TypesError};
}
