//! Beacon presence detection.
//!
//! The scan callback decodes advertisements ([`advert`]) and feeds the
//! [`PresenceRegistry`]; the connectivity manager publishes its snapshot.

pub mod advert;
pub mod registry;

pub use advert::{Advertisement, BeaconAddress, SensorPayload};
pub use registry::{BeaconRecord, PresenceRegistry};
