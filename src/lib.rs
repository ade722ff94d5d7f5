//! LockHub gateway firmware library.
//!
//! Exposes the domain modules for integration testing. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod gpio;
pub mod network;
pub mod pins;
pub mod presence;

pub mod adapters;
pub mod drivers;
