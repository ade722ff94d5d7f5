//! Unified error types for the LockHub gateway.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! main loop's error handling uniform. All variants are `Copy` so they can
//! be handed across the port boundary without allocation.

use core::fmt;

use crate::app::ports::{BrokerError, ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Non-volatile storage failed.
    Storage(StorageError),
    /// Persisted configuration could not be loaded or saved.
    Config(ConfigError),
    /// The network transport failed.
    Network(NetworkError),
    /// The broker client rejected an operation.
    Broker(BrokerError),
    /// A GPIO operation failed.
    Gpio(GpioError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// Network transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Station credentials are missing or malformed.
    InvalidCredentials,
    /// The interface driver could not be created.
    DriverInitFailed,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid station credentials"),
            Self::DriverInitFailed => write!(f, "interface driver init failed"),
        }
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// GPIO errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Pin is not exposed by this chip.
    UnavailablePin(u8),
    /// `gpio_config` rejected the pin setup.
    ConfigFailed(i32),
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnavailablePin(pin) => write!(f, "GPIO {pin} not available on this chip"),
            Self::ConfigFailed(rc) => write!(f, "gpio_config failed (rc={rc})"),
        }
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
