//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectivityManager / GpioDispatcher (domain)
//! ```
//!
//! Driven adapters (network interfaces, broker client, GPIO, storage, RTC
//! memory) implement these traits. The domain core consumes them via
//! generics, so it never touches ESP-IDF directly and runs unchanged in
//! host tests.
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **BrokerClient::connect** only starts the handshake; the caller polls
//!   `is_connected` and owns the timeout.
//! - All port errors are typed and `Copy`; callers handle every variant at
//!   the call site.

use core::net::Ipv4Addr;

use embedded_hal::digital::PinState;
use heapless::{String, Vec};

use crate::config::GatewayConfig;
use crate::gpio::roles::GpioAction;
use crate::network::retained::{RestartReason, RetainedRecord};

/// Maximum accepted inbound topic length; longer messages are dropped.
pub const MAX_TOPIC_LEN: usize = 128;
/// Maximum accepted inbound payload length; longer messages are dropped.
pub const MAX_PAYLOAD_LEN: usize = 512;

// ───────────────────────────────────────────────────────────────
// Network transport port (driven adapter: Wi-Fi / Ethernet)
// ───────────────────────────────────────────────────────────────

/// Outcome of asking a transport to (re-)establish its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStatus {
    /// Link is up with an address.
    Success,
    /// Transient failure; retry later.
    Failure,
    /// The hardware itself is unusable; only a reboot onto a different
    /// transport can recover.
    CriticalFailure,
}

/// One of the network interfaces selected at boot.
pub trait NetworkTransport {
    /// Human-readable interface name, published on first connect.
    fn device_name(&self) -> &str;

    /// Service the interface driver. Called every main-loop iteration and
    /// while waiting for a broker handshake.
    fn update(&mut self);

    /// Link up and an address assigned.
    fn is_connected(&self) -> bool;

    /// Try to bring the link up.
    fn attempt_reconnect(&mut self) -> ReconnectStatus;

    /// Signal strength in dBm, `None` for wired links.
    fn signal_strength(&self) -> Option<i8>;

    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// The transport is picked at boot, so the firmware drives it boxed.
impl<T: NetworkTransport + ?Sized> NetworkTransport for Box<T> {
    fn device_name(&self) -> &str {
        (**self).device_name()
    }

    fn update(&mut self) {
        (**self).update();
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn attempt_reconnect(&mut self) -> ReconnectStatus {
        (**self).attempt_reconnect()
    }

    fn signal_strength(&self) -> Option<i8> {
        (**self).signal_strength()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        (**self).local_address()
    }
}

// ───────────────────────────────────────────────────────────────
// Broker client port (driven adapter: domain ↔ MQTT)
// ───────────────────────────────────────────────────────────────

/// Message the broker publishes on our behalf after an unclean disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWill<'a> {
    pub topic: &'a str,
    pub payload: &'a str,
    pub retain: bool,
}

/// Everything needed to open a broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    /// `None` connects without credentials.
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub last_will: LastWill<'a>,
}

/// A message delivered by the broker, copied out of the client's buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Copy `topic` and `payload`; `None` when either exceeds capacity.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        Some(Self {
            topic: String::try_from(topic).ok()?,
            payload: Vec::from_slice(payload).ok()?,
        })
    }

    /// Payload as text; invalid UTF-8 reads as empty.
    pub fn payload_str(&self) -> &str {
        core::str::from_utf8(&self.payload).unwrap_or("")
    }
}

pub trait BrokerClient {
    /// Start a session handshake. Returns once the request is issued.
    fn connect(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError>;

    /// Handshake acknowledged and session still alive.
    fn is_connected(&self) -> bool;

    /// Tear the session down (also abandons a pending handshake).
    fn disconnect(&mut self);

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Next queued inbound message, if any.
    fn poll_message(&mut self) -> Option<InboundMessage>;
}

/// Feature-level consumer of inbound broker messages.
///
/// Registered with the connectivity manager for one exact topic.
pub trait BrokerReceiver {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain ↔ pins)
// ───────────────────────────────────────────────────────────────

/// Electrical configuration applied to a pin for its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    InputPullUp,
    InputPullDown,
    Output,
}

pub trait GpioPort {
    /// Apply the electrical mode for a pin.
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), crate::error::GpioError>;

    fn read(&self, pin: u8) -> PinState;

    fn write(&mut self, pin: u8, level: PinState);
}

/// Consumer of debounced lock-protocol input actions.
pub trait GpioActionHandler {
    fn on_gpio_action(&mut self, action: GpioAction, pin: u8);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Block the calling task. Only used inside the bounded broker handshake.
    fn sleep_ms(&self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// System port (restart, heap, reset reason)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Persist (or clear) the "boot the secondary transport" flag.
    fn set_transport_fallback(&mut self, enabled: bool);

    /// Record `reason` for the next boot and reset the chip.
    ///
    /// On the device this does not return.
    fn restart(&mut self, reason: RestartReason);

    fn free_heap(&self) -> u32;

    /// Hardware reset cause of the current boot, as display text.
    fn reset_reason(&self) -> &'static str;
}

/// Memory that survives a software reset but not a power cycle.
pub trait RetainedMemory {
    fn load(&self) -> RetainedRecord;

    fn store(&mut self, record: &RetainedRecord);
}

// ───────────────────────────────────────────────────────────────
// Release manifest source
// ───────────────────────────────────────────────────────────────

/// Fetches the release manifest document used by the daily update check.
pub trait ManifestSource {
    /// Raw JSON body, or `None` on any transport / HTTP failure.
    fn fetch(&mut self) -> Option<std::string::String>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists gateway configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`GatewayConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<GatewayConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage (NVS on the device).
///
/// Keys are namespaced to prevent collisions between subsystems. Writes
/// are atomic: ESP-IDF NVS guarantees this per commit.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`BrokerClient`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Client could not be created (bad URL, out of memory).
    ClientInit,
    /// No session is established.
    NotConnected,
    /// The client refused to enqueue the publish.
    PublishFailed,
    SubscribeFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ClientInit => write!(f, "client init failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}
