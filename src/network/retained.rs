//! State carried across a software reset: the restart reason and the
//! transport fallback flag.
//!
//! The record lives in memory that keeps its contents through a warm reset
//! but not a power cycle (RTC no-init RAM on the device). A magic word
//! tells a genuine record from power-on garbage.

use log::{info, warn};

use crate::app::ports::RetainedMemory;

/// Marks a record written by a previous boot.
pub const RETAINED_MAGIC: u64 = 0xa00a_b00b_c00b_d00d;

/// Why the firmware asked for the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RestartReason {
    RequestedViaBroker           = 0,
    RestartOnDisconnectWatchdog  = 1,
    NetworkTimeoutWatchdog       = 2,
    NetworkDeviceCriticalFailure = 3,
    ConfigurationUpdated         = 4,
    GpioConfigurationUpdated     = 5,
    NotApplicable                = 6,
}

impl RestartReason {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::RequestedViaBroker,
            1 => Self::RestartOnDisconnectWatchdog,
            2 => Self::NetworkTimeoutWatchdog,
            3 => Self::NetworkDeviceCriticalFailure,
            4 => Self::ConfigurationUpdated,
            5 => Self::GpioConfigurationUpdated,
            6 => Self::NotApplicable,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestedViaBroker => "RequestedViaMqtt",
            Self::RestartOnDisconnectWatchdog => "RestartOnDisconnectWatchdog",
            Self::NetworkTimeoutWatchdog => "NetworkTimeoutWatchdog",
            Self::NetworkDeviceCriticalFailure => "NetworkDeviceCriticalFailure",
            Self::ConfigurationUpdated => "ConfigurationUpdated",
            Self::GpioConfigurationUpdated => "GpioConfigurationUpdated",
            Self::NotApplicable => "NotApplicable",
        }
    }
}

/// Raw layout of the retained region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct RetainedRecord {
    pub magic: u64,
    pub restart_reason: u8,
    pub transport_fallback: bool,
}

impl RetainedRecord {
    pub fn is_valid(&self) -> bool {
        self.magic == RETAINED_MAGIC
    }
}

/// What this boot learned from the retained record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    /// Reason the previous boot gave for resetting; `NotApplicable` after
    /// power-on or an unplanned reset.
    pub previous_reason: RestartReason,
    /// Boot the secondary (Wi-Fi) transport.
    pub use_fallback: bool,
}

/// Read and consume the retained record.
///
/// An invalid magic means power-on: the record is cleared and nothing is
/// carried over. A valid record has its fallback flag and magic cleared so
/// the next unplanned reset does not replay them.
pub fn consume_boot_state(memory: &mut impl RetainedMemory) -> BootState {
    let record = memory.load();
    if !record.is_valid() {
        memory.store(&RetainedRecord::default());
        info!("Boot: no retained state (power-on)");
        return BootState {
            previous_reason: RestartReason::NotApplicable,
            use_fallback: false,
        };
    }

    let previous_reason =
        RestartReason::from_u8(record.restart_reason).unwrap_or(RestartReason::NotApplicable);
    if record.transport_fallback {
        warn!("Boot: primary transport failed last boot, using fallback");
    }
    memory.store(&RetainedRecord::default());
    info!("Boot: previous restart reason {}", previous_reason.as_str());

    BootState {
        previous_reason,
        use_fallback: record.transport_fallback,
    }
}

/// Persist the restart reason ahead of a reset.
pub fn record_restart(memory: &mut impl RetainedMemory, reason: RestartReason) {
    let mut record = memory.load();
    if !record.is_valid() {
        record = RetainedRecord::default();
    }
    record.magic = RETAINED_MAGIC;
    record.restart_reason = reason as u8;
    memory.store(&record);
}

/// Set or clear the fallback flag, keeping any stored reason.
pub fn set_fallback(memory: &mut impl RetainedMemory, enabled: bool) {
    let mut record = memory.load();
    if !record.is_valid() {
        record = RetainedRecord {
            magic: RETAINED_MAGIC,
            restart_reason: RestartReason::NotApplicable as u8,
            transport_fallback: false,
        };
    }
    record.transport_fallback = enabled;
    memory.store(&record);
}
