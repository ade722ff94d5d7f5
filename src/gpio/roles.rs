//! Pin roles and the persisted pin configuration.
//!
//! The configuration is stored as flat `(pin, role)` byte pairs under
//! [`STORAGE_KEY`]. Roles keep their numeric codes across releases.
//!
//! ```text
//!   [ pin0 | role0 | pin1 | role1 | ... ]
//! ```

use core::fmt::Write as _;

use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{PinMode, StorageError, StoragePort};
use crate::pins::{self, MAX_PINS, NetworkHardware};

pub const STORAGE_NAMESPACE: &str = "lockhub";
pub const STORAGE_KEY: &str = "gpio";

/// Role assigned to a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinRole {
    Disabled                     = 0,
    // ── Lock-protocol inputs (pulled up, act on falling edge) ─
    InputLock                    = 1,
    InputUnlock                  = 2,
    InputUnlatch                 = 3,
    InputLockNgo                 = 4,
    InputLockNgoUnlatch          = 5,
    InputElectricStrikeActuation = 6,
    InputActivateRto             = 7,
    InputActivateCm              = 8,
    InputDeactivateRtoCm         = 9,
    InputDeactivateRto           = 10,
    InputDeactivateCm            = 11,
    // ── Lock-state outputs ───────────────────────────────────
    OutputHighLocked             = 12,
    OutputHighUnlocked           = 13,
    OutputHighMotorBlocked       = 14,
    OutputHighRtoActive          = 15,
    OutputHighCmActive           = 16,
    OutputHighRtoOrCmActive      = 17,
    // ── General purpose ──────────────────────────────────────
    GeneralOutput                = 18,
    GeneralInputPullDown         = 19,
    GeneralInputPullUp           = 20,
    /// Claimed by the network hardware.
    TransportOwned               = 21,
    // ── Gateway status outputs ───────────────────────────────
    OutputHighBrokerConnected    = 22,
    OutputHighNetworkConnected   = 23,
    OutputHighRadioCommError     = 24,
}

impl PinRole {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0  => Self::Disabled,
            1  => Self::InputLock,
            2  => Self::InputUnlock,
            3  => Self::InputUnlatch,
            4  => Self::InputLockNgo,
            5  => Self::InputLockNgoUnlatch,
            6  => Self::InputElectricStrikeActuation,
            7  => Self::InputActivateRto,
            8  => Self::InputActivateCm,
            9  => Self::InputDeactivateRtoCm,
            10 => Self::InputDeactivateRto,
            11 => Self::InputDeactivateCm,
            12 => Self::OutputHighLocked,
            13 => Self::OutputHighUnlocked,
            14 => Self::OutputHighMotorBlocked,
            15 => Self::OutputHighRtoActive,
            16 => Self::OutputHighCmActive,
            17 => Self::OutputHighRtoOrCmActive,
            18 => Self::GeneralOutput,
            19 => Self::GeneralInputPullDown,
            20 => Self::GeneralInputPullUp,
            21 => Self::TransportOwned,
            22 => Self::OutputHighBrokerConnected,
            23 => Self::OutputHighNetworkConnected,
            24 => Self::OutputHighRadioCommError,
            _  => return None,
        })
    }

    /// Action fired by a committed transition on this role, `None` for
    /// outputs and unmonitored pins.
    pub fn action(self) -> Option<GpioAction> {
        Some(match self {
            Self::InputLock => GpioAction::Lock,
            Self::InputUnlock => GpioAction::Unlock,
            Self::InputUnlatch => GpioAction::Unlatch,
            Self::InputLockNgo => GpioAction::LockNgo,
            Self::InputLockNgoUnlatch => GpioAction::LockNgoUnlatch,
            Self::InputElectricStrikeActuation => GpioAction::ElectricStrikeActuation,
            Self::InputActivateRto => GpioAction::ActivateRto,
            Self::InputActivateCm => GpioAction::ActivateCm,
            Self::InputDeactivateRtoCm => GpioAction::DeactivateRtoCm,
            Self::InputDeactivateRto => GpioAction::DeactivateRto,
            Self::InputDeactivateCm => GpioAction::DeactivateCm,
            Self::GeneralInputPullDown | Self::GeneralInputPullUp => GpioAction::GeneralInput,
            _ => return None,
        })
    }

    pub fn is_input(self) -> bool {
        self.action().is_some()
    }

    pub fn is_output(self) -> bool {
        matches!(
            self,
            Self::OutputHighLocked
                | Self::OutputHighUnlocked
                | Self::OutputHighMotorBlocked
                | Self::OutputHighRtoActive
                | Self::OutputHighCmActive
                | Self::OutputHighRtoOrCmActive
                | Self::GeneralOutput
                | Self::OutputHighBrokerConnected
                | Self::OutputHighNetworkConnected
                | Self::OutputHighRadioCommError
        )
    }

    /// Electrical mode for the role, `None` when the pin is left alone.
    pub fn pin_mode(self) -> Option<PinMode> {
        match self {
            Self::Disabled | Self::TransportOwned => None,
            Self::GeneralInputPullDown => Some(PinMode::InputPullDown),
            r if r.is_input() => Some(PinMode::InputPullUp),
            _ => Some(PinMode::Output),
        }
    }

    /// Lock-protocol inputs act on the press (falling) edge only; general
    /// inputs report every committed change.
    pub fn fires_on_any_edge(self) -> bool {
        matches!(self, Self::GeneralInputPullDown | Self::GeneralInputPullUp)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::InputLock => "Input: Lock",
            Self::InputUnlock => "Input: Unlock",
            Self::InputUnlatch => "Input: Unlatch",
            Self::InputLockNgo => "Input: Lock n Go",
            Self::InputLockNgoUnlatch => "Input: Lock n Go and unlatch",
            Self::InputElectricStrikeActuation => "Input: Electric strike actuation",
            Self::InputActivateRto => "Input: Activate RTO",
            Self::InputActivateCm => "Input: Activate CM",
            Self::InputDeactivateRtoCm => "Input: Deactivate RTO/CM",
            Self::InputDeactivateRto => "Input: Deactivate RTO",
            Self::InputDeactivateCm => "Input: Deactivate CM",
            Self::OutputHighLocked => "Output: High when locked",
            Self::OutputHighUnlocked => "Output: High when unlocked",
            Self::OutputHighMotorBlocked => "Output: High when motor blocked",
            Self::OutputHighRtoActive => "Output: High when RTO active",
            Self::OutputHighCmActive => "Output: High when CM active",
            Self::OutputHighRtoOrCmActive => "Output: High when RTO or CM active",
            Self::GeneralOutput => "General output",
            Self::GeneralInputPullDown => "General input (Pull-down)",
            Self::GeneralInputPullUp => "General input (Pull-up)",
            Self::TransportOwned => "Ethernet",
            Self::OutputHighBrokerConnected => "Output: High when MQTT connected",
            Self::OutputHighNetworkConnected => "Output: High when network connected",
            Self::OutputHighRadioCommError => "Output: High on BLE communication error",
        }
    }
}

/// Semantic action produced by a debounced input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GpioAction {
    Lock                    = 1,
    Unlock                  = 2,
    Unlatch                 = 3,
    LockNgo                 = 4,
    LockNgoUnlatch          = 5,
    ElectricStrikeActuation = 6,
    ActivateRto             = 7,
    ActivateCm              = 8,
    DeactivateRtoCm         = 9,
    DeactivateRto           = 10,
    DeactivateCm            = 11,
    GeneralInput            = 12,
}

impl GpioAction {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            1  => Self::Lock,
            2  => Self::Unlock,
            3  => Self::Unlatch,
            4  => Self::LockNgo,
            5  => Self::LockNgoUnlatch,
            6  => Self::ElectricStrikeActuation,
            7  => Self::ActivateRto,
            8  => Self::ActivateCm,
            9  => Self::DeactivateRtoCm,
            10 => Self::DeactivateRto,
            11 => Self::DeactivateCm,
            12 => Self::GeneralInput,
            _  => return None,
        })
    }

    pub fn is_lock_action(self) -> bool {
        self != Self::GeneralInput
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEntry {
    pub pin: u8,
    pub role: PinRole,
}

// ── Pin configuration ─────────────────────────────────────────

/// Ordered pin → role mapping, unique by pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinConfiguration {
    entries: Vec<PinEntry, MAX_PINS>,
}

impl PinConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the role of `pin`. `Disabled` removes the entry.
    ///
    /// Returns `false` when the table is full.
    pub fn set(&mut self, pin: u8, role: PinRole) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.pin == pin) {
            if role == PinRole::Disabled {
                self.entries.remove(pos);
            } else {
                self.entries[pos].role = role;
            }
            return true;
        }
        if role == PinRole::Disabled {
            return true;
        }
        self.entries.push(PinEntry { pin, role }).is_ok()
    }

    pub fn role(&self, pin: u8) -> PinRole {
        self.entries
            .iter()
            .find(|e| e.pin == pin)
            .map_or(PinRole::Disabled, |e| e.role)
    }

    pub fn entries(&self) -> &[PinEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode stored pairs.
    ///
    /// Drops disabled entries, unknown role codes and repeated pins (the
    /// first occurrence wins). Pins reserved by `hardware` always come back
    /// as [`PinRole::TransportOwned`]; a stale transport-owned entry on a
    /// pin the hardware no longer claims is dropped.
    pub fn from_bytes(bytes: &[u8], hardware: NetworkHardware) -> Self {
        let reserved = pins::reserved_pins(hardware);
        let mut config = Self::new();

        for pair in bytes.chunks_exact(2) {
            let pin = pair[0];
            if config.entries.iter().any(|e| e.pin == pin) {
                continue;
            }

            let role = if reserved.contains(&pin) {
                PinRole::TransportOwned
            } else {
                match PinRole::from_u8(pair[1]) {
                    Some(PinRole::Disabled | PinRole::TransportOwned) | None => continue,
                    Some(role) => role,
                }
            };

            if config.entries.push(PinEntry { pin, role }).is_err() {
                break;
            }
        }
        config
    }

    /// Encode as `(pin, role)` pairs; reserved pins are written as
    /// transport-owned, disabled entries are never written.
    pub fn to_bytes(&self, hardware: NetworkHardware) -> Vec<u8, { MAX_PINS * 2 }> {
        let reserved = pins::reserved_pins(hardware);
        let mut out = Vec::new();

        for entry in &self.entries {
            let role = if reserved.contains(&entry.pin) {
                PinRole::TransportOwned
            } else if entry.role == PinRole::TransportOwned {
                continue;
            } else {
                entry.role
            };
            // Capacity is exactly two bytes per entry.
            let _ = out.push(entry.pin);
            let _ = out.push(role as u8);
        }
        out
    }

    /// Load from `storage`. A missing or unreadable blob yields an empty
    /// configuration.
    pub fn load(storage: &impl StoragePort, hardware: NetworkHardware) -> Self {
        let mut buf = [0u8; MAX_PINS * 2];
        match storage.read(STORAGE_NAMESPACE, STORAGE_KEY, &mut buf) {
            Ok(len) => {
                let config = Self::from_bytes(&buf[..len], hardware);
                info!("GPIO: loaded {} pin entries", config.entries.len());
                config
            }
            Err(StorageError::NotFound) => Self::new(),
            Err(e) => {
                warn!("GPIO: pin configuration unreadable ({}), none loaded", e);
                Self::new()
            }
        }
    }

    pub fn save(
        &self,
        storage: &mut impl StoragePort,
        hardware: NetworkHardware,
    ) -> Result<(), StorageError> {
        let bytes = self.to_bytes(hardware);
        storage.write(STORAGE_NAMESPACE, STORAGE_KEY, &bytes)?;
        info!("GPIO: saved {} pin entries", bytes.len() / 2);
        Ok(())
    }

    /// One `GPIO <n> : <role>` line per entry, pins below 10 padded.
    pub fn configuration_text(&self, linebreak: &str) -> std::string::String {
        let mut text = std::string::String::new();
        for entry in &self.entries {
            let pad = if entry.pin < 10 { " " } else { "" };
            let _ = write!(
                text,
                "GPIO {}{}: {}{}",
                entry.pin,
                pad,
                entry.role.description(),
                linebreak
            );
        }
        text
    }
}
