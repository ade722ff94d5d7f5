//! Main-loop side of the GPIO subsystem.
//!
//! The dispatcher validates the pin configuration, applies electrical
//! modes through [`GpioPort`], publishes the effective role table to the
//! tick context and drains debounced actions. Output pins are written
//! directly and never debounced.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embedded_hal::digital::PinState;
use heapless::Vec;
use log::{debug, info, warn};

use super::debounce::PinSampler;
use super::pending::PendingActions;
use super::roles::{GpioAction, PinConfiguration, PinEntry, PinRole};
use crate::app::ports::GpioPort;
use crate::pins::{self, MAX_PINS, NetworkHardware};

/// State shared between the timer tick and the main loop.
pub struct SharedPins {
    roles: [AtomicU8; MAX_PINS],
    pending: PendingActions,
}

impl Default for SharedPins {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedPins {
    pub const fn new() -> Self {
        Self {
            roles: [const { AtomicU8::new(PinRole::Disabled as u8) }; MAX_PINS],
            pending: PendingActions::new(),
        }
    }

    pub fn role(&self, pin: u8) -> PinRole {
        self.roles
            .get(pin as usize)
            .and_then(|r| PinRole::from_u8(r.load(Ordering::Acquire)))
            .unwrap_or(PinRole::Disabled)
    }

    fn set_role(&self, pin: u8, role: PinRole) {
        if let Some(slot) = self.roles.get(pin as usize) {
            slot.store(role as u8, Ordering::Release);
        }
    }

    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }
}

pub struct GpioDispatcher {
    shared: Arc<SharedPins>,
    hardware: NetworkHardware,
    effective: PinConfiguration,
}

impl GpioDispatcher {
    pub fn new(hardware: NetworkHardware) -> Self {
        Self {
            shared: Arc::new(SharedPins::new()),
            hardware,
            effective: PinConfiguration::new(),
        }
    }

    /// Sampler to hand to the periodic timer.
    pub fn sampler(&self) -> PinSampler {
        PinSampler::new(Arc::clone(&self.shared))
    }

    pub fn shared(&self) -> Arc<SharedPins> {
        Arc::clone(&self.shared)
    }

    /// Apply `config`. Entries on pins the chip does not expose, or whose
    /// electrical setup fails, are dropped; pins claimed by the network
    /// hardware become transport-owned. Actions still pending from the
    /// previous configuration are dropped. Never fails.
    ///
    /// Returns the number of monitored inputs.
    pub fn configure(&mut self, config: &PinConfiguration, gpio: &mut impl GpioPort) -> usize {
        let reserved = pins::reserved_pins(self.hardware);
        self.effective = PinConfiguration::new();
        self.shared.pending().clear();

        for pin in 0..MAX_PINS as u8 {
            self.shared.set_role(pin, PinRole::Disabled);
        }
        for &pin in reserved {
            self.shared.set_role(pin, PinRole::TransportOwned);
            self.effective.set(pin, PinRole::TransportOwned);
        }

        let mut inputs = 0;
        for entry in config.entries() {
            let PinEntry { pin, role } = *entry;
            if reserved.contains(&pin) {
                continue;
            }
            if !pins::is_available(pin) {
                warn!("GPIO: pin {} not available, ignoring role '{}'", pin, role.description());
                continue;
            }
            let Some(mode) = role.pin_mode() else {
                continue;
            };
            if let Err(e) = gpio.configure(pin, mode) {
                warn!("GPIO: {}", e);
                continue;
            }
            if role.is_output() {
                gpio.write(pin, PinState::Low);
            }
            if role.is_input() {
                inputs += 1;
            }
            self.effective.set(pin, role);
            self.shared.set_role(pin, role);
            debug!("GPIO: pin {} -> {}", pin, role.description());
        }

        info!(
            "GPIO: {} pins configured ({} inputs monitored)",
            self.effective.entries().len(),
            inputs
        );
        inputs
    }

    /// Change one pin's role at runtime. The sampler discards any in-flight
    /// history for the pin on its next tick.
    pub fn set_role(&mut self, pin: u8, role: PinRole, gpio: &mut impl GpioPort) -> bool {
        if pins::reserved_pins(self.hardware).contains(&pin) || !pins::is_available(pin) {
            return false;
        }
        if let Some(mode) = role.pin_mode() {
            if gpio.configure(pin, mode).is_err() {
                return false;
            }
        }
        self.effective.set(pin, role);
        self.shared.set_role(pin, role);
        true
    }

    pub fn role(&self, pin: u8) -> PinRole {
        self.shared.role(pin)
    }

    /// Effective configuration after validation.
    pub fn entries(&self) -> &[PinEntry] {
        self.effective.entries()
    }

    pub fn pins_with_role(&self, role: PinRole) -> impl Iterator<Item = u8> + '_ {
        self.effective
            .entries()
            .iter()
            .filter(move |e| e.role == role)
            .map(|e| e.pin)
    }

    /// Write an output-role pin. Returns `false` (and writes nothing) for
    /// any other role.
    pub fn write(&self, gpio: &mut impl GpioPort, pin: u8, level: PinState) -> bool {
        if !self.role(pin).is_output() {
            return false;
        }
        gpio.write(pin, level);
        true
    }

    /// Drive every pin carrying `role`.
    pub fn write_role(&self, gpio: &mut impl GpioPort, role: PinRole, level: PinState) {
        if !role.is_output() {
            return;
        }
        for pin in self.pins_with_role(role) {
            gpio.write(pin, level);
        }
    }

    /// Debounced actions older than the commit window, removed from the
    /// pending table. Actions rejected by `filter` stay queued.
    pub fn take_due(
        &self,
        now_ms: u32,
        filter: impl Fn(GpioAction) -> bool,
    ) -> Vec<(u8, GpioAction), MAX_PINS> {
        self.shared.pending().take_due(now_ms, filter)
    }
}
