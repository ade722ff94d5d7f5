//! Raw GPIO access for user-assigned pins.
//!
//! Implements [`GpioPort`] with direct ESP-IDF sys calls. Pins are
//! configured one at a time as the dispatcher assigns roles; interrupts are
//! never enabled because inputs are sampled by the periodic tick.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use embedded_hal::digital::PinState;
use log::debug;

use crate::app::ports::{GpioPort, PinMode};
use crate::error::GpioError;
use crate::pins::{self, MAX_PINS};

pub struct EspGpio {
    #[cfg(not(target_os = "espidf"))]
    levels: [PinState; MAX_PINS],
    #[cfg(not(target_os = "espidf"))]
    modes: [Option<PinMode>; MAX_PINS],
}

impl Default for EspGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl EspGpio {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            levels: [PinState::High; MAX_PINS],
            #[cfg(not(target_os = "espidf"))]
            modes: [None; MAX_PINS],
        }
    }

    /// Simulation: drive an input (or observe an output) level.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_level(&mut self, pin: u8, level: PinState) {
        if let Some(slot) = self.levels.get_mut(pin as usize) {
            *slot = level;
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(pin as usize).copied().flatten()
    }
}

/// Read a pin from any context. Used by the timer tick, which holds no
/// reference to the adapter.
#[cfg(target_os = "espidf")]
pub fn read_level(pin: u8) -> PinState {
    // SAFETY: read-only register access.
    PinState::from(unsafe { gpio_get_level(i32::from(pin)) } != 0)
}

impl GpioPort for EspGpio {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
        if !pins::is_available(pin) {
            return Err(GpioError::UnavailablePin(pin));
        }

        #[cfg(target_os = "espidf")]
        {
            let (gpio_mode, pull_up, pull_down) = match mode {
                PinMode::InputPullUp => (gpio_mode_t_GPIO_MODE_INPUT, true, false),
                PinMode::InputPullDown => (gpio_mode_t_GPIO_MODE_INPUT, false, true),
                PinMode::Output => (gpio_mode_t_GPIO_MODE_OUTPUT, false, false),
            };
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pin,
                mode: gpio_mode,
                pull_up_en: if pull_up {
                    gpio_pullup_t_GPIO_PULLUP_ENABLE
                } else {
                    gpio_pullup_t_GPIO_PULLUP_DISABLE
                },
                pull_down_en: if pull_down {
                    gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
                } else {
                    gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
                },
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            // SAFETY: the pin was checked against the chip's pin table.
            let ret = unsafe { gpio_config(&cfg) };
            if ret != ESP_OK {
                return Err(GpioError::ConfigFailed(ret));
            }
            if mode == PinMode::Output {
                unsafe { gpio_set_level(i32::from(pin), 0) };
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let idx = pin as usize;
            self.modes[idx] = Some(mode);
            self.levels[idx] = match mode {
                PinMode::InputPullUp => PinState::High,
                PinMode::InputPullDown | PinMode::Output => PinState::Low,
            };
        }

        debug!("hw_init: GPIO {} configured as {:?}", pin, mode);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read(&self, pin: u8) -> PinState {
        read_level(pin)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&self, pin: u8) -> PinState {
        self.levels.get(pin as usize).copied().unwrap_or(PinState::Low)
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, pin: u8, level: PinState) {
        // SAFETY: register write on a pin configured as output.
        unsafe { gpio_set_level(i32::from(pin), u32::from(level == PinState::High)) };
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, pin: u8, level: PinState) {
        self.sim_set_level(pin, level);
    }
}
