//! Task watchdog keep-alive.
//!
//! Subscribes the main task to the ESP-IDF task watchdog. The main loop
//! and the bounded broker handshake call [`Watchdog::keep_alive`]; a loop
//! stalled for longer than the timeout resets the chip.

use core::cell::Cell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Main-loop stall tolerated before the chip is reset.
pub const DEFAULT_TIMEOUT_MS: u32 = 15_000;

pub struct Watchdog {
    subscribed: bool,
    feeds: Cell<u32>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    #[cfg(target_os = "espidf")]
    pub fn new(timeout_ms: u32) -> Self {
        // SAFETY: configuration calls from the main task at boot.
        let subscribed = unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                log::warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
            }
            esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
        };
        if subscribed {
            log::info!("Watchdog: main task subscribed ({} ms)", timeout_ms);
        } else {
            log::warn!("Watchdog: failed to subscribe main task");
        }
        Self {
            subscribed,
            feeds: Cell::new(0),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(timeout_ms: u32) -> Self {
        log::info!("Watchdog(sim): {} ms, no-op", timeout_ms);
        Self {
            subscribed: false,
            feeds: Cell::new(0),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn keep_alive(&self) {
        self.feeds.set(self.feeds.get().wrapping_add(1));
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    /// Keep-alive calls so far.
    pub fn feeds(&self) -> u32 {
        self.feeds.get()
    }
}
