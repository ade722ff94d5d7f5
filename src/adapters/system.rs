//! System adapter: restart with a recorded reason, heap telemetry and the
//! hardware reset cause.
//!
//! Owns the [`RetainedMemory`] so the restart reason and the transport
//! fallback flag are written through a single path.

use log::{error, info};

use crate::app::ports::{RetainedMemory, SystemPort};
use crate::network::retained::{self, RestartReason};

pub struct SystemAdapter<M: RetainedMemory> {
    memory: M,
    #[cfg(not(target_os = "espidf"))]
    restarts: Vec<RestartReason>,
}

impl<M: RetainedMemory> SystemAdapter<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            #[cfg(not(target_os = "espidf"))]
            restarts: Vec::new(),
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Simulation: restarts requested so far, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> &[RestartReason] {
        &self.restarts
    }
}

/// Display text for an `esp_reset_reason_t` code.
pub fn reset_reason_text(code: u32) -> &'static str {
    match code {
        1 => "ESP_RST_POWERON: Reset due to power-on event.",
        2 => "ESP_RST_EXT: Reset by external pin",
        3 => "ESP_RST_SW: Software reset via esp_restart.",
        4 => "ESP_RST_PANIC: Software reset due to exception/panic.",
        5 => "ESP_RST_INT_WDT: Reset (software or hardware) due to interrupt watchdog",
        6 => "ESP_RST_TASK_WDT: Reset due to task watchdog.",
        7 => "ESP_RST_WDT: Reset due to other watchdogs.",
        8 => "ESP_RST_DEEPSLEEP: Reset after exiting deep sleep mode.",
        9 => "ESP_RST_BROWNOUT: Brownout reset (software or hardware)",
        10 => "ESP_RST_SDIO: Reset over SDIO.",
        _ => "ESP_RST_UNKNOWN: Reset reason can not be determined.",
    }
}

impl<M: RetainedMemory> SystemPort for SystemAdapter<M> {
    fn set_transport_fallback(&mut self, enabled: bool) {
        retained::set_fallback(&mut self.memory, enabled);
        info!("System: transport fallback {}", if enabled { "armed" } else { "cleared" });
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self, reason: RestartReason) {
        retained::record_restart(&mut self.memory, reason);
        error!("System: restarting ({})", reason.as_str());
        esp_idf_hal::delay::FreeRtos::delay_ms(200);
        // SAFETY: no invariants; the call does not return.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self, reason: RestartReason) {
        retained::record_restart(&mut self.memory, reason);
        error!("System(sim): restart requested ({})", reason.as_str());
        self.restarts.push(reason);
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        200_000
    }

    #[cfg(target_os = "espidf")]
    fn reset_reason(&self) -> &'static str {
        reset_reason_text(unsafe { esp_idf_svc::sys::esp_reset_reason() })
    }

    #[cfg(not(target_os = "espidf"))]
    fn reset_reason(&self) -> &'static str {
        reset_reason_text(1)
    }
}
