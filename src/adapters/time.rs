//! Monotonic clock adapter.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microseconds since
//!   boot) and FreeRTOS delays.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `std::thread::sleep`.

use crate::app::ports::Clock;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1000
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(&self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Milliseconds since boot, for contexts without a clock handle (the scan
/// callback and the GPIO tick).
#[cfg(target_os = "espidf")]
pub fn millis() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
}
