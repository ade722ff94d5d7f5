//! Retained memory backed by RTC no-init RAM.
//!
//! The region survives a software reset and deep sleep but comes up with
//! arbitrary contents after power-on, which the magic word in
//! [`RetainedRecord`] detects. The record is stored as two raw words so an
//! arbitrary bit pattern is never read as a typed `bool`.
//!
//! - **`target_os = "espidf"`**: a `.rtc_noinit` static.
//! - **all other targets**: words held by the adapter itself.

use crate::app::ports::RetainedMemory;
use crate::network::retained::RetainedRecord;

type Words = [u64; 2];

fn encode(record: &RetainedRecord) -> Words {
    [
        record.magic,
        u64::from(record.restart_reason) | (u64::from(record.transport_fallback) << 8),
    ]
}

fn decode(words: Words) -> RetainedRecord {
    RetainedRecord {
        magic: words[0],
        restart_reason: (words[1] & 0xFF) as u8,
        transport_fallback: (words[1] >> 8) & 1 == 1,
    }
}

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc_noinit")]
static mut RTC_WORDS: Words = [0; 2];

pub struct RtcMemory {
    #[cfg(not(target_os = "espidf"))]
    words: Words,
}

impl Default for RtcMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcMemory {
    /// There is a single RTC region; construct this once at boot.
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            words: [0; 2],
        }
    }

    /// Simulation: overwrite the region, e.g. with power-on garbage.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_raw(&mut self, words: [u64; 2]) {
        self.words = words;
    }
}

impl RetainedMemory for RtcMemory {
    #[cfg(target_os = "espidf")]
    fn load(&self) -> RetainedRecord {
        // SAFETY: main task only; volatile so the noinit contents are read.
        decode(unsafe { core::ptr::read_volatile(&raw const RTC_WORDS) })
    }

    #[cfg(not(target_os = "espidf"))]
    fn load(&self) -> RetainedRecord {
        decode(self.words)
    }

    #[cfg(target_os = "espidf")]
    fn store(&mut self, record: &RetainedRecord) {
        // SAFETY: main task only.
        unsafe { core::ptr::write_volatile(&raw mut RTC_WORDS, encode(record)) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn store(&mut self, record: &RetainedRecord) {
        self.words = encode(record);
    }
}
