//! Lock-free handoff of debounced actions from the tick context to the
//! main loop.
//!
//! One slot per pin: an atomic millisecond timestamp (0 = empty) and the
//! action code. The tick context is the only writer of a non-zero stamp,
//! the main loop the only one that clears it, so no lock is needed.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use heapless::Vec;

use super::roles::GpioAction;
use crate::pins::MAX_PINS;

/// Age a pending entry must reach before the main loop acts on it.
pub const COMMIT_WINDOW_MS: u32 = 200;

pub struct PendingActions {
    stamps: [AtomicU32; MAX_PINS],
    actions: [AtomicU8; MAX_PINS],
}

impl Default for PendingActions {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingActions {
    pub const fn new() -> Self {
        Self {
            stamps: [const { AtomicU32::new(0) }; MAX_PINS],
            actions: [const { AtomicU8::new(0) }; MAX_PINS],
        }
    }

    /// Called from the tick context. A later record for the same pin
    /// replaces the earlier one.
    pub fn record(&self, pin: u8, action: GpioAction, now_ms: u32) {
        let idx = pin as usize;
        if idx >= MAX_PINS {
            return;
        }
        self.actions[idx].store(action as u8, Ordering::Relaxed);
        // Zero means "empty"; a record at t=0 is nudged to 1 ms.
        self.stamps[idx].store(now_ms.max(1), Ordering::Release);
    }

    pub fn is_pending(&self, pin: u8) -> bool {
        self.stamps
            .get(pin as usize)
            .is_some_and(|ts| ts.load(Ordering::Acquire) != 0)
    }

    /// Remove and return every entry at least [`COMMIT_WINDOW_MS`] old whose
    /// action passes `filter`. Entries failing the filter stay pending.
    pub fn take_due(
        &self,
        now_ms: u32,
        filter: impl Fn(GpioAction) -> bool,
    ) -> Vec<(u8, GpioAction), MAX_PINS> {
        let mut due = Vec::new();

        for (idx, stamp) in self.stamps.iter().enumerate() {
            let ts = stamp.load(Ordering::Acquire);
            if ts == 0 || now_ms.wrapping_sub(ts) < COMMIT_WINDOW_MS {
                continue;
            }
            let Some(action) = GpioAction::from_u8(self.actions[idx].load(Ordering::Relaxed))
            else {
                stamp.store(0, Ordering::Release);
                continue;
            };
            if !filter(action) {
                continue;
            }
            // A newer record raced in: leave it for a later pass.
            if stamp
                .compare_exchange(ts, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let _ = due.push((idx as u8, action));
        }
        due
    }

    pub fn clear(&self) {
        for stamp in &self.stamps {
            stamp.store(0, Ordering::Release);
        }
    }
}
