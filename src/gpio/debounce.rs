//! Shift-register debounce filter and the tick-context pin sampler.
//!
//! Every tick shifts one raw sample into an 8-bit history per pin. A level
//! is committed only when all eight samples agree and differ from the
//! previous commit, so a glitch shorter than eight ticks never surfaces.
//!
//! ```text
//!   history = (history << 1) | raw
//!   0xFF && committed == Low  ──▶ commit High
//!   0x00 && committed == High ──▶ commit Low
//! ```

use std::sync::Arc;

use embedded_hal::digital::PinState;

use super::dispatcher::SharedPins;
use super::roles::{GpioAction, PinRole};
use crate::pins::{self, MAX_PINS};

/// Samples that must agree before a level is committed.
pub const HISTORY_LEN: u32 = u8::BITS;

const ALL_HIGH: u8 = 0xFF;
const ALL_LOW: u8 = 0x00;

/// Bit history and last committed level of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSampleState {
    history: u8,
    committed: PinState,
}

impl PinSampleState {
    /// Start settled at `level`, as if it had been sampled for a full window.
    pub fn new(level: PinState) -> Self {
        Self {
            history: match level {
                PinState::High => ALL_HIGH,
                PinState::Low => ALL_LOW,
            },
            committed: level,
        }
    }

    /// Shift in one raw sample. Returns the newly committed level when the
    /// window is unanimous and differs from the previous commit.
    pub fn sample(&mut self, raw: PinState) -> Option<PinState> {
        self.history = (self.history << 1) | u8::from(raw == PinState::High);

        let unanimous = match self.history {
            ALL_HIGH => PinState::High,
            ALL_LOW => PinState::Low,
            _ => return None,
        };
        if unanimous == self.committed {
            return None;
        }
        self.committed = unanimous;
        Some(unanimous)
    }

    pub fn committed(&self) -> PinState {
        self.committed
    }
}

/// Level an input rests at with no external drive.
pub fn idle_level(role: PinRole) -> PinState {
    if role == PinRole::GeneralInputPullDown {
        PinState::Low
    } else {
        PinState::High
    }
}

/// Whether a committed transition to `level` should fire `role`'s action.
pub fn edge_matches(role: PinRole, level: PinState) -> bool {
    role.fires_on_any_edge() || level == PinState::Low
}

// ── Tick-context sampler ──────────────────────────────────────

/// Owned by the periodic timer callback. Reads the role table published by
/// [`GpioDispatcher`](super::dispatcher::GpioDispatcher) and records
/// debounced actions into the shared pending table.
pub struct PinSampler {
    shared: Arc<SharedPins>,
    states: [PinSampleState; MAX_PINS],
    seen_roles: [PinRole; MAX_PINS],
}

impl PinSampler {
    pub fn new(shared: Arc<SharedPins>) -> Self {
        Self {
            shared,
            states: [PinSampleState::new(PinState::High); MAX_PINS],
            seen_roles: [PinRole::Disabled; MAX_PINS],
        }
    }

    /// One timer tick: sample every monitored input and record actions in
    /// the pending table, timestamped `now_ms`.
    pub fn tick(&mut self, now_ms: u32, read: impl Fn(u8) -> PinState) {
        let shared = Arc::clone(&self.shared);
        self.tick_with(read, |action, pin| shared.pending().record(pin, action, now_ms));
    }

    /// One timer tick delivering actions to `on_action`.
    ///
    /// `on_action` runs in the tick context and must not block.
    pub fn tick_with(
        &mut self,
        read: impl Fn(u8) -> PinState,
        mut on_action: impl FnMut(GpioAction, u8),
    ) {
        for &pin in pins::available_pins() {
            let idx = pin as usize;
            let role = self.shared.role(pin);

            if role != self.seen_roles[idx] {
                // Drop whatever was in flight under the previous role.
                self.seen_roles[idx] = role;
                self.states[idx] = PinSampleState::new(idle_level(role));
            }

            let Some(action) = role.action() else {
                continue;
            };

            if let Some(level) = self.states[idx].sample(read(pin)) {
                if edge_matches(role, level) {
                    on_action(action, pin);
                }
            }
        }
    }

    /// Last committed level of `pin`.
    pub fn committed(&self, pin: u8) -> Option<PinState> {
        self.states.get(pin as usize).map(PinSampleState::committed)
    }
}
