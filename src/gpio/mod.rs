//! GPIO roles, debouncing and the tick → main-loop action handoff.
//!
//! ```text
//!   esp_timer (100 ms) ──▶ PinSampler ──▶ PendingActions ──▶ GpioDispatcher (main loop)
//!                              ▲                                   │
//!                              └──────── role table ◀──────────────┘
//! ```

pub mod debounce;
pub mod dispatcher;
pub mod pending;
pub mod roles;

pub use debounce::PinSampler;
pub use dispatcher::{GpioDispatcher, SharedPins};
pub use roles::{GpioAction, PinConfiguration, PinEntry, PinRole};
