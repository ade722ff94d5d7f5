//! Application boundary.
//!
//! All interaction with hardware, storage and the broker happens through
//! the **port traits** defined in [`ports`], keeping the GPIO, presence and
//! connectivity logic testable without real peripherals.

pub mod ports;
