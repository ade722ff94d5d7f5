//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required:
//!
//! ```text
//! cargo test --no-default-features --test integration
//! ```

mod connectivity_tests;
mod gpio_tests;
mod mocks;
mod presence_tests;
