//! Broker connectivity: session state machine, topic layout, retained
//! boot state and the daily update check.

pub mod manager;
pub mod retained;
pub mod topics;
pub mod update_check;

pub use manager::{ConnectionState, ConnectivityManager, LoopContext, ManagerSettings};
pub use retained::{BootState, RestartReason, RetainedRecord};
