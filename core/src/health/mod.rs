//! Background health checker: a ticker that inspects plug-in manager
//! unload failures and resource counters, exporting a boolean snapshot.

mod checker;
mod types;

pub use checker::HealthChecker;
pub use types::{HealthSnapshot, DEFAULT_CHECK_INTERVAL};
