//! Redemption statistics polling.

mod monitor;

pub use monitor::{StatsMonitor, StatsMonitorHandle, StatsReport};
