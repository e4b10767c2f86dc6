//! Connectivity sampling and edge detection
//!
//! Probes report the current [`tidelink_domain::LinkQuality`]; the monitor
//! samples one periodically and notifies a listener when the link comes back.

pub mod manual;
pub mod monitor;
pub mod ports;

pub use manual::ManualLinkProbe;
pub use monitor::{ConnectivityMonitor, ConnectivityMonitorConfig};
pub use ports::{ConnectivityListener, ConnectivityProbe};
