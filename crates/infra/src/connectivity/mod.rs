//! Reachability probes backed by real network checks.

pub mod tcp_probe;

pub use tcp_probe::TcpReachabilityProbe;
