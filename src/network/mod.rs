//! Stack networks
//!
//! Networks services join, with driver, IPAM and scope settings.

pub mod config;

pub use config::{Ipam, IpamPool, Network, NetworkDriver};
