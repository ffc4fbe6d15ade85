//! # dhcppools
//!
//! ISC dhcpd pool usage analysis: reads the ranges declared in `dhcpd.conf`
//! and the leases recorded in `dhcpd.leases`, and reports how much of each
//! range, shared network and the whole server is in use.
//!
//! ## Features
//!
//! - One set of algorithms for IPv4 and IPv6, selected at run time
//! - Last-write-wins lease index fed straight from the lease journal
//! - Sorted merge-join of ranges and leases that tolerates overlapping ranges
//! - Stable multi-key ordering of the result (`n i m c p t T e`)
//! - Text, JSON and CSV reports, with per-section output limits
//! - Ok/warning/critical status per range and shared network
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use dhcppools::{conf_file, lease_file, ConfOptions, Pools, Report, Thresholds};
//!
//! fn main() -> dhcppools::Result<()> {
//!     let mut pools = Pools::new();
//!     let options = ConfOptions::default();
//!     conf_file::load_dhcpd_conf(&mut pools, Path::new("/etc/dhcpd.conf"), options)?;
//!     lease_file::load_dhcpd_leases(&mut pools, Path::new("/var/lib/dhcp/dhcpd.leases"))?;
//!     pools.analyze();
//!     pools.order(&"p".parse()?, false);
//!
//!     let report = Report::build(&pools, &Thresholds::default(), None);
//!     println!("{} {}", report.summary.usage.percent, report.worst_status());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`AddressFamily`] - Runtime-selected IPv4/IPv6 strategy over [`Address`]
//! - [`Leases`] - Lease index keyed by address
//! - [`Pools`] - Shared networks, ranges and leases of one run
//! - [`analyze`] - Range/lease reconciliation
//! - [`SortChain`] - Presentation ordering of ranges
//! - [`Thresholds`] - Alarm classification into a [`Status`]
//! - [`Report`] - Per-range and per-network utilization for the renderers

pub mod address;
pub mod analyze;
pub mod conf_file;
pub mod config;
pub mod error;
pub mod lease;
pub mod lease_file;
pub mod output;
pub mod pool;
pub mod sort;
pub mod status;
pub mod summary;

pub use address::{Address, AddressFamily};
pub use analyze::ReconcileStats;
pub use conf_file::ConfOptions;
pub use config::Config;
pub use error::{Error, Result};
pub use lease::{Lease, LeaseState, Leases, OrderedLeases};
pub use output::{OutputFormat, OutputLimit, Section};
pub use pool::{NetworkId, Pools, Range, SharedNetwork, SharedNetworks};
pub use sort::{SortChain, SortKey};
pub use status::{Status, StatusCounts, Thresholds};
pub use summary::{ActiveLease, Report, Utilization};
