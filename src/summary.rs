//! Per-range and per-network figures shown in reports.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::address::AddressFamily;
use crate::lease::LeaseState;
use crate::pool::{Pools, Range, SharedNetwork};
use crate::sort::{self, ratio};
use crate::status::{Status, StatusCounts, Thresholds};

/// Derived usage figures for one range or shared network.
///
/// Percentages are in the 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Utilization {
    #[serde(rename = "defined")]
    pub size: f64,
    pub used: u64,
    pub free: f64,
    pub touched: u64,
    #[serde(rename = "touch_count")]
    pub touched_and_used: u64,
    pub percent: f64,
    #[serde(rename = "touch_percent")]
    pub touched_and_used_percent: f64,
    #[serde(rename = "backup_count")]
    pub backups: u64,
    #[serde(rename = "backup_percent")]
    pub backup_percent: f64,
    pub status: Status,
}

impl Utilization {
    fn new(size: f64, used: u64, touched: u64, backups: u64) -> Self {
        let touched_and_used = used + touched;
        Self {
            size,
            used,
            free: size - used as f64,
            touched,
            touched_and_used,
            percent: 100.0 * ratio(used as f64, size),
            touched_and_used_percent: 100.0 * ratio(touched_and_used as f64, size),
            backups,
            backup_percent: 100.0 * ratio(backups as f64, size),
            status: Status::Ok,
        }
    }

    pub fn for_range(family: AddressFamily, range: &Range, thresholds: &Thresholds) -> Self {
        let mut usage = Self::new(
            sort::range_size(family, range),
            range.count,
            range.touched,
            range.backups,
        );
        usage.status = thresholds.classify_range(
            usage.size,
            usage.used,
            usage.percent,
            !range.network.is_root(),
        );
        usage
    }

    pub fn for_network(network: &SharedNetwork, thresholds: &Thresholds) -> Self {
        let mut usage = Self::new(
            network.available,
            network.used,
            network.touched,
            network.backups,
        );
        usage.status = thresholds.classify(usage.size, usage.used, usage.percent);
        usage
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeSummary {
    pub location: String,
    pub first_ip: String,
    pub last_ip: String,
    #[serde(flatten)]
    pub usage: Utilization,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub location: String,
    #[serde(flatten)]
    pub usage: Utilization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveLease {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
}

/// Everything a renderer needs, with addresses already in text form.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    pub lease_file_mtime: Option<DateTime<Local>>,
    /// Whether backup columns carry any information.
    pub backups_found: bool,
    pub subnets: Vec<RangeSummary>,
    #[serde(rename = "shared-networks")]
    pub shared_networks: Vec<NetworkSummary>,
    pub summary: NetworkSummary,
    /// Active leases in address order.
    pub active_leases: Vec<ActiveLease>,
}

impl Report {
    /// Snapshots an analyzed [`Pools`] in its current range order.
    pub fn build(
        pools: &Pools,
        thresholds: &Thresholds,
        lease_file_mtime: Option<DateTime<Local>>,
    ) -> Self {
        let family = pools.family();
        let networks = pools.networks();

        let subnets = pools
            .ranges()
            .iter()
            .map(|range| RangeSummary {
                location: networks.name(range.network).to_string(),
                first_ip: family.format(&range.first),
                last_ip: family.format(&range.last),
                usage: Utilization::for_range(family, range, thresholds),
            })
            .collect();

        let shared_networks = networks
            .shared()
            .map(|(_, network)| NetworkSummary {
                location: network.name.clone(),
                usage: Utilization::for_network(network, thresholds),
            })
            .collect();

        let active_leases = pools
            .leases()
            .sorted(family)
            .iter()
            .filter(|lease| lease.state == LeaseState::Active)
            .map(|lease| ActiveLease {
                ip: family.format(&lease.address),
                macaddress: lease.hardware_address.clone(),
            })
            .collect();

        let root = networks.root();
        Self {
            generated_at: Local::now(),
            lease_file_mtime,
            backups_found: pools.leases().has_backups(),
            subnets,
            shared_networks,
            summary: NetworkSummary {
                location: root.name.clone(),
                usage: Utilization::for_network(root, thresholds),
            },
            active_leases,
        }
    }

    pub fn range_statuses(&self) -> StatusCounts {
        self.subnets.iter().map(|range| range.usage.status).collect()
    }

    pub fn network_statuses(&self) -> StatusCounts {
        self.shared_networks
            .iter()
            .map(|network| network.usage.status)
            .collect()
    }

    /// Most severe alarm over ranges and shared networks.
    pub fn worst_status(&self) -> Status {
        self.subnets
            .iter()
            .map(|range| range.usage.status)
            .chain(self.shared_networks.iter().map(|network| network.usage.status))
            .collect::<StatusCounts>()
            .worst()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::NetworkId;

    #[test]
    fn test_range_utilization() {
        let family = AddressFamily::V4;
        let mut range = Range::new(
            NetworkId::ROOT,
            family.parse("10.0.0.0").unwrap(),
            family.parse("10.0.0.3").unwrap(),
        );
        range.count = 1;
        range.touched = 1;

        let usage = Utilization::for_range(family, &range, &Thresholds::default());
        assert_eq!(usage.size, 4.0);
        assert_eq!(usage.free, 3.0);
        assert_eq!(usage.percent, 25.0);
        assert_eq!(usage.touched_and_used, 2);
        assert_eq!(usage.touched_and_used_percent, 50.0);
        assert_eq!(usage.backup_percent, 0.0);
        assert_eq!(usage.status, Status::Ok);
    }

    #[test]
    fn test_empty_network_percent_is_zero() {
        let usage = Utilization::for_network(&SharedNetwork::new("empty"), &Thresholds::default());
        assert_eq!(usage.size, 0.0);
        assert_eq!(usage.status, Status::Ignored);
        assert_eq!(usage.percent, 0.0);
        assert!(usage.percent.is_finite());
    }

    #[test]
    fn test_report_build() {
        let mut pools = Pools::new();
        let net = pools.add_shared_network("campus");
        pools.add_cidr_range(net, "10.1.0.0/30").unwrap();
        let ip = pools.parse_address("10.1.0.2").unwrap();
        pools.add_lease(ip, LeaseState::Active);
        pools.analyze();

        let report = Report::build(&pools, &Thresholds::default(), None);
        assert_eq!(report.subnets.len(), 1);
        assert_eq!(report.subnets[0].location, "campus");
        assert_eq!(report.subnets[0].first_ip, "10.1.0.0");
        assert_eq!(report.subnets[0].last_ip, "10.1.0.3");
        assert_eq!(report.shared_networks[0].usage.used, 1);
        assert_eq!(report.summary.usage.size, 4.0);
        assert!(!report.backups_found);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["subnets"][0]["defined"], 4.0);
        assert_eq!(json["shared-networks"][0]["location"], "campus");
        assert_eq!(json["subnets"][0]["status"], "ok");
        assert_eq!(json["summary"]["status"], "ok");
        assert_eq!(json["active_leases"][0]["ip"], "10.1.0.2");
        assert!(json["active_leases"][0].get("macaddress").is_none());
    }

    fn busy_pools() -> Pools {
        let mut pools = Pools::new();
        let campus = pools.add_shared_network("campus");
        pools.add_cidr_range(campus, "10.1.0.0/29").unwrap();
        pools.add_cidr_range(NetworkId::ROOT, "10.2.0.0/30").unwrap();
        for ip in ["10.1.0.1", "10.1.0.2", "10.1.0.3", "10.1.0.4", "10.1.0.5", "10.1.0.6"] {
            let ip = pools.parse_address(ip).unwrap();
            pools.add_lease(ip, LeaseState::Active);
        }
        for ip in ["10.1.0.7", "10.2.0.0", "10.2.0.1", "10.2.0.2", "10.2.0.3"] {
            let ip = pools.parse_address(ip).unwrap();
            pools.add_lease(ip, LeaseState::Active);
        }
        pools.analyze();
        pools
    }

    #[test]
    fn test_report_statuses() {
        // campus range at 7/8 = 87.5%, root range at 100%
        let pools = busy_pools();
        let report = Report::build(&pools, &Thresholds::default(), None);
        assert_eq!(report.subnets[0].usage.status, Status::Warning);
        assert_eq!(report.subnets[1].usage.status, Status::Critical);
        assert_eq!(report.shared_networks[0].usage.status, Status::Warning);
        assert_eq!(report.summary.usage.status, Status::Critical);
        assert_eq!(report.range_statuses().critical, 1);
        assert_eq!(report.worst_status(), Status::Critical);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["subnets"][0]["status"], "warning");
        assert_eq!(json["subnets"][1]["status"], "critical");
    }

    #[test]
    fn test_report_statuses_with_snet_alarms_and_minsize() {
        let pools = busy_pools();
        let thresholds = Thresholds {
            snet_alarms: true,
            minsize: 4.0,
            ..Default::default()
        };
        let report = Report::build(&pools, &thresholds, None);
        assert_eq!(report.subnets[0].usage.status, Status::Suppressed);
        assert_eq!(report.subnets[1].usage.status, Status::Ignored);
        assert_eq!(report.shared_networks[0].usage.status, Status::Warning);
        assert_eq!(report.worst_status(), Status::Warning);
    }

    #[test]
    fn test_active_leases_listed_in_address_order() {
        let mut pools = Pools::new();
        pools.add_cidr_range(NetworkId::ROOT, "10.1.0.0/24").unwrap();
        for (ip, state) in [
            ("10.1.0.20", LeaseState::Active),
            ("10.1.0.3", LeaseState::Free),
            ("10.1.0.9", LeaseState::Active),
        ] {
            let ip = pools.parse_address(ip).unwrap();
            pools.add_lease(ip, state);
        }
        let ip = pools.parse_address("10.1.0.9").unwrap();
        if let Some(lease) = pools.leases_mut().find_mut(&ip) {
            lease.hardware_address = Some("00:11:22:33:44:55".to_string());
        }
        pools.analyze();

        let report = Report::build(&pools, &Thresholds::default(), None);
        let ips: Vec<&str> = report.active_leases.iter().map(|l| l.ip.as_str()).collect();
        assert_eq!(ips, ["10.1.0.9", "10.1.0.20"]);
        assert_eq!(
            report.active_leases[0].macaddress.as_deref(),
            Some("00:11:22:33:44:55")
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["active_leases"][0]["macaddress"], "00:11:22:33:44:55");
    }
}
