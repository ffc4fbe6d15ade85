//! dhcpd.leases scanner.
//!
//! The lease file is an append-only journal: the same address appears once
//! per state change, and the last record is the current one. Each record is
//! fed to the lease index, which keeps only the latest state per address.

use std::path::Path;

use tracing::{debug, info, trace};

use crate::address::{Address, AddressFamily};
use crate::error::{Error, Result};
use crate::lease::LeaseState;
use crate::pool::Pools;

/// Reads a dhcpd.leases file into `pools`. Returns the number of records.
pub fn load_dhcpd_leases(pools: &mut Pools, path: &Path) -> Result<usize> {
    debug!("Reading leases {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let records = parse_dhcpd_leases(pools, &text, path)?;
    info!(
        "Read {} lease records ({} distinct addresses) from {}",
        records,
        pools.leases().len(),
        path.display()
    );
    Ok(records)
}

/// The lease record being read.
struct Record {
    address: Address,
    /// Set once this record's `binding state` reached the lease index.
    stored: bool,
}

/// Parses lease file text. `path` only labels error messages.
///
/// A `hardware ethernet` line is attached only when its own record carried a
/// recognised `binding state`, so an ignored record never touches the lease
/// kept from an earlier one.
pub fn parse_dhcpd_leases(pools: &mut Pools, text: &str, path: &Path) -> Result<usize> {
    let mut current: Option<Record> = None;
    let mut records = 0;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(address) = record_address(pools, line) {
            let address = pools.family().parse(address).map_err(|error| Error::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: error.to_string(),
            })?;
            current = Some(Record {
                address,
                stored: false,
            });
            records += 1;
            continue;
        }

        if line == "}" {
            current = None;
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        let words: Vec<&str> = line.trim_end_matches(';').split_whitespace().collect();
        match words.as_slice() {
            ["binding", "state", state] => match LeaseState::from_binding_state(state) {
                Some(state) => {
                    pools.add_lease(record.address, state);
                    record.stored = true;
                }
                None => trace!(
                    "{}:{}: ignoring binding state {}",
                    path.display(),
                    index + 1,
                    state
                ),
            },
            ["hardware", "ethernet", mac] if record.stored => {
                if let Some(lease) = pools.leases_mut().find_mut(&record.address) {
                    lease.hardware_address = Some(mac.to_lowercase());
                }
            }
            _ => {}
        }
    }
    Ok(records)
}

/// Returns the address literal if `line` opens a lease record, selecting the
/// address family from the record keyword when it is still unknown.
fn record_address<'l>(pools: &mut Pools, line: &'l str) -> Option<&'l str> {
    let (keyword, rest) = line.split_once(char::is_whitespace)?;
    let family = match keyword {
        "lease" => AddressFamily::V4,
        "iaaddr" => AddressFamily::V6,
        _ => return None,
    };
    if !pools.family().is_known() {
        pools.set_address_family(family);
    }
    if pools.family() != family {
        return None;
    }
    rest.trim().trim_end_matches('{').split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::Lease;

    const V4_LEASES: &str = r#"
# The format of this file is documented in the dhcpd.leases(5) manual page.
# This lease file was written by isc-dhcp-4.4.1

lease 10.0.0.1 {
  starts 3 2024/01/10 10:00:00;
  ends 3 2024/01/10 22:00:00;
  binding state free;
  hardware ethernet 00:AA:bb:cc:dd:01;
}
lease 10.0.0.1 {
  starts 3 2024/01/10 12:00:00;
  binding state active;
  next binding state free;
  rewind binding state free;
  hardware ethernet 00:aa:bb:cc:dd:02;
  client-hostname "laptop";
}
lease 10.0.0.2 {
  binding state backup;
}
lease 10.0.0.3 {
  binding state abandoned;
}
"#;

    fn lease<'p>(pools: &'p Pools, text: &str) -> &'p Lease {
        let address = pools.family().parse(text).unwrap();
        pools.leases().find(&address).unwrap()
    }

    #[test]
    fn test_v4_records() {
        let mut pools = Pools::new();
        let records = parse_dhcpd_leases(&mut pools, V4_LEASES, Path::new("dhcpd.leases")).unwrap();

        assert_eq!(records, 4);
        assert_eq!(pools.family(), AddressFamily::V4);
        assert_eq!(pools.leases().len(), 3);

        let first = lease(&pools, "10.0.0.1");
        assert_eq!(first.state, LeaseState::Active);
        assert_eq!(first.hardware_address.as_deref(), Some("00:aa:bb:cc:dd:02"));
        assert_eq!(lease(&pools, "10.0.0.2").state, LeaseState::Backup);
        assert_eq!(lease(&pools, "10.0.0.3").state, LeaseState::Free);
        assert!(pools.leases().has_backups());
    }

    #[test]
    fn test_v6_records() {
        let text = r#"
ia-na "\001\000\000\000\000\003\000\001\000\014)\224\333]" {
  cltt 4 2024/01/11 08:00:00;
  iaaddr 2001:db8:1::105 {
    binding state active;
    preferred-life 375;
  }
}
ia-na "\002" {
  iaaddr 2001:db8:1::1a0 {
    binding state expired;
  }
}
"#;
        let mut pools = Pools::new();
        let records = parse_dhcpd_leases(&mut pools, text, Path::new("dhcpd6.leases")).unwrap();

        assert_eq!(records, 2);
        assert_eq!(pools.family(), AddressFamily::V6);
        assert_eq!(lease(&pools, "2001:db8:1::105").state, LeaseState::Active);
        assert_eq!(lease(&pools, "2001:db8:1::1a0").state, LeaseState::Free);
    }

    #[test]
    fn test_other_family_records_ignored() {
        let mut pools = Pools::with_family(AddressFamily::V6);
        let records = parse_dhcpd_leases(&mut pools, V4_LEASES, Path::new("dhcpd.leases")).unwrap();
        assert_eq!(records, 0);
        assert!(pools.leases().is_empty());
    }

    #[test]
    fn test_invalid_address_is_parse_error() {
        let mut pools = Pools::new();
        let result = parse_dhcpd_leases(
            &mut pools,
            "lease 10.0.0.300 {\n  binding state active;\n}\n",
            Path::new("bad.leases"),
        );
        assert!(matches!(result, Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_ignored_record_keeps_earlier_hardware_address() {
        let text = "\
lease 10.0.0.7 {
  binding state active;
  hardware ethernet 00:aa:bb:cc:dd:07;
}
lease 10.0.0.7 {
  binding state reset;
  hardware ethernet 00:aa:bb:cc:dd:99;
}
";
        let mut pools = Pools::new();
        parse_dhcpd_leases(&mut pools, text, Path::new("dhcpd.leases")).unwrap();

        let kept = lease(&pools, "10.0.0.7");
        assert_eq!(kept.state, LeaseState::Active);
        assert_eq!(kept.hardware_address.as_deref(), Some("00:aa:bb:cc:dd:07"));
    }

    #[test]
    fn test_record_without_state_is_not_counted() {
        let mut pools = Pools::new();
        parse_dhcpd_leases(
            &mut pools,
            "lease 10.0.0.9 {\n  starts 1 2024/01/01 00:00:00;\n}\n",
            Path::new("dhcpd.leases"),
        )
        .unwrap();
        assert!(pools.leases().is_empty());
    }
}
