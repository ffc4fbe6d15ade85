//! Lease index.
//!
//! Holds the lease records observed in a dhcpd.leases snapshot, keyed by
//! address. A lease file records every state change of an address over time,
//! so the index keeps exactly one record per address and a later record
//! replaces an earlier one (last write wins).
//!
//! Counting needs the leases in address order. [`Leases::sorted`] builds
//! that order once, after all inserts, as an [`OrderedLeases`] view that can
//! be walked in both directions by index.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{Address, AddressFamily};

/// Binding state of a lease, reduced to what pool counting cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    /// Address is currently handed out.
    Active,
    /// Address was used at some point but is not in use now.
    Free,
    /// Address is reserved for the failover peer.
    Backup,
}

impl LeaseState {
    /// Maps a dhcpd `binding state` keyword.
    ///
    /// `free`, `abandoned`, `expired` and `released` all mean the address is
    /// not in use but has been touched. Returns `None` for keywords that do
    /// not affect counting.
    pub fn from_binding_state(word: &str) -> Option<Self> {
        match word {
            "active" => Some(Self::Active),
            "backup" => Some(Self::Backup),
            "free" | "abandoned" | "expired" | "released" => Some(Self::Free),
            _ => None,
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Free => write!(f, "free"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// One observed address and its most recent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub address: Address,
    pub state: LeaseState,
    /// Client hardware address (`hardware ethernet`), if recorded.
    pub hardware_address: Option<String>,
}

impl Lease {
    pub fn new(address: Address, state: LeaseState) -> Self {
        Self {
            address,
            state,
            hardware_address: None,
        }
    }
}

/// Address-keyed lease collection.
///
/// # Example
///
/// ```
/// use dhcppools::{AddressFamily, LeaseState, Leases};
///
/// let family = AddressFamily::V4;
/// let mut leases = Leases::new();
/// let ip = family.parse("10.0.0.1").unwrap();
/// leases.insert_or_update(ip, LeaseState::Free);
/// leases.insert_or_update(ip, LeaseState::Active);
///
/// assert_eq!(leases.len(), 1);
/// assert_eq!(leases.find(&ip).unwrap().state, LeaseState::Active);
/// ```
#[derive(Debug, Default)]
pub struct Leases {
    by_address: HashMap<Address, Lease>,
    /// Whether any lease in backup state was inserted.
    backups_seen: bool,
}

impl Leases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `state` for `address`, replacing any earlier record.
    ///
    /// The replaced record is discarded entirely, including its hardware
    /// address. Returns the stored lease so the caller can attach details.
    pub fn insert_or_update(&mut self, address: Address, state: LeaseState) -> &mut Lease {
        if state == LeaseState::Backup {
            self.backups_seen = true;
        }
        self.by_address
            .entry(address)
            .and_modify(|lease| {
                lease.state = state;
                lease.hardware_address = None;
            })
            .or_insert_with(|| Lease::new(address, state))
    }

    /// Returns the lease for an address, if one exists.
    pub fn find(&self, address: &Address) -> Option<&Lease> {
        self.by_address.get(address)
    }

    pub fn find_mut(&mut self, address: &Address) -> Option<&mut Lease> {
        self.by_address.get_mut(address)
    }

    /// Removes and returns the lease for an address.
    pub fn delete(&mut self, address: &Address) -> Option<Lease> {
        self.by_address.remove(address)
    }

    pub fn delete_all(&mut self) {
        self.by_address.clear();
        self.backups_seen = false;
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Returns true if any lease was recorded in backup state.
    pub fn has_backups(&self) -> bool {
        self.backups_seen
    }

    /// Iterates leases in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Lease> {
        self.by_address.values()
    }

    /// Builds the address-ascending view used for counting.
    pub fn sorted(&self, family: AddressFamily) -> OrderedLeases<'_> {
        let mut leases: Vec<&Lease> = self.by_address.values().collect();
        leases.sort_by(|a, b| family.compare(&a.address, &b.address));
        debug!("Sorted {} leases in {} order", leases.len(), family);
        OrderedLeases { leases }
    }
}

/// Leases in ascending address order.
///
/// Neighbors of the lease at index `i` are at `i - 1` and `i + 1`.
#[derive(Debug, Clone)]
pub struct OrderedLeases<'a> {
    leases: Vec<&'a Lease>,
}

impl<'a> OrderedLeases<'a> {
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Lease> {
        self.leases.get(index).copied()
    }

    pub fn as_slice(&self) -> &[&'a Lease] {
        &self.leases
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a Lease> + '_ {
        self.leases.iter().copied()
    }
}
