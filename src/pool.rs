//! Ranges, shared networks and the analysis snapshot that owns them.
//!
//! Shared networks live in an arena ([`SharedNetworks`]) whose first entry is
//! always the "All networks" root aggregate. Ranges refer to their network by
//! [`NetworkId`], so the range array can be reordered freely without
//! invalidating the back-reference.

use tracing::{debug, info};

use crate::address::{Address, AddressFamily};
use crate::analyze::{self, ReconcileStats};
use crate::error::{Error, Result};
use crate::lease::{Lease, LeaseState, Leases};
use crate::sort::{self, SortChain};

/// Name of the root aggregate that sums every range.
pub const ALL_NETWORKS: &str = "All networks";

/// Index of a shared network inside [`SharedNetworks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(usize);

impl NetworkId {
    /// The "All networks" aggregate.
    pub const ROOT: NetworkId = NetworkId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A named group of ranges counted as one pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedNetwork {
    pub name: String,
    /// Sum of the sizes of all ranges in this network.
    pub available: f64,
    pub used: u64,
    pub touched: u64,
    pub backups: u64,
}

impl SharedNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn reset_totals(&mut self) {
        self.available = 0.0;
        self.used = 0;
        self.touched = 0;
        self.backups = 0;
    }

    fn add_range(&mut self, size: f64, range: &Range) {
        self.available += size;
        self.used += range.count;
        self.touched += range.touched;
        self.backups += range.backups;
    }
}

/// Arena of shared networks. Index 0 is the root aggregate.
#[derive(Debug, Clone)]
pub struct SharedNetworks {
    networks: Vec<SharedNetwork>,
}

impl Default for SharedNetworks {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedNetworks {
    pub fn new() -> Self {
        Self {
            networks: vec![SharedNetwork::new(ALL_NETWORKS)],
        }
    }

    /// Adds a shared network. Names are not required to be unique.
    pub fn add(&mut self, name: impl Into<String>) -> NetworkId {
        self.networks.push(SharedNetwork::new(name));
        NetworkId(self.networks.len() - 1)
    }

    pub fn get(&self, id: NetworkId) -> Option<&SharedNetwork> {
        self.networks.get(id.0)
    }

    /// Name of a network; empty for an id this arena never issued.
    pub fn name(&self, id: NetworkId) -> &str {
        self.get(id).map(|network| network.name.as_str()).unwrap_or("")
    }

    pub fn root(&self) -> &SharedNetwork {
        &self.networks[NetworkId::ROOT.0]
    }

    /// Declared shared networks, excluding the root.
    pub fn shared(&self) -> impl Iterator<Item = (NetworkId, &SharedNetwork)> {
        self.networks
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, network)| (NetworkId(index), network))
    }

    /// Number of declared shared networks, excluding the root.
    pub fn shared_count(&self) -> usize {
        self.networks.len() - 1
    }

    pub(crate) fn reset_totals(&mut self) {
        for network in &mut self.networks {
            network.reset_totals();
        }
    }

    /// Adds a counted range to its network and, unless that is the root,
    /// to the root as well.
    pub(crate) fn accumulate(&mut self, size: f64, range: &Range) {
        if let Some(network) = self.networks.get_mut(range.network.0) {
            network.add_range(size, range);
        }
        if !range.network.is_root() {
            self.networks[NetworkId::ROOT.0].add_range(size, range);
        }
    }
}

/// A contiguous block of configured addresses with its counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub network: NetworkId,
    pub first: Address,
    pub last: Address,
    /// Active leases in the range.
    pub count: u64,
    /// Leases seen in the range that are not active now.
    pub touched: u64,
    /// Leases in backup state.
    pub backups: u64,
}

impl Range {
    pub fn new(network: NetworkId, first: Address, last: Address) -> Self {
        Self {
            network,
            first,
            last,
            count: 0,
            touched: 0,
            backups: 0,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.count = 0;
        self.touched = 0;
        self.backups = 0;
    }
}

/// One complete input snapshot: family, networks, ranges and leases.
///
/// # Example
///
/// ```
/// use dhcppools::{LeaseState, NetworkId, Pools};
///
/// # fn main() -> dhcppools::Result<()> {
/// let mut pools = Pools::new();
/// let first = pools.parse_address("10.0.0.0")?;
/// let last = pools.parse_address("10.0.0.3")?;
/// pools.add_range(NetworkId::ROOT, first, last)?;
///
/// let leased = pools.parse_address("10.0.0.1")?;
/// pools.add_lease(leased, LeaseState::Active);
/// pools.analyze();
///
/// assert_eq!(pools.ranges()[0].count, 1);
/// assert_eq!(pools.networks().root().available, 4.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Pools {
    family: AddressFamily,
    networks: SharedNetworks,
    ranges: Vec<Range>,
    leases: Leases,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(family: AddressFamily) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Selects the address family used by every later operation.
    ///
    /// Calling this again re-binds the family; addresses already stored are
    /// reinterpreted, so callers switch families only before loading data.
    pub fn set_address_family(&mut self, family: AddressFamily) {
        if family != self.family {
            info!("Using {} address family", family);
        }
        self.family = family;
    }

    /// Parses an address literal, selecting the family from it when none has
    /// been selected yet.
    pub fn parse_address(&mut self, text: &str) -> Result<Address> {
        self.detect_family(text);
        self.family.parse(text)
    }

    /// Selects the family from an address literal if it is still unknown.
    pub fn detect_family(&mut self, text: &str) {
        let resolved = self.family.resolve(text);
        if resolved != self.family {
            self.set_address_family(resolved);
        }
    }

    pub fn add_shared_network(&mut self, name: impl Into<String>) -> NetworkId {
        let name = name.into();
        debug!("Adding shared network '{}'", name);
        self.networks.add(name)
    }

    /// Adds the range `first..=last` to a shared network.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] if `first` is above `last`.
    pub fn add_range(&mut self, network: NetworkId, first: Address, last: Address) -> Result<()> {
        if self.family.compare(&first, &last).is_gt() {
            return Err(Error::InvalidRange {
                first: self.family.format(&first),
                last: self.family.format(&last),
            });
        }
        self.ranges.push(Range::new(network, first, last));
        Ok(())
    }

    /// Adds a range given in `address/prefix` form.
    pub fn add_cidr_range(&mut self, network: NetworkId, text: &str) -> Result<()> {
        self.detect_family(text);
        let (first, last) = self.family.parse_cidr(text)?;
        self.add_range(network, first, last)
    }

    /// Records a lease state, replacing any earlier record for the address.
    pub fn add_lease(&mut self, address: Address, state: LeaseState) -> &mut Lease {
        self.leases.insert_or_update(address, state)
    }

    pub fn networks(&self) -> &SharedNetworks {
        &self.networks
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn leases(&self) -> &Leases {
        &self.leases
    }

    pub fn leases_mut(&mut self) -> &mut Leases {
        &mut self.leases
    }

    /// Sorts leases and ranges by address and fills every counter.
    pub fn analyze(&mut self) -> ReconcileStats {
        let ordered = self.leases.sorted(self.family);
        analyze::sort_by_address(self.family, &mut self.ranges);
        let stats = analyze::reconcile(self.family, &mut self.ranges, &mut self.networks, &ordered);
        info!(
            "Analyzed {} ranges in {} shared networks against {} leases",
            self.ranges.len(),
            self.networks.shared_count(),
            ordered.len()
        );
        stats
    }

    /// Reorders ranges for presentation; `reverse` flips the final order.
    pub fn order(&mut self, chain: &SortChain, reverse: bool) {
        sort::sort_ranges(&mut self.ranges, chain, self.family, &self.networks);
        if reverse {
            sort::reverse_ranges(&mut self.ranges);
        }
    }
}
