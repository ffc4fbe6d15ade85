//! Range/lease reconciliation.
//!
//! Ranges and leases are both walked in address order. One cursor moves
//! through the sorted leases; for each range it is first stepped back over
//! any leases that still belong at or above the range's first address (ranges
//! of different shared networks may overlap, so the previous range can have
//! carried the cursor past leases the current one needs), then forward over
//! everything up to the range's last address.

use std::cmp::Ordering;

use tracing::{debug, trace, warn};

use crate::address::AddressFamily;
use crate::lease::{LeaseState, OrderedLeases};
use crate::pool::{Range, SharedNetworks};

/// Work done by one [`reconcile`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub ranges: usize,
    pub leases: usize,
    /// Cursor moves, backward and forward.
    pub steps: usize,
}

/// Orders ranges by first address, keeping the input order of equal starts.
pub fn sort_by_address(family: AddressFamily, ranges: &mut [Range]) {
    ranges.sort_by(|a, b| family.compare(&a.first, &b.first));
}

/// Fills range counters and shared network totals.
///
/// `ranges` should be sorted by first address (see [`sort_by_address`]) for
/// the pass to stay linear; unsorted input still counts correctly, with more
/// cursor movement. All counters are reset first, so running the pass again
/// on the same data gives the same result.
pub fn reconcile(
    family: AddressFamily,
    ranges: &mut [Range],
    networks: &mut SharedNetworks,
    leases: &OrderedLeases<'_>,
) -> ReconcileStats {
    networks.reset_totals();
    let mut stats = ReconcileStats {
        ranges: ranges.len(),
        leases: leases.len(),
        steps: 0,
    };

    if !family.is_known() {
        if !ranges.is_empty() {
            warn!("IP version unknown, {} ranges left uncounted", ranges.len());
        }
        for range in ranges.iter_mut() {
            range.reset_counters();
            networks.accumulate(0.0, range);
        }
        return stats;
    }

    let sorted = leases.as_slice();
    let mut cursor = 0;

    for range in ranges.iter_mut() {
        range.reset_counters();

        // rewind
        while cursor > 0 && family.compare(&sorted[cursor - 1].address, &range.first).is_ge() {
            cursor -= 1;
            stats.steps += 1;
        }

        let mut below = 0usize;
        while let Some(lease) = sorted.get(cursor) {
            if family.compare(&lease.address, &range.last) == Ordering::Greater {
                break;
            }
            cursor += 1;
            stats.steps += 1;
            if family.compare(&lease.address, &range.first) == Ordering::Less {
                below += 1;
                continue;
            }
            match lease.state {
                LeaseState::Free => range.touched += 1,
                LeaseState::Active => range.count += 1,
                LeaseState::Backup => range.backups += 1,
            }
        }
        if below > 0 {
            trace!(
                "Skipped {} leases below range start {}",
                below,
                family.format(&range.first)
            );
        }

        let size = family.range_size(&range.first, &range.last);
        networks.accumulate(size, range);
    }

    let root = networks.root();
    debug!(
        "Counted {} used, {} touched, {} backup of {} addresses in {} steps",
        root.used, root.touched, root.backups, root.available, stats.steps
    );
    stats
}
