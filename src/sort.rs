//! Presentation ordering of ranges.
//!
//! A sort specification such as `"pn"` is a chain of one-letter keys. Ranges
//! are compared key by key, the first non-equal result wins, and ranges equal
//! under the whole chain keep their input order.
//!
//! | key | compares ranges by |
//! |-----|--------------------|
//! | `n` | shared network name |
//! | `i` | first address |
//! | `m` | range size |
//! | `c` | active count |
//! | `p` | active / size |
//! | `t` | touched count |
//! | `T` | touched + active |
//! | `e` | (touched + active) / size |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::address::AddressFamily;
use crate::error::{Error, Result};
use crate::pool::{Range, SharedNetworks};

/// Runs shorter than this are insertion sorted instead of split further.
const MIN_MERGE_SIZE: usize = 8;

/// One comparator of a sort chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Name,
    Ip,
    Max,
    Current,
    Percent,
    Touched,
    TouchedCurrent,
    TouchedCurrentPercent,
}

impl SortKey {
    pub const ALL: [SortKey; 8] = [
        Self::Name,
        Self::Ip,
        Self::Max,
        Self::Current,
        Self::Percent,
        Self::Touched,
        Self::TouchedCurrent,
        Self::TouchedCurrentPercent,
    ];

    pub fn as_char(self) -> char {
        match self {
            Self::Name => 'n',
            Self::Ip => 'i',
            Self::Max => 'm',
            Self::Current => 'c',
            Self::Percent => 'p',
            Self::Touched => 't',
            Self::TouchedCurrent => 'T',
            Self::TouchedCurrentPercent => 'e',
        }
    }

    pub fn compare(
        self,
        family: AddressFamily,
        networks: &SharedNetworks,
        a: &Range,
        b: &Range,
    ) -> Ordering {
        match self {
            Self::Name => networks.name(a.network).cmp(networks.name(b.network)),
            Self::Ip => family.compare(&a.first, &b.first),
            Self::Max => compare_f64(range_size(family, a), range_size(family, b)),
            Self::Current => a.count.cmp(&b.count),
            Self::Percent => compare_f64(usage_ratio(family, a), usage_ratio(family, b)),
            Self::Touched => a.touched.cmp(&b.touched),
            Self::TouchedCurrent => touched_and_used(a).cmp(&touched_and_used(b)),
            Self::TouchedCurrentPercent => compare_f64(
                touched_and_used_ratio(family, a),
                touched_and_used_ratio(family, b),
            ),
        }
    }
}

impl TryFrom<char> for SortKey {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_char() == c)
            .ok_or(Error::UnknownSortKey(c))
    }
}

/// Ordered list of sort keys; earlier keys take priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortChain(Vec<SortKey>);

impl SortChain {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn compare(
        &self,
        family: AddressFamily,
        networks: &SharedNetworks,
        a: &Range,
        b: &Range,
    ) -> Ordering {
        self.0
            .iter()
            .map(|key| key.compare(family, networks, a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl FromStr for SortChain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(SortKey::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for SortChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.0 {
            write!(f, "{}", key.as_char())?;
        }
        Ok(())
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Number of addresses in a range.
pub fn range_size(family: AddressFamily, range: &Range) -> f64 {
    family.range_size(&range.first, &range.last)
}

/// Active share of a range as a fraction; 0 for an empty range.
pub fn usage_ratio(family: AddressFamily, range: &Range) -> f64 {
    ratio(range.count as f64, range_size(family, range))
}

/// Addresses that are active or have been touched.
pub fn touched_and_used(range: &Range) -> u64 {
    range.count + range.touched
}

/// Touched-or-active share of a range as a fraction; 0 for an empty range.
pub fn touched_and_used_ratio(family: AddressFamily, range: &Range) -> f64 {
    ratio(touched_and_used(range) as f64, range_size(family, range))
}

pub(crate) fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole } else { 0.0 }
}

/// Stable sort of `ranges` by `chain`. An empty chain leaves the order alone.
pub fn sort_ranges(
    ranges: &mut [Range],
    chain: &SortChain,
    family: AddressFamily,
    networks: &SharedNetworks,
) {
    if chain.is_empty() || ranges.len() < 2 {
        return;
    }
    let compare = |a: &Range, b: &Range| chain.compare(family, networks, a, b);
    let mut scratch = Vec::with_capacity(ranges.len());
    merge_sort(ranges, &mut scratch, &compare);
}

/// Reverses the final order of `ranges`.
pub fn reverse_ranges(ranges: &mut [Range]) {
    ranges.reverse();
}

fn merge_sort<T, F>(items: &mut [T], scratch: &mut Vec<T>, compare: &F)
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() < MIN_MERGE_SIZE {
        insertion_sort(items, compare);
        return;
    }

    let mid = items.len() / 2;
    merge_sort(&mut items[..mid], scratch, compare);
    merge_sort(&mut items[mid..], scratch, compare);

    scratch.clear();
    let (left, right) = items.split_at(mid);
    let (mut l, mut r) = (0, 0);
    while l < left.len() && r < right.len() {
        // ties take the left run
        if compare(&right[r], &left[l]) == Ordering::Less {
            scratch.push(right[r].clone());
            r += 1;
        } else {
            scratch.push(left[l].clone());
            l += 1;
        }
    }
    scratch.extend_from_slice(&left[l..]);
    scratch.extend_from_slice(&right[r..]);
    items.clone_from_slice(scratch.as_slice());
}

fn insertion_sort<T, F>(items: &mut [T], compare: &F)
where
    F: Fn(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::NetworkId;

    const V4: AddressFamily = AddressFamily::V4;

    fn range(network: NetworkId, first: &str, last: &str, count: u64, touched: u64) -> Range {
        let mut range = Range::new(network, V4.parse(first).unwrap(), V4.parse(last).unwrap());
        range.count = count;
        range.touched = touched;
        range
    }

    #[test]
    fn test_parse_chain() {
        let chain: SortChain = "nimcptTe".parse().unwrap();
        assert_eq!(chain.keys(), &SortKey::ALL);
        assert_eq!(chain.to_string(), "nimcptTe");
        assert!("".parse::<SortChain>().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_sort_key_is_error() {
        assert!(matches!(
            "px".parse::<SortChain>(),
            Err(Error::UnknownSortKey('x'))
        ));
        assert!(matches!(SortKey::try_from('N'), Err(Error::UnknownSortKey('N'))));
    }

    #[test]
    fn test_metrics() {
        let r = range(NetworkId::ROOT, "10.0.0.0", "10.0.0.9", 2, 3);
        assert_eq!(range_size(V4, &r), 10.0);
        assert_eq!(usage_ratio(V4, &r), 0.2);
        assert_eq!(touched_and_used(&r), 5);
        assert_eq!(touched_and_used_ratio(V4, &r), 0.5);
        assert_eq!(usage_ratio(AddressFamily::Unknown, &r), 0.0);
    }

    #[test]
    fn test_percent_then_name() {
        let mut networks = SharedNetworks::new();
        let zulu = networks.add("zulu");
        let alpha = networks.add("alpha");
        let mut ranges = vec![
            range(zulu, "10.0.0.0", "10.0.0.9", 5, 0),
            range(alpha, "10.0.1.0", "10.0.1.9", 5, 0),
            range(alpha, "10.0.2.0", "10.0.2.9", 1, 0),
        ];
        let chain: SortChain = "pn".parse().unwrap();

        sort_ranges(&mut ranges, &chain, V4, &networks);

        assert_eq!(ranges[0].count, 1);
        assert_eq!(networks.name(ranges[1].network), "alpha");
        assert_eq!(networks.name(ranges[2].network), "zulu");
    }

    #[test]
    fn test_sort_is_stable_above_merge_threshold() {
        let networks = SharedNetworks::new();
        let mut ranges: Vec<Range> = (0..40u8)
            .map(|i| {
                let first = format!("10.0.{}.0", i);
                let last = format!("10.0.{}.255", i);
                range(NetworkId::ROOT, &first, &last, u64::from(i % 3), 0)
            })
            .collect();
        let chain: SortChain = "c".parse().unwrap();

        sort_ranges(&mut ranges, &chain, V4, &networks);

        for pair in ranges.windows(2) {
            assert!(pair[0].count <= pair[1].count);
            if pair[0].count == pair[1].count {
                assert!(V4.compare(&pair[0].first, &pair[1].first).is_lt());
            }
        }
    }

    #[test]
    fn test_ip_sort_then_reverse() {
        let networks = SharedNetworks::new();
        let mut ranges = vec![
            range(NetworkId::ROOT, "10.0.5.0", "10.0.5.9", 0, 0),
            range(NetworkId::ROOT, "10.0.1.0", "10.0.1.9", 0, 0),
            range(NetworkId::ROOT, "10.0.3.0", "10.0.3.9", 0, 0),
        ];
        let chain: SortChain = "i".parse().unwrap();

        sort_ranges(&mut ranges, &chain, V4, &networks);
        reverse_ranges(&mut ranges);

        let firsts: Vec<String> = ranges.iter().map(|r| V4.format(&r.first)).collect();
        assert_eq!(firsts, vec!["10.0.5.0", "10.0.3.0", "10.0.1.0"]);
    }

    #[test]
    fn test_max_and_touched_keys() {
        let networks = SharedNetworks::new();
        let mut ranges = vec![
            range(NetworkId::ROOT, "10.0.0.0", "10.0.0.99", 1, 9),
            range(NetworkId::ROOT, "10.0.1.0", "10.0.1.9", 2, 1),
        ];

        sort_ranges(&mut ranges, &"m".parse().unwrap(), V4, &networks);
        assert_eq!(range_size(V4, &ranges[0]), 10.0);

        sort_ranges(&mut ranges, &"T".parse().unwrap(), V4, &networks);
        assert_eq!(touched_and_used(&ranges[0]), 3);

        sort_ranges(&mut ranges, &"e".parse().unwrap(), V4, &networks);
        assert_eq!(touched_and_used_ratio(V4, &ranges[0]), 0.1);
    }

    #[test]
    fn test_insertion_sort_stability() {
        let mut items = vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
        insertion_sort(&mut items, &|a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0));
        assert_eq!(items, vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }
}
