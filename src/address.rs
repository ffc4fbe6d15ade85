//! Dual-stack address model.
//!
//! An [`Address`] is a fixed 128-bit cell. Whether it holds an IPv4 or an
//! IPv6 address is not recorded in the cell itself: the run-wide
//! [`AddressFamily`] decides how every cell is compared, printed, parsed and
//! measured. Callers hold the active family and route every family-dependent
//! operation through it, so no call site branches on the family itself.
//!
//! Before a family is selected ([`AddressFamily::Unknown`]) every operation is
//! callable and returns a neutral value (equal, empty, zero).

use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const V4_BITS: u32 = 32;
const V6_BITS: u32 = 128;

/// Binary storage for one IPv4 or IPv6 address.
///
/// IPv4 addresses occupy the low 32 bits. Interpretation is up to the
/// [`AddressFamily`] in effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Address(u128);

impl Address {
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u128 {
        self.0
    }

    fn v4(self) -> u32 {
        self.0 as u32
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self(u128::from(u32::from(addr)))
    }
}

impl From<Ipv6Addr> for Address {
    fn from(addr: Ipv6Addr) -> Self {
        Self(u128::from(addr))
    }
}

/// The IP version served by the analyzed dhcpd.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// No family selected yet; all operations are neutral.
    #[default]
    Unknown,
    V4,
    V6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

impl FromStr for AddressFamily {
    type Err = Error;

    /// Accepts the `--ip-version` spellings `4` and `6`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "4" | "v4" | "ipv4" => Ok(Self::V4),
            "6" | "v6" | "ipv6" => Ok(Self::V6),
            other => Err(Error::UnknownAddressFamily(other.to_string())),
        }
    }
}

impl AddressFamily {
    /// Guesses the family of an address literal (with or without `/len`).
    pub fn detect(text: &str) -> Option<Self> {
        let host = text.split('/').next().unwrap_or(text);
        if host.parse::<Ipv4Addr>().is_ok() {
            Some(Self::V4)
        } else if host.parse::<Ipv6Addr>().is_ok() {
            Some(Self::V6)
        } else {
            None
        }
    }

    /// Returns `self` when already selected, otherwise the family detected
    /// from `text` (or still `Unknown` if it is not an address).
    pub fn resolve(self, text: &str) -> Self {
        match self {
            Self::Unknown => Self::detect(text).unwrap_or(Self::Unknown),
            selected => selected,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Width of an address in bits; 0 when no family is selected.
    pub fn max_prefix(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::V4 => V4_BITS,
            Self::V6 => V6_BITS,
        }
    }

    /// Three-way comparison of two addresses of this family.
    ///
    /// IPv4 compares by numeric value, IPv6 in network byte order, which for
    /// the big-endian 128-bit cell is the same thing.
    pub fn compare(self, a: &Address, b: &Address) -> Ordering {
        match self {
            Self::Unknown => Ordering::Equal,
            Self::V4 => a.v4().cmp(&b.v4()),
            Self::V6 => a.0.cmp(&b.0),
        }
    }

    /// Copies an address, keeping only the bits meaningful to this family.
    pub fn copy(self, addr: &Address) -> Address {
        match self {
            Self::Unknown => Address::default(),
            Self::V4 => Address(u128::from(addr.v4())),
            Self::V6 => *addr,
        }
    }

    /// Parses an address literal.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] if `text` is not an address of this family,
    /// [`Error::UnknownAddressFamily`] if no family has been selected.
    pub fn parse(self, text: &str) -> Result<Address> {
        let text = text.trim();
        match self {
            Self::Unknown => Err(Error::UnknownAddressFamily(format!(
                "cannot parse '{}' before the IP version is known",
                text
            ))),
            Self::V4 => text
                .parse::<Ipv4Addr>()
                .map(Address::from)
                .map_err(|_| Error::InvalidAddress(text.to_string())),
            Self::V6 => text
                .parse::<Ipv6Addr>()
                .map(Address::from)
                .map_err(|_| Error::InvalidAddress(text.to_string())),
        }
    }

    /// Renders an address in its conventional text form.
    pub fn format(self, addr: &Address) -> String {
        match self {
            Self::Unknown => String::new(),
            Self::V4 => Ipv4Addr::from(addr.v4()).to_string(),
            Self::V6 => Ipv6Addr::from(addr.0).to_string(),
        }
    }

    /// Number of addresses in `first..=last`.
    ///
    /// IPv6 ranges can hold up to 2^128 addresses, more than any integer
    /// type can count once the `+ 1` is added, so sizes are `f64`. They are
    /// exact up to 2^53 and rounded (but still monotonic) above that.
    /// An inverted range has size 0.
    pub fn range_size(self, first: &Address, last: &Address) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::V4 => match last.v4().checked_sub(first.v4()) {
                Some(diff) => f64::from(diff) + 1.0,
                None => 0.0,
            },
            Self::V6 => match last.0.checked_sub(first.0) {
                Some(diff) => diff as f64 + 1.0,
                None => 0.0,
            },
        }
    }

    /// Highest address of the network `base/prefix`: every bit after the
    /// prefix set to one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPrefixLength`] if `prefix` is wider than the family.
    /// Without a family the base is returned unchanged.
    pub fn cidr_last(self, base: &Address, prefix: u32) -> Result<Address> {
        let max = self.max_prefix();
        if self.is_known() && prefix > max {
            return Err(Error::InvalidPrefixLength { prefix, max });
        }
        match self {
            Self::Unknown => Ok(*base),
            Self::V4 => {
                let host_mask = u32::MAX.checked_shr(prefix).unwrap_or(0);
                Ok(Address(u128::from(base.v4() | host_mask)))
            }
            Self::V6 => {
                let host_mask = u128::MAX.checked_shr(prefix).unwrap_or(0);
                Ok(Address(base.0 | host_mask))
            }
        }
    }

    /// Parses `address/prefix` into the first and last address it covers.
    pub fn parse_cidr(self, text: &str) -> Result<(Address, Address)> {
        let (host, prefix) = text
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidAddress(text.to_string()))?;
        let prefix: u32 = prefix
            .parse()
            .map_err(|_| Error::InvalidAddress(text.to_string()))?;
        let first = self.parse(host)?;
        let last = self.cidr_last(&first, prefix)?;
        Ok((first, last))
    }

    /// Prefix length of a contiguous dotted IPv4 netmask such as
    /// `255.255.255.0`. Returns `None` for non-contiguous masks.
    pub fn prefix_from_netmask(mask: Ipv4Addr) -> Option<u32> {
        let bits = u32::from(mask);
        let prefix = bits.leading_ones();
        (bits.checked_shl(prefix).unwrap_or(0) == 0).then_some(prefix)
    }
}
