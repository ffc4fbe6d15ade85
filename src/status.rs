//! Alarm classification of ranges and shared networks.
//!
//! A pool is critical when its usage percent is above the critical threshold
//! and it has fewer free addresses than the critical count, warning under the
//! same test with the warning values, and ok otherwise. Pools no larger than
//! `minsize` are never alarmed. With `snet_alarms`, alarms on ranges that
//! belong to a shared network are suppressed so only the network alarms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_WARNING: f64 = 80.0;
pub const DEFAULT_CRITICAL: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
    Critical,
    /// Pool is not larger than the minimum size.
    Ignored,
    /// Range alarm hidden in favor of its shared network.
    Suppressed,
}

impl Status {
    pub fn is_alarm(self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }

    /// Monitoring-plugin exit code: 0 ok, 1 warning, 2 critical.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Ok | Self::Ignored | Self::Suppressed => 0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Ignored => write!(f, "IGNORED"),
            Self::Suppressed => write!(f, "SUPPRESSED"),
        }
    }
}

/// Alarm thresholds. Percentages are on the 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
    /// Warn only while fewer than this many addresses are free.
    pub warn_count: Option<f64>,
    /// Go critical only while fewer than this many addresses are free.
    pub crit_count: Option<f64>,
    /// Pools of this size or smaller are never alarmed.
    pub minsize: f64,
    pub snet_alarms: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING,
            critical: DEFAULT_CRITICAL,
            warn_count: None,
            crit_count: None,
            minsize: 0.0,
            snet_alarms: false,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("warning", Some(self.warning)),
            ("critical", Some(self.critical)),
            ("warn_count", self.warn_count),
            ("crit_count", self.crit_count),
            ("minsize", Some(self.minsize)),
        ];
        for (name, value) in values {
            if let Some(value) = value
                && !(value.is_finite() && value >= 0.0)
            {
                return Err(Error::InvalidConfig(format!(
                    "{} threshold must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Classifies a pool of `size` addresses with `used` active at `percent`.
    pub fn classify(&self, size: f64, used: u64, percent: f64) -> Status {
        if size <= self.minsize {
            return Status::Ignored;
        }
        let free = size - used as f64;
        let few_free = |limit: Option<f64>| limit.is_none_or(|limit| free < limit);

        if self.critical < percent && few_free(self.crit_count) {
            Status::Critical
        } else if self.warning < percent && few_free(self.warn_count) {
            Status::Warning
        } else {
            Status::Ok
        }
    }

    /// [`classify`](Self::classify) for a range, applying `snet_alarms`.
    pub fn classify_range(
        &self,
        size: f64,
        used: u64,
        percent: f64,
        in_shared_network: bool,
    ) -> Status {
        let status = self.classify(size, used, percent);
        if status.is_alarm() && self.snet_alarms && in_shared_network {
            Status::Suppressed
        } else {
            status
        }
    }
}

/// Number of pools in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub ok: usize,
    pub warning: usize,
    pub critical: usize,
    pub ignored: usize,
    pub suppressed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::Warning => self.warning += 1,
            Status::Critical => self.critical += 1,
            Status::Ignored => self.ignored += 1,
            Status::Suppressed => self.suppressed += 1,
        }
    }

    /// Most severe alarm counted, or `Ok`.
    pub fn worst(&self) -> Status {
        if self.critical > 0 {
            Status::Critical
        } else if self.warning > 0 {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

impl FromIterator<Status> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut counts = Self::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}
