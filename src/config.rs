use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::address::AddressFamily;
use crate::conf_file::ConfOptions;
use crate::error::{Error, Result};
use crate::output::{OutputFormat, OutputLimit};
use crate::sort::SortChain;
use crate::status::Thresholds;

pub const DEFAULT_DHCPD_CONF: &str = "/etc/dhcpd.conf";
pub const DEFAULT_DHCPD_LEASES: &str = "/var/lib/dhcp/dhcpd.leases";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dhcpd_conf: PathBuf,
    pub dhcpd_leases: PathBuf,
    /// Sort keys, one character each (see [`SortChain`]).
    pub sort: String,
    pub reverse: bool,
    /// Forced address family; `Unknown` detects it from the input files.
    pub ip_version: AddressFamily,
    pub all_as_shared: bool,
    pub format: OutputFormat,
    /// Sections shown by the text and CSV formats, e.g. `"77"`.
    pub limit: OutputLimit,
    pub output: Option<PathBuf>,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dhcpd_conf: PathBuf::from(DEFAULT_DHCPD_CONF),
            dhcpd_leases: PathBuf::from(DEFAULT_DHCPD_LEASES),
            sort: String::new(),
            reverse: false,
            ip_version: AddressFamily::Unknown,
            all_as_shared: false,
            format: OutputFormat::Text,
            limit: OutputLimit::ALL,
            output: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dhcpd_conf.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "dhcpd.conf path must not be empty".to_string(),
            ));
        }

        if self.dhcpd_leases.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "dhcpd.leases path must not be empty".to_string(),
            ));
        }

        if let Some(output) = &self.output
            && output.as_os_str().is_empty()
        {
            return Err(Error::InvalidConfig(
                "output path must not be empty".to_string(),
            ));
        }

        self.thresholds.validate()?;
        self.sort_chain()?;
        Ok(())
    }

    /// Parses the sort specification.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSortKey`] for a character that selects no sort key.
    pub fn sort_chain(&self) -> Result<SortChain> {
        self.sort.parse()
    }

    pub fn conf_options(&self) -> ConfOptions {
        ConfOptions {
            all_as_shared: self.all_as_shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.sort_chain().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_sort_key_rejected() {
        let config = Config {
            sort: "pz".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::UnknownSortKey('z'))
        ));
    }

    #[test]
    fn test_empty_paths_rejected() {
        let config = Config {
            dhcpd_leases: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            output: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config {
            sort: "pn".to_string(),
            ip_version: AddressFamily::V6,
            format: OutputFormat::Json,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"ip_version\":\"v6\""));
        assert!(json.contains("\"limit\":\"77\""));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sort, "pn");
        assert_eq!(parsed.format, OutputFormat::Json);
        assert_eq!(parsed.thresholds, Thresholds::default());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = Config {
            thresholds: Thresholds {
                critical: f64::INFINITY,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    struct TestGuard(String);
    impl Drop for TestGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_load_partial_settings() {
        let path = format!("test_settings_{}.json", std::process::id());
        let _guard = TestGuard(path.clone());
        std::fs::write(&path, r#"{"sort": "cn", "reverse": true, "format": "csv"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sort, "cn");
        assert!(config.reverse);
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.dhcpd_conf, PathBuf::from(DEFAULT_DHCPD_CONF));
    }

    #[test]
    fn test_load_thresholds_and_limit() {
        let path = format!("test_settings_alarm_{}.json", std::process::id());
        let _guard = TestGuard(path.clone());
        std::fs::write(
            &path,
            r#"{
                "limit": "04",
                "thresholds": {"warning": 50, "crit_count": 10, "snet_alarms": true}
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.limit, "04".parse::<OutputLimit>().unwrap());
        assert_eq!(config.thresholds.warning, 50.0);
        assert_eq!(config.thresholds.critical, 90.0);
        assert_eq!(config.thresholds.crit_count, Some(10.0));
        assert_eq!(config.thresholds.warn_count, None);
        assert!(config.thresholds.snet_alarms);
    }

    #[test]
    fn test_load_rejects_bad_limit() {
        let path = format!("test_settings_limit_{}.json", std::process::id());
        let _guard = TestGuard(path.clone());
        std::fs::write(&path, r#"{"limit": "9"}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_rejects_bad_sort() {
        let path = format!("test_settings_bad_{}.json", std::process::id());
        let _guard = TestGuard(path.clone());
        std::fs::write(&path, r#"{"sort": "q"}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(Error::UnknownSortKey('q'))));
    }

    #[test]
    fn test_conf_options() {
        let config = Config {
            all_as_shared: true,
            ..Default::default()
        };
        assert!(config.conf_options().all_as_shared);
    }
}
