//! Run configuration.
//!
//! Defaults describe the reference Restful-Booker runs. A YAML file may set
//! any subset of fields; missing fields keep their defaults.

use crate::error::{BookloadError, BookloadResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Public demo booking service
pub const DEFAULT_BASE_URL: &str = "https://restful-booker.herokuapp.com";

/// Longest accepted duration setting, in seconds (one week)
pub const MAX_SECS: u64 = 7 * 24 * 60 * 60;

/// Settings for one run of a reference simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Target service root
    pub base_url: String,
    /// Total run duration in seconds
    pub duration_secs: u64,
    /// Sessions ramped over the run duration
    pub ramp_users: u32,
    /// Throttle steady-state requests per second
    pub target_rps: f64,
    /// Seconds to reach `target_rps`
    pub throttle_ramp_secs: u64,
    /// Arrivals per second of the negative scenario
    pub negative_rate: f64,
    /// Seconds the negative scenario keeps arriving
    pub negative_duration_secs: u64,
    /// Seconds in-flight sessions may drain after the duration
    pub grace_secs: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Feeder seed; unseeded runs draw from the OS
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            duration_secs: 120,
            ramp_users: 5,
            target_rps: 10.0,
            throttle_ramp_secs: 30,
            negative_rate: 1.0,
            negative_duration_secs: 30,
            grace_secs: 10,
            request_timeout_secs: 60,
            seed: None,
        }
    }
}

impl RunConfig {
    /// Parse YAML; absent fields take their defaults
    pub fn from_yaml(yaml: &str) -> BookloadResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn load(path: &Path) -> BookloadResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> BookloadResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the service root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the run duration in seconds
    #[must_use]
    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Set the ramped session count
    #[must_use]
    pub fn with_ramp_users(mut self, users: u32) -> Self {
        self.ramp_users = users;
        self
    }

    /// Set the throttle target
    #[must_use]
    pub fn with_target_rps(mut self, rps: f64) -> Self {
        self.target_rps = rps;
        self
    }

    /// Set the grace period in seconds
    #[must_use]
    pub fn with_grace_secs(mut self, secs: u64) -> Self {
        self.grace_secs = secs;
        self
    }

    /// Set the request timeout in seconds
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Seed the feeders
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run duration
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Grace period
    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values no run can use
    pub fn validate(&self) -> BookloadResult<()> {
        let url = self.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BookloadError::config(format!(
                "base_url must be an http(s) URL, got {url:?}"
            )));
        }
        for (name, secs) in [
            ("duration_secs", self.duration_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(BookloadError::config(format!("{name} must be positive")));
            }
        }
        for (name, secs) in [
            ("duration_secs", self.duration_secs),
            ("throttle_ramp_secs", self.throttle_ramp_secs),
            ("negative_duration_secs", self.negative_duration_secs),
            ("grace_secs", self.grace_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if secs > MAX_SECS {
                return Err(BookloadError::config(format!(
                    "{name} must be at most {MAX_SECS}, got {secs}"
                )));
            }
        }
        for (name, value) in [
            ("target_rps", self.target_rps),
            ("negative_rate", self.negative_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BookloadError::config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.duration(), Duration::from_secs(120));
        assert_eq!(config.ramp_users, 5);
        assert_eq!(config.target_rps, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "base_url: http://localhost:3001\nramp_users: 2\n";
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.ramp_users, 2);
        assert_eq!(config.duration_secs, 120);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_validate_rejects() {
        let base = RunConfig::default();
        assert!(base.clone().with_base_url("ftp://x").validate().is_err());
        assert!(base.clone().with_target_rps(0.0).validate().is_err());
        assert!(base.clone().with_duration_secs(0).validate().is_err());
        assert!(base.with_request_timeout_secs(0).validate().is_err());
        assert!(RunConfig::from_yaml("negative_rate: -1\n").is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let base = RunConfig::default();
        let huge = base.clone().with_duration_secs(u64::MAX);
        let err = huge.validate().unwrap_err();
        assert!(err.to_string().contains("duration_secs"));
        let late = base.clone().with_grace_secs(MAX_SECS + 1);
        assert!(late.validate().is_err());
        assert!(base.with_duration_secs(MAX_SECS).validate().is_ok());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duration_secs: 30\nseed: 7").unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.duration_secs, 30);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = RunConfig::default().with_seed(3).with_ramp_users(8);
        let back = RunConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RunConfig::load(Path::new("/nonexistent/bookload.yaml")).unwrap_err();
        assert!(matches!(err, BookloadError::Io(_)));
    }
}
