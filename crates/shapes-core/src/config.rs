// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shapes configuration.
//!
//! One TOML file serves both binaries; each reads the shared keys plus its own
//! section. Command-line flags override whatever the file sets.
//!
//! ```toml
//! domain_id = 0
//! topic = "Square"
//!
//! [publisher]
//! color = "RED"
//! period_ms = 1000
//!
//! [subscriber]
//! wait_timeout_ms = 1000
//!
//! [udp]
//! multicast_group = "239.255.0.1"
//! lease_ms = 5000
//! ```

use crate::display::DEFAULT_LOG_DEPTH;
use crate::error::{ConfigError, MAX_DOMAIN_ID};
use crate::model::DEFAULT_TOPIC;
use crate::motion::Bounds;
use crate::publisher::{PublisherConfig, DEFAULT_SHAPE_SIZE};
use crate::subscriber::SubscriberConfig;
use crate::udp::UdpConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapesConfig {
    /// DDS domain (0-232).
    #[serde(default)]
    pub domain_id: u32,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default)]
    pub publisher: PublisherSection,

    #[serde(default)]
    pub subscriber: SubscriberSection,

    #[serde(default)]
    pub udp: UdpConfig,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl Default for ShapesConfig {
    fn default() -> Self {
        Self {
            domain_id: 0,
            topic: default_topic(),
            publisher: PublisherSection::default(),
            subscriber: SubscriberSection::default(),
            udp: UdpConfig::default(),
        }
    }
}

/// `[publisher]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    pub color: String,
    pub period_ms: u64,
    pub shape_size: i32,
    /// Omit to publish until interrupted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    pub bounds: Bounds,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            color: "BLUE".to_string(),
            period_ms: 1000,
            shape_size: DEFAULT_SHAPE_SIZE,
            sample_count: None,
            bounds: Bounds::default(),
        }
    }
}

/// `[subscriber]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSection {
    pub wait_timeout_ms: u64,
    /// Omit to read until interrupted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    pub log_depth: usize,
}

impl Default for SubscriberSection {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 1000,
            sample_count: None,
            log_depth: DEFAULT_LOG_DEPTH,
        }
    }
}

impl ShapesConfig {
    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the default configuration to `path`.
    pub fn write_example<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let content = Self::default().to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain_id > MAX_DOMAIN_ID {
            return Err(ConfigError::Invalid(format!(
                "domain_id {} out of range (0-{})",
                self.domain_id, MAX_DOMAIN_ID
            )));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topic must not be empty".into()));
        }
        if self.publisher.color.trim().is_empty() {
            return Err(ConfigError::Invalid("publisher color must not be empty".into()));
        }
        if self.publisher.shape_size <= 0 {
            return Err(ConfigError::Invalid(format!(
                "publisher shape_size must be positive (got {})",
                self.publisher.shape_size
            )));
        }
        let bounds = &self.publisher.bounds;
        if bounds.left > bounds.right || bounds.top > bounds.bottom {
            return Err(ConfigError::Invalid(format!(
                "publisher bounds are inverted: {:?}",
                bounds
            )));
        }
        if self.subscriber.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "subscriber wait_timeout_ms must be non-zero".into(),
            ));
        }
        if self.subscriber.log_depth == 0 {
            return Err(ConfigError::Invalid("subscriber log_depth must be non-zero".into()));
        }
        if self.udp.lease_ms == 0 {
            return Err(ConfigError::Invalid("udp lease_ms must be non-zero".into()));
        }
        // Writes are the only liveliness signal a reader sees.
        if self.publisher.period_ms >= self.udp.lease_ms {
            return Err(ConfigError::Invalid(format!(
                "publisher period_ms {} must be shorter than udp lease_ms {}",
                self.publisher.period_ms, self.udp.lease_ms
            )));
        }
        if !self.udp.multicast_group.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "udp multicast_group {} is not a multicast address",
                self.udp.multicast_group
            )));
        }
        Ok(())
    }

    /// Session settings for the publisher.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            topic: self.topic.clone(),
            color: self.publisher.color.clone(),
            sample_count: self.publisher.sample_count,
            period: Duration::from_millis(self.publisher.period_ms),
            shape_size: self.publisher.shape_size,
            bounds: self.publisher.bounds,
        }
    }

    /// Session settings for the subscriber.
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            topic: self.topic.clone(),
            sample_count: self.subscriber.sample_count,
            wait_timeout: Duration::from_millis(self.subscriber.wait_timeout_ms),
        }
    }
}

/// Log filter directive for a `--verbosity` level (0 = off, 5 = trace).
pub fn verbosity_directive(level: u8) -> &'static str {
    match level {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        let config = ShapesConfig::default();
        config.validate().unwrap();
        assert_eq!(config.topic, "Square");
        assert_eq!(config.publisher_config().period, Duration::from_secs(1));
        assert_eq!(config.subscriber_config().wait_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
domain_id = 7
topic = "Circle"

[publisher]
color = "ORANGE"
sample_count = 12

[udp]
lease_ms = 2500
"#
        )
        .unwrap();

        let config = ShapesConfig::from_file(file.path()).unwrap();
        assert_eq!(config.domain_id, 7);
        assert_eq!(config.topic, "Circle");
        assert_eq!(config.publisher.color, "ORANGE");
        assert_eq!(config.publisher.sample_count, Some(12));
        assert_eq!(config.publisher.shape_size, 30);
        assert_eq!(config.subscriber, SubscriberSection::default());
        assert_eq!(config.udp.lease(), Duration::from_millis(2500));

        let publisher = config.publisher_config();
        assert_eq!(publisher.topic, "Circle");
        assert_eq!(publisher.bounds, Bounds::default());
    }

    #[test]
    fn test_invalid_domain_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "domain_id = 233").unwrap();
        let err = ShapesConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validation_rules() {
        let mut config = ShapesConfig::default();
        config.publisher.color = " ".into();
        assert!(config.validate().is_err());

        let mut config = ShapesConfig::default();
        config.publisher.shape_size = 0;
        assert!(config.validate().is_err());

        let mut config = ShapesConfig::default();
        config.subscriber.wait_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ShapesConfig::default();
        config.topic = String::new();
        assert!(config.validate().is_err());

        let mut config = ShapesConfig::default();
        config.udp.multicast_group = "10.0.0.1".parse().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_period_must_fit_in_lease() {
        let mut config = ShapesConfig::default();
        config.publisher.period_ms = 6_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.publisher.period_ms = config.udp.lease_ms;
        assert!(config.validate().is_err());

        config.udp.lease_ms = 10_000;
        config.validate().unwrap();
    }

    #[test]
    fn test_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "domain_id = \"zero\"").unwrap();
        assert!(matches!(
            ShapesConfig::from_file(file.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_directive(0), "off");
        assert_eq!(verbosity_directive(3), "info");
        assert_eq!(verbosity_directive(5), "trace");
        assert_eq!(verbosity_directive(9), "trace");
    }

    #[test]
    fn test_example_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapes.toml");
        ShapesConfig::write_example(&path).unwrap();

        let loaded = ShapesConfig::from_file(&path).unwrap();
        assert_eq!(loaded, ShapesConfig::default());
    }
}
