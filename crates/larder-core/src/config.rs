//! Configuration for matching and trip completion
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/larder/config/larder.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::matching::MatchConfig;
use crate::models::DEFAULT_REVIEW_CONFIDENCE;
use crate::trip::TripConfig;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/larder.toml");

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub matching: MatchConfig,
    pub trip: TripConfig,
    /// OCR confidence below which receipt lines are flagged
    pub review_confidence: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching: MatchConfig::default(),
            trip: TripConfig::default(),
            review_confidence: DEFAULT_REVIEW_CONFIDENCE,
        }
    }
}

impl Config {
    /// Load from `path` if given and present, else the data-dir override, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let override_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let content = match override_path {
            Some(ref p) if p.exists() => fs::read_to_string(p)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?,
            _ => DEFAULT_CONFIG.to_string(),
        };

        parse_config(&content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("larder").join("config").join("larder.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    matching: Option<RawMatching>,
    trip: Option<RawTrip>,
    review: Option<RawReview>,
}

#[derive(Debug, Deserialize)]
struct RawMatching {
    exact_threshold: Option<u8>,
    fuzzy_threshold: Option<u8>,
    category_tiebreak: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawTrip {
    call_timeout_secs: Option<u64>,
    offer_add_on_reject: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    low_confidence: Option<u8>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(matching) = raw.matching {
        if let Some(exact) = matching.exact_threshold {
            config.matching.exact_threshold = exact;
        }
        if let Some(fuzzy) = matching.fuzzy_threshold {
            config.matching.fuzzy_threshold = fuzzy;
        }
        if let Some(tiebreak) = matching.category_tiebreak {
            config.matching.category_tiebreak = tiebreak;
        }
    }

    if let Some(trip) = raw.trip {
        if let Some(secs) = trip.call_timeout_secs {
            config.trip.call_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(offer) = trip.offer_add_on_reject {
            config.trip.offer_add_on_reject = offer;
        }
    }

    if let Some(review) = raw.review {
        if let Some(threshold) = review.low_confidence {
            if threshold > 100 {
                return Err(Error::Config(format!(
                    "review.low_confidence must be at most 100, got {}",
                    threshold
                )));
            }
            config.review_confidence = threshold;
        }
    }

    config.matching.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.matching, MatchConfig::default());
        assert_eq!(config.trip.call_timeout, Some(Duration::from_secs(30)));
        assert!(config.trip.offer_add_on_reject);
        assert_eq!(config.review_confidence, 70);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [matching]
            fuzzy_threshold = 70
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.fuzzy_threshold, 70);
        assert_eq!(config.matching.exact_threshold, 90);
        assert!(config.matching.category_tiebreak);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = parse_config("[trip]\ncall_timeout_secs = 0\n").unwrap();
        assert_eq!(config.trip.call_timeout, None);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = parse_config("[matching]\nexact_threshold = 50\nfuzzy_threshold = 80\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = parse_config("[review]\nlow_confidence = 101\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(parse_config("[matching"), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("larder.toml");
        fs::write(&path, "[matching]\nexact_threshold = 95\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.matching.exact_threshold, 95);
    }

    #[test]
    fn test_load_missing_path_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/larder.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }
}
