use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;

static DEVELOPMENT_CONFIG: Lazy<Config> =
    Lazy::new(|| toml::from_str(include_str!("../../docs/config/dev.toml")).unwrap());
static PRODUCTION_CONFIG: Lazy<Config> =
    Lazy::new(|| toml::from_str(include_str!("../../docs/config/prod.toml")).unwrap());

/// Relative weights used by the scorer. Kept as plain `f64` (rather than
/// `Money`) since these are dimensionless factors, not currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringWeights {
    pub tag: f64,
    pub category: f64,
    pub budget: f64,
    pub bid: f64,
}

impl ScoringWeights {
    /// Re-weighted for a request that only supplies a category: the tag
    /// and category shares are folded into a single category weight.
    pub fn category_only(self) -> Self {
        Self {
            tag: 0.0,
            category: self.tag + self.category,
            budget: self.budget,
            bid: self.bid,
        }
    }

    /// Re-weighted for a request that only supplies tags.
    pub fn tags_only(self) -> Self {
        Self {
            tag: self.tag + self.category,
            category: 0.0,
            budget: self.budget,
            bid: self.bid,
        }
    }

    /// Re-weighted for the fallback path, where neither category nor tags
    /// matched anything: only budget and bid remain meaningful, scaled
    /// back up to sum to 1.0.
    pub fn neither(self) -> Self {
        let remaining = self.budget + self.bid;
        if remaining <= f64::EPSILON {
            Self {
                tag: 0.0,
                category: 0.0,
                budget: 0.5,
                bid: 0.5,
            }
        } else {
            Self {
                tag: 0.0,
                category: 0.0,
                budget: self.budget / remaining,
                bid: self.bid / remaining,
            }
        }
    }
}

/// Bounds the candidate fetcher and selector, per the serving algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdServingLimits {
    pub min_score: f64,
    pub max_candidates: u32,
}

/// Business-tunable constants for the ad-serving core: what the teacher
/// calls the "domain" configuration, as opposed to infrastructure
/// settings like socket addresses or database DSNs (see
/// `adserver::application::EnvConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub cost_per_view_cents: u64,
    pub impression_ttl_minutes: i64,
    pub min_score: f64,
    pub max_candidates: u32,
    pub scoring_weights: ScoringWeights,
}

impl Config {
    pub fn serving_limits(&self) -> AdServingLimits {
        AdServingLimits {
            min_score: self.min_score,
            max_candidates: self.max_candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigError {
    InvalidFile(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidFile(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads the business configuration. `config_file`, when given, always
/// wins; otherwise `environment` selects between the baked-in
/// development and production defaults.
pub fn configuration(environment: &str, config_file: Option<&str>) -> Result<Config, ConfigError> {
    match config_file {
        Some(path) => {
            let contents = fs::read_to_string(path).map_err(|err| {
                ConfigError::InvalidFile(format!("unable to read config file {path}: {err}"))
            })?;

            toml::from_str(&contents).map_err(|err| ConfigError::InvalidFile(err.to_string()))
        }
        None => match environment {
            "production" => Ok(PRODUCTION_CONFIG.clone()),
            _ => Ok(DEVELOPMENT_CONFIG.clone()),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn loads_development_defaults_when_no_file_given() {
        let config = configuration("development", None).expect("should load");
        assert_eq!(50, config.cost_per_view_cents);
        assert_eq!(10, config.impression_ttl_minutes);
    }

    #[test]
    fn loads_production_defaults() {
        let config = configuration("production", None).expect("should load");
        assert_eq!(5, config.impression_ttl_minutes);
    }

    #[test]
    fn reweighting_sums_to_one() {
        let weights = ScoringWeights {
            tag: 0.3,
            category: 0.25,
            budget: 0.3,
            bid: 0.15,
        };

        let category_only = weights.category_only();
        assert!((category_only.tag + category_only.category + category_only.budget + category_only.bid - 1.0).abs() < 1e-9);

        let tags_only = weights.tags_only();
        assert!((tags_only.tag + tags_only.category + tags_only.budget + tags_only.bid - 1.0).abs() < 1e-9);
    }
}
