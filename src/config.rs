//! Engine configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) is valid.

use std::path::Path;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A course-name heuristic as written in config.
///
/// A bare string is a case-insensitive substring; `{ "regex": "..." }` is a
/// case-insensitive regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamePattern {
    Substring(String),
    Regex { regex: String },
}

/// Compiled form of [`NamePattern`].
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Substring(String),
    Regex(Regex),
}

impl NameMatcher {
    pub fn compile(pattern: &NamePattern) -> Result<Self, ConfigError> {
        match pattern {
            NamePattern::Substring(s) => Ok(NameMatcher::Substring(s.to_lowercase())),
            NamePattern::Regex { regex } => RegexBuilder::new(regex)
                .case_insensitive(true)
                .build()
                .map(NameMatcher::Regex)
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: regex.clone(),
                    detail: e.to_string(),
                }),
        }
    }

    pub fn is_match(&self, course_name: &str) -> bool {
        match self {
            NameMatcher::Substring(needle) => {
                !needle.is_empty() && course_name.to_lowercase().contains(needle.as_str())
            }
            NameMatcher::Regex(re) => re.is_match(course_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingLevel {
    pub description: String,
    pub points: f64,
}

impl RatingLevel {
    fn new(description: &str, points: f64) -> Self {
        Self {
            description: description.to_string(),
            points,
        }
    }
}

/// Ordered rating scale used by standards-based courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub max_points: f64,
    pub levels: Vec<RatingLevel>,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self {
            max_points: 4.0,
            levels: vec![
                RatingLevel::new("Exemplary", 4.0),
                RatingLevel::new("Beyond Target", 3.5),
                RatingLevel::new("Target", 3.0),
                RatingLevel::new("Approaching Target", 2.5),
                RatingLevel::new("Developing", 2.0),
                RatingLevel::new("Beginning", 1.5),
                RatingLevel::new("Needs Support", 1.0),
                RatingLevel::new("Insufficient", 0.5),
                RatingLevel::new("No Evidence", 0.0),
            ],
        }
    }
}

impl RatingScale {
    /// Whether `label` names a level of this scale (trimmed, case-insensitive).
    pub fn contains_label(&self, label: &str) -> bool {
        let label = label.trim();
        !label.is_empty()
            && self
                .levels
                .iter()
                .any(|level| level.description.eq_ignore_ascii_case(label))
    }

    /// Convert an enrollment percentage onto this scale's point range.
    pub fn percentage_to_points(&self, percentage: f64) -> f64 {
        percentage / 100.0 * self.max_points
    }

    /// Highest level whose points do not exceed `points`.
    pub fn level_for_points(&self, points: f64) -> Option<&RatingLevel> {
        self.levels
            .iter()
            .filter(|level| level.points <= points)
            .max_by(|a, b| a.points.total_cmp(&b.points))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name_patterns: Vec<NamePattern>,
    pub rating_scale: RatingScale,
    pub sentinel_assignment: String,
    pub concurrency: usize,
    pub raw_cache_ttl_secs: u64,
    pub key_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_patterns: vec![
                NamePattern::Substring("SBG".to_string()),
                NamePattern::Substring("standards-based".to_string()),
                NamePattern::Substring("standards based".to_string()),
                NamePattern::Regex {
                    regex: r"\bSBL\b".to_string(),
                },
            ],
            rating_scale: RatingScale::default(),
            sentinel_assignment: "Current Score".to_string(),
            concurrency: 3,
            raw_cache_ttl_secs: 300,
            key_prefix: "gsc:".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.matchers()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn matchers(&self) -> Result<Vec<NameMatcher>, ConfigError> {
        self.name_patterns.iter().map(NameMatcher::compile).collect()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn raw_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.raw_cache_ttl_secs)
    }
}
