//! Configuration loading and parsing.
//!
//! Parses `inkwell.toml` (or an override path provided by the binary). Every field has a
//! default, so a missing file, a missing section, or a file that fails to parse all yield a
//! usable configuration. Unknown fields are ignored to allow forward evolution.
//!
//! ```toml
//! [mention]
//! suggestion_limit = 3
//! url_template = "https://example.com/posts/{slug}"
//!
//! [recency]
//! capacity = 10
//! store = "recent-posts.json"
//!
//! [review]
//! min_token_interval_ms = 0
//! ```
//!
//! Out-of-range values are clamped by [`Config::sanitize`]; the raw parsed values are kept in
//! `file` so a later reload can compare against them.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "inkwell.toml";

pub const SUGGESTION_LIMIT_MAX: usize = 20;
pub const RECENCY_CAPACITY_MAX: usize = 100;
pub const TOKEN_INTERVAL_MAX_MS: u64 = 5_000;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MentionConfig {
    #[serde(default = "MentionConfig::default_suggestion_limit")]
    pub suggestion_limit: usize,
    #[serde(default = "MentionConfig::default_url_template")]
    pub url_template: String,
}

impl Default for MentionConfig {
    fn default() -> Self {
        Self {
            suggestion_limit: Self::default_suggestion_limit(),
            url_template: Self::default_url_template(),
        }
    }
}

impl MentionConfig {
    const fn default_suggestion_limit() -> usize {
        3
    }
    fn default_url_template() -> String {
        "https://example.com/posts/{slug}".to_string()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RecencyConfig {
    #[serde(default = "RecencyConfig::default_capacity")]
    pub capacity: usize,
    /// JSON file the recency list is persisted to. `None` keeps it in memory only.
    #[serde(default)]
    pub store: Option<PathBuf>,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            store: None,
        }
    }
}

impl RecencyConfig {
    const fn default_capacity() -> usize {
        10
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Minimum spacing between diff recomputations while a generation streams. 0 = every token.
    #[serde(default)]
    pub min_token_interval_ms: u64,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub mention: MentionConfig,
    #[serde(default)]
    pub recency: RecencyConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub effective: Effective,
}

/// Clamped values actually used by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effective {
    pub suggestion_limit: usize,
    pub recency_capacity: usize,
    pub min_token_interval: Duration,
}

impl Default for Effective {
    fn default() -> Self {
        Self::from_file(&ConfigFile::default())
    }
}

impl Effective {
    fn from_file(file: &ConfigFile) -> Self {
        Self {
            suggestion_limit: file.mention.suggestion_limit.clamp(1, SUGGESTION_LIMIT_MAX),
            recency_capacity: file.recency.capacity.clamp(1, RECENCY_CAPACITY_MAX),
            min_token_interval: Duration::from_millis(
                file.review.min_token_interval_ms.min(TOKEN_INTERVAL_MAX_MS),
            ),
        }
    }
}

/// Config path: `inkwell.toml` in the working directory, else the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("inkwell").join(CONFIG_FILE_NAME);
    }
    // Final fallback relative filename.
    local
}

/// Default location for the recency store when the config does not name one.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("inkwell").join("recent-posts.json"))
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default().sanitized());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
            effective: Effective::default(), // computed in sanitize
        }
        .sanitized()),
        Err(e) => {
            // Fall back to defaults; a broken config must never block editing.
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default().sanitized())
        }
    }
}

impl Config {
    /// Clamp raw values into their supported ranges, logging every adjustment.
    pub fn sanitize(&mut self) -> &Effective {
        let effective = Effective::from_file(&self.file);
        let raw = &self.file;
        if effective.suggestion_limit != raw.mention.suggestion_limit {
            info!(
                target: "config",
                raw = raw.mention.suggestion_limit,
                clamped = effective.suggestion_limit,
                max = SUGGESTION_LIMIT_MAX,
                "suggestion_limit_clamped"
            );
        }
        if effective.recency_capacity != raw.recency.capacity {
            info!(
                target: "config",
                raw = raw.recency.capacity,
                clamped = effective.recency_capacity,
                max = RECENCY_CAPACITY_MAX,
                "recency_capacity_clamped"
            );
        }
        if effective.min_token_interval.as_millis() != u128::from(raw.review.min_token_interval_ms) {
            info!(
                target: "config",
                raw = raw.review.min_token_interval_ms,
                max = TOKEN_INTERVAL_MAX_MS,
                "min_token_interval_clamped"
            );
        }
        self.effective = effective;
        &self.effective
    }

    fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }

    /// Recency store path: configured value, else the platform data dir.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.file.recency.store.clone().or_else(default_store_path)
    }
}
