use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AckError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub tick_rate_ms: u64,
    /// Accounts whose comments never count as reviews (bots, mostly).
    pub ignored_authors: Vec<String>,
    pub skip_pr_author: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            ignored_authors: vec!["DrahtBot".to_string()],
            skip_pr_author: true,
        }
    }
}

/// Keyword table driving comment classification.
///
/// Keywords match case-insensitively as whole words. Whitespace inside a
/// keyword matches any run of whitespace in the comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub nack: Vec<String>,
    pub concept_ack: Vec<String>,
    pub ack: Vec<String>,
    pub ready_for_merge: Vec<String>,
    pub sha_min_len: usize,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let words = |w: &[&str]| w.iter().map(|s| s.to_string()).collect();
        Self {
            nack: words(&["NACK"]),
            concept_ack: words(&["Concept ACK", "Approach ACK"]),
            ack: words(&["ACK", "utACK", "tACK", "crACK", "reACK", "re-ACK"]),
            ready_for_merge: words(&["rfm"]),
            sha_min_len: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub vocabulary: Vocabulary,
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("ackboard").join("config.toml"))
}

impl Config {
    /// Load from an explicit path (errors are fatal) or from the default
    /// location (missing or broken files fall back to defaults).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AckError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            return Self::parse(&content)
                .map_err(|e| AckError::Config(format!("{}: {}", path.display(), e)));
        }

        let Some(path) = config_path() else {
            return Ok(Config::default());
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Ok(Config::default());
        };

        match Self::parse(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
                Ok(Config::default())
            }
        }
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }
}
