use crate::model::Quality;
use crate::SessionBackendConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Delivery metadata attached to one quality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub url: String,
    pub size_estimate: String,
    pub duration_estimate: String,
}

/// Fixed quality → delivery mapping. Missing entries make downloads of that
/// quality fail rather than fall back to another rendition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityTable(pub BTreeMap<Quality, QualityProfile>);

impl QualityTable {
    pub fn get(&self, quality: Quality) -> Option<&QualityProfile> {
        self.0.get(&quality)
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        let profile = |quality: Quality, size: &str| QualityProfile {
            url: format!("https://example.com/movie_{quality}.mp4"),
            size_estimate: size.to_string(),
            duration_estimate: "2h 15m".to_string(),
        };
        Self(BTreeMap::from([
            (Quality::P480, profile(Quality::P480, "~700MB")),
            (Quality::P720, profile(Quality::P720, "~1.5GB")),
            (Quality::P1080, profile(Quality::P1080, "~3.2GB")),
        ]))
    }
}

/// Runtime knobs for the dispatcher. Every field has a default, so a partial
/// JSON document is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Minimum length of free text before it is treated as a search.
    pub min_query_len: usize,
    pub command_prefix: char,
    pub download_delay_ms: u64,
    /// Idle session lifetime; zero keeps sessions forever.
    pub session_ttl_secs: u32,
    pub qualities: QualityTable,
    pub bot_name: String,
    pub version: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            command_prefix: '/',
            download_delay_ms: 3_000,
            session_ttl_secs: 0,
            qualities: QualityTable::default(),
            bot_name: "Movie Download Bot".to_string(),
            version: "2.0".to_string(),
        }
    }
}

impl BotConfig {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn session_backend(&self) -> SessionBackendConfig {
        SessionBackendConfig::InMemory {
            ttl_secs: self.session_ttl_secs,
        }
    }
}
