use crate::error::ProviderError;
use crate::model::{MediaType, SearchResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Resolves a query to ranked results. Implementations must be deterministic
/// for identical input during a single call and may return an empty list.
#[async_trait]
pub trait SearchProvider: Send + Sync + 'static {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Canned catalogue used until a real metadata backend is wired in.
///
/// Every query yields the same three-entry shape; ids are derived from the
/// query so results of different searches never share an id.
#[derive(Clone, Debug, Default)]
pub struct MockSearchProvider {
    no_matches: HashSet<String>,
    failing: HashSet<String>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `query` (case-insensitive) return an empty result list.
    pub fn with_no_matches(mut self, query: impl AsRef<str>) -> Self {
        self.no_matches.insert(normalize(query.as_ref()));
        self
    }

    /// Makes `query` (case-insensitive) fail as if the backend were down.
    pub fn failing_for(mut self, query: impl AsRef<str>) -> Self {
        self.failing.insert(normalize(query.as_ref()));
        self
    }

    fn external_id(query: &str, rank: usize) -> String {
        let digest = hex_sha(&format!("{}#{rank}", normalize(query)));
        // Seven decimal digits keep the familiar `tt0000000` shape.
        let value = u64::from_str_radix(&digest[..12], 16).unwrap_or_default() % 10_000_000;
        format!("tt{value:07}")
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        let key = normalize(query);
        if key.is_empty() {
            return Err(ProviderError::InvalidQuery("empty query".into()));
        }
        if self.failing.contains(&key) {
            return Err(ProviderError::Unavailable(format!(
                "catalogue lookup for `{query}` failed"
            )));
        }
        if self.no_matches.contains(&key) {
            return Ok(Vec::new());
        }

        let query = query.trim();
        let catalogue = [
            (query.to_string(), "2023", MediaType::Movie),
            (format!("{query} Part 2"), "2022", MediaType::Movie),
            (format!("{query} TV Series"), "2021-2023", MediaType::Series),
        ];
        Ok(catalogue
            .into_iter()
            .enumerate()
            .map(|(rank, (title, year, media_type))| SearchResult {
                title,
                year: year.to_string(),
                external_id: Self::external_id(query, rank),
                media_type,
            })
            .collect())
    }
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

fn hex_sha(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
