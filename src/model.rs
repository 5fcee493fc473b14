use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Stable identity of the person on the other side of the chat.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrows the underlying identifier as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation id of an in-flight download; replaced on every quality pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadToken(pub Uuid);

impl DownloadToken {
    /// Mints a fresh generation id.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DownloadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn label(self) -> &'static str {
        match self {
            MediaType::Movie => "Movie",
            MediaType::Series => "Series",
        }
    }
}

/// Supported renditions. The token form is the bare line count (`720`), the
/// display form carries the `p` suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "1080")]
    P1080,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::P480, Quality::P720, Quality::P1080];

    /// Token representation, digits only.
    pub const fn as_digits(self) -> &'static str {
        match self {
            Quality::P480 => "480",
            Quality::P720 => "720",
            Quality::P1080 => "1080",
        }
    }

    pub fn from_digits(raw: &str) -> Option<Self> {
        match raw {
            "480" => Some(Quality::P480),
            "720" => Some(Quality::P720),
            "1080" => Some(Quality::P1080),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.as_digits())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_suffix('p').unwrap_or(s);
        Self::from_digits(digits).ok_or_else(|| format!("unsupported quality `{s}`"))
    }
}

/// One ranked entry returned by a search provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Release year, or a range such as `2021-2023` for series.
    pub year: String,
    pub external_id: String,
    pub media_type: MediaType,
}

/// Delivery metadata produced once a download finished preparing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub quality: Quality,
    pub size_estimate: String,
    pub duration_estimate: String,
    pub delivery_url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    ShowingResults,
    ShowingQuality,
    Downloading,
    DownloadReady,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::ShowingResults => "showing_results",
            SessionState::ShowingQuality => "showing_quality",
            SessionState::Downloading => "downloading",
            SessionState::DownloadReady => "download_ready",
        };
        f.write_str(name)
    }
}

/// Conversation state for a single user.
///
/// Fields are only written through [`crate::store::SessionStore::update`]; the
/// transition helpers below keep `state` and the optional fields consistent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub state: SessionState,
    pub last_query: String,
    pub results: Vec<SearchResult>,
    pub selected_index: Option<usize>,
    pub selected_quality: Option<Quality>,
    pub active_download: Option<DownloadToken>,
    pub delivery: Option<DownloadResult>,
    /// Ticket of the most recently requested search.
    pub search_seq: u64,
    pub updated_at: OffsetDateTime,
}

impl Session {
    /// Fresh idle session for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: SessionState::Idle,
            last_query: String::new(),
            results: Vec::new(),
            selected_index: None,
            selected_quality: None,
            active_download: None,
            delivery: None,
            search_seq: 0,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Result currently selected, if the index still points into `results`.
    pub fn selected(&self) -> Option<&SearchResult> {
        self.selected_index.and_then(|idx| self.results.get(idx))
    }

    /// Replaces results and query in one step, dropping every downstream field.
    /// Returns the download generation that was active, so the caller can cancel it.
    pub fn replace_results(
        &mut self,
        query: impl Into<String>,
        results: Vec<SearchResult>,
    ) -> Option<DownloadToken> {
        self.last_query = query.into();
        self.results = results;
        self.state = SessionState::ShowingResults;
        self.clear_selection()
    }

    /// Drops everything back to the idle shape. The search ticket survives so
    /// late provider results stay detectable.
    pub fn reset(&mut self) -> Option<DownloadToken> {
        self.last_query.clear();
        self.results.clear();
        self.state = SessionState::Idle;
        self.clear_selection()
    }

    fn clear_selection(&mut self) -> Option<DownloadToken> {
        self.selected_index = None;
        self.selected_quality = None;
        self.delivery = None;
        self.active_download.take()
    }

    /// Checks that `state` agrees with the populated optional fields.
    pub fn is_consistent(&self) -> bool {
        let selection_in_bounds = self
            .selected_index
            .map_or(true, |idx| idx < self.results.len());
        let shape = match self.state {
            SessionState::Idle => {
                self.results.is_empty()
                    && self.selected_index.is_none()
                    && self.selected_quality.is_none()
            }
            SessionState::ShowingResults => {
                self.selected_index.is_none() && self.selected_quality.is_none()
            }
            SessionState::ShowingQuality => {
                self.selected_index.is_some() && self.selected_quality.is_none()
            }
            SessionState::Downloading => {
                self.selected_index.is_some()
                    && self.selected_quality.is_some()
                    && self.active_download.is_some()
            }
            SessionState::DownloadReady => {
                self.selected_index.is_some()
                    && self.selected_quality.is_some()
                    && self.delivery.is_some()
            }
        };
        selection_in_bounds && shape
    }
}
