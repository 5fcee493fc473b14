//! Timed stand-in for the real file preparation pipeline.
//!
//! Each download runs as its own task keyed by a [`DownloadToken`]. The task
//! never touches session state; it reports a [`DownloadCompletion`] on a
//! channel and the dispatcher decides whether the token is still current.

use crate::config::QualityTable;
use crate::error::SimulatorError;
use crate::model::{DownloadResult, DownloadToken, Quality, UserId};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Completion event tagged with the generation that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadCompletion {
    pub user: UserId,
    pub token: DownloadToken,
    pub outcome: Result<DownloadResult, SimulatorError>,
}

pub type CompletionReceiver = mpsc::UnboundedReceiver<DownloadCompletion>;

#[derive(Clone, Debug)]
pub struct DownloadHandle {
    token: DownloadToken,
    cancel: CancellationToken,
}

impl DownloadHandle {
    pub fn token(&self) -> DownloadToken {
        self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct DownloadSimulator {
    delay: Duration,
    qualities: QualityTable,
    jobs: Arc<DashMap<DownloadToken, CancellationToken>>,
    completions: mpsc::UnboundedSender<DownloadCompletion>,
}

impl DownloadSimulator {
    /// Creates a simulator and the receiving end of its completion channel.
    pub fn new(delay: Duration, qualities: QualityTable) -> (Self, CompletionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let simulator = Self {
            delay,
            qualities,
            jobs: Arc::new(DashMap::new()),
            completions: tx,
        };
        (simulator, rx)
    }

    /// Spawns the preparation task. Must be called from within a tokio runtime.
    pub fn start(&self, user: UserId, token: DownloadToken, quality: Quality) -> DownloadHandle {
        let cancel = CancellationToken::new();
        self.jobs.insert(token, cancel.clone());

        let handle = DownloadHandle {
            token,
            cancel: cancel.clone(),
        };
        let delay = self.delay;
        let profile = self.qualities.get(quality).cloned();
        let jobs = Arc::clone(&self.jobs);
        let completions = self.completions.clone();

        info!(user = %user, token = %token, quality = %quality, "download preparation started");
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(token = %token, "download preparation cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            jobs.remove(&token);

            let outcome = profile
                .map(|profile| DownloadResult {
                    quality,
                    size_estimate: profile.size_estimate,
                    duration_estimate: profile.duration_estimate,
                    delivery_url: profile.url,
                })
                .ok_or(SimulatorError::QualityUnavailable(quality));
            let completion = DownloadCompletion {
                user,
                token,
                outcome,
            };
            if completions.send(completion).is_err() {
                debug!(token = %token, "completion receiver dropped");
            }
        });

        handle
    }

    /// Cancels a running preparation. Safe to call repeatedly or after completion.
    pub fn cancel(&self, handle: &DownloadHandle) {
        self.cancel_token(&handle.token);
        handle.cancel.cancel();
    }

    /// Cancels by generation id. Returns whether a running task was found.
    pub fn cancel_token(&self, token: &DownloadToken) -> bool {
        match self.jobs.remove(token) {
            Some((_, cancel)) => {
                cancel.cancel();
                debug!(token = %token, "download cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Number of preparations still running.
    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }
}
