#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod inmemory;
pub mod model;
pub mod provider;
pub mod render;
pub mod simulator;
pub mod store;

use std::sync::Arc;

pub use codec::Action;
pub use config::{BotConfig, QualityProfile, QualityTable};
pub use dispatcher::{Dispatcher, InboundEvent, Reply};
pub use error::{DispatchError, DispatchResult};
pub use model::{Quality, SearchResult, Session, SessionState, UserId};
pub use provider::{MockSearchProvider, SearchProvider};
pub use render::{Button, ButtonKind, OutboundPayload, Renderer};
pub use simulator::{DownloadCompletion, DownloadSimulator};
pub use store::SessionStore;

/// Backend selection for [`create_session_store`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionBackendConfig {
    /// Process-local store; `ttl_secs == 0` never evicts idle sessions.
    InMemory { ttl_secs: u32 },
}

impl Default for SessionBackendConfig {
    fn default() -> Self {
        Self::InMemory { ttl_secs: 0 }
    }
}

/// Builds the session store described by `config`.
pub fn create_session_store(config: SessionBackendConfig) -> Arc<dyn SessionStore> {
    match config {
        SessionBackendConfig::InMemory { ttl_secs } => {
            Arc::new(inmemory::InMemorySessionStore::with_ttl(ttl_secs))
        }
    }
}
