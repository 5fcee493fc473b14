//! Conversation state machine.
//!
//! Every inbound event is resolved into a [`Transition`] by one of the
//! `try_*` entry points, which return typed errors. [`Dispatcher::handle`] and
//! [`Dispatcher::handle_completion`] are the boundary adapters that turn those
//! results into payloads, so the transport always gets something to send.
//!
//! Session locks are never held across an `.await`: a search reads a ticket,
//! calls the provider, then applies the result in a second atomic update that
//! checks the ticket is still current. Download completions are checked the
//! same way against the session's active generation.

use crate::codec::Action;
use crate::config::BotConfig;
use crate::error::{
    DispatchError, DispatchResult, ProviderError, StaleReference, ValidationError,
};
use crate::model::{DownloadToken, Quality, Session, SessionState, UserId};
use crate::provider::SearchProvider;
use crate::render::{OutboundPayload, Renderer};
use crate::simulator::{CompletionReceiver, DownloadCompletion, DownloadSimulator};
use crate::store::SessionStore;
use crate::create_session_store;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Event delivered by the messaging transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        user: UserId,
        name: String,
        args: Vec<String>,
    },
    Text {
        user: UserId,
        text: String,
    },
    Callback {
        user: UserId,
        token: String,
    },
}

impl InboundEvent {
    pub fn user(&self) -> &UserId {
        match self {
            InboundEvent::Command { user, .. }
            | InboundEvent::Text { user, .. }
            | InboundEvent::Callback { user, .. } => user,
        }
    }

    pub fn text(user: &UserId, text: impl Into<String>) -> Self {
        InboundEvent::Text {
            user: user.clone(),
            text: text.into(),
        }
    }

    pub fn callback(user: &UserId, token: impl Into<String>) -> Self {
        InboundEvent::Callback {
            user: user.clone(),
            token: token.into(),
        }
    }

    pub fn command(user: &UserId, name: impl Into<String>, args: &[&str]) -> Self {
        InboundEvent::Command {
            user: user.clone(),
            name: name.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }
}

/// Payload addressed to one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub user: UserId,
    pub payload: OutboundPayload,
}

/// What to show once a transition has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    /// The rendering rule of the session's state.
    Current,
    Welcome,
    Help,
    About,
}

/// Committed session snapshot plus the view to render for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub view: View,
}

impl Transition {
    fn current(session: Session) -> Self {
        Self {
            session,
            view: View::Current,
        }
    }
}

enum SearchApply {
    Replaced(Option<DownloadToken>),
    Reverted(Option<DownloadToken>, ProviderError),
    Superseded,
}

pub struct Dispatcher {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn SearchProvider>,
    simulator: DownloadSimulator,
    renderer: Renderer,
    config: BotConfig,
}

impl Dispatcher {
    /// Wires a dispatcher around an existing store. The returned receiver
    /// carries simulator completions that must be fed back through
    /// [`Dispatcher::handle_completion`].
    pub fn new(
        config: BotConfig,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn SearchProvider>,
    ) -> (Self, CompletionReceiver) {
        let (simulator, completions) =
            DownloadSimulator::new(config.download_delay(), config.qualities.clone());
        let renderer = Renderer::new(config.bot_name.clone(), config.version.clone());
        let dispatcher = Self {
            store,
            provider,
            simulator,
            renderer,
            config,
        };
        (dispatcher, completions)
    }

    /// Builds the store described by `config` and wires a dispatcher around it.
    pub fn from_config(
        config: BotConfig,
        provider: Arc<dyn SearchProvider>,
    ) -> (Self, CompletionReceiver) {
        let store = create_session_store(config.session_backend());
        Self::new(config, store, provider)
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn simulator(&self) -> &DownloadSimulator {
        &self.simulator
    }

    pub fn session(&self, user: &UserId) -> Session {
        self.store.get(user)
    }

    /// Handles an event and always produces a reply.
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let user = event.user().clone();
        let payload = match self.try_handle(&event).await {
            Ok(transition) => self.render(&transition),
            Err(err) => self.render_error(&user, &err),
        };
        Reply { user, payload }
    }

    /// Resolves an event into a committed transition.
    pub async fn try_handle(&self, event: &InboundEvent) -> DispatchResult<Transition> {
        match event {
            InboundEvent::Command { user, name, args } => {
                let name = name.trim_start_matches(self.config.command_prefix);
                self.command(user, name, args).await
            }
            InboundEvent::Text { user, text } => self.text(user, text).await,
            InboundEvent::Callback { user, token } => {
                let action = Action::decode(token)?;
                self.action(user, action).await
            }
        }
    }

    /// Applies a simulator completion. Completions for a superseded
    /// generation are dropped and produce no reply.
    pub fn handle_completion(&self, completion: DownloadCompletion) -> Option<Reply> {
        let user = completion.user.clone();
        let token = completion.token;
        match self.try_handle_completion(completion) {
            Ok(transition) => Some(Reply {
                payload: self.render(&transition),
                user,
            }),
            Err(err) if err.is_stale() => {
                debug!(user = %user, token = %token, "discarding stale download completion");
                None
            }
            Err(err) => Some(Reply {
                payload: self.render_error(&user, &err),
                user,
            }),
        }
    }

    pub fn try_handle_completion(
        &self,
        completion: DownloadCompletion,
    ) -> DispatchResult<Transition> {
        let DownloadCompletion {
            user,
            token,
            outcome,
        } = completion;
        let (failure, session) = self.store.transition(&user, |session| {
            if session.state != SessionState::Downloading
                || session.active_download != Some(token)
            {
                return Err(StaleReference::SupersededDownload.into());
            }
            session.active_download = None;
            match outcome {
                Ok(result) => {
                    session.delivery = Some(result);
                    session.state = SessionState::DownloadReady;
                    Ok(None)
                }
                Err(err) => {
                    session.selected_quality = None;
                    session.delivery = None;
                    session.state = SessionState::ShowingQuality;
                    Ok(Some(err))
                }
            }
        })?;

        if let Some(err) = failure {
            warn!(user = %user, token = %token, error = %err, "download preparation failed");
            return Err(err.into());
        }
        info!(user = %user, token = %token, "download ready");
        Ok(Transition::current(session))
    }

    /// Forwards simulator completions through the dispatcher onto `outbound`
    /// until either channel closes.
    pub fn spawn_completion_pump(
        self: Arc<Self>,
        mut completions: CompletionReceiver,
        outbound: mpsc::UnboundedSender<Reply>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(completion) = completions.recv().await {
                if let Some(reply) = self.handle_completion(completion) {
                    if outbound.send(reply).is_err() {
                        debug!("outbound channel closed; stopping completion pump");
                        break;
                    }
                }
            }
        })
    }

    pub fn render(&self, transition: &Transition) -> OutboundPayload {
        let session = &transition.session;
        match transition.view {
            View::Current => self.renderer.render(session),
            View::Welcome => self.renderer.welcome(),
            View::Help => self.renderer.help(session),
            View::About => self.renderer.about(session),
        }
    }

    fn render_error(&self, user: &UserId, err: &DispatchError) -> OutboundPayload {
        match err {
            DispatchError::Provider(_)
            | DispatchError::Simulator(_)
            | DispatchError::Internal(_) => {
                warn!(user = %user, error = %err, "dispatch failed");
            }
            _ => debug!(user = %user, error = %err, "rejected event"),
        }
        let session = self.store.get(user);
        self.renderer.notice(&session, err.user_message())
    }

    async fn command(
        &self,
        user: &UserId,
        name: &str,
        args: &[String],
    ) -> DispatchResult<Transition> {
        // Telegram addresses commands in groups as `/search@SomeBot`.
        let name = name.split('@').next().unwrap_or_default();
        let view = match name {
            "start" => View::Welcome,
            "help" => View::Help,
            "about" => View::About,
            "search" => {
                let query = args.join(" ");
                let query = query.trim();
                if query.is_empty() {
                    return Err(ValidationError::EmptyQuery.into());
                }
                return self.search(user, query).await;
            }
            other => return Err(ValidationError::UnknownCommand(other.to_string()).into()),
        };
        Ok(Transition {
            session: self.store.get(user),
            view,
        })
    }

    async fn text(&self, user: &UserId, text: &str) -> DispatchResult<Transition> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix(self.config.command_prefix) {
            let mut words = rest.split_whitespace();
            let name = words.next().unwrap_or_default();
            let args: Vec<String> = words.map(str::to_string).collect();
            return self.command(user, name, &args).await;
        }
        if text.chars().count() < self.config.min_query_len {
            return Err(ValidationError::QueryTooShort {
                min: self.config.min_query_len,
            }
            .into());
        }
        self.search(user, text).await
    }

    async fn action(&self, user: &UserId, action: Action) -> DispatchResult<Transition> {
        match action {
            Action::Help => Ok(Transition {
                session: self.store.get(user),
                view: View::Help,
            }),
            Action::About => Ok(Transition {
                session: self.store.get(user),
                view: View::About,
            }),
            Action::BackToSearch => self.back_to_search(user).await,
            Action::Select(index) => self.select(user, index),
            Action::Quality {
                external_id,
                quality,
            } => self.pick_quality(user, &external_id, quality),
        }
    }

    async fn search(&self, user: &UserId, query: &str) -> DispatchResult<Transition> {
        let (ticket, _) = self.store.transition(user, |session| {
            session.search_seq += 1;
            Ok(session.search_seq)
        })?;
        debug!(user = %user, query, ticket, "search requested");

        // A provider panic ends its own task and comes back as a `JoinError`.
        let provider = Arc::clone(&self.provider);
        let owned = query.to_string();
        let outcome = tokio::spawn(async move { provider.search(&owned).await })
            .await
            .map_err(|err| {
                DispatchError::Internal(format!("search provider task failed: {err}"))
            })?;

        let (applied, session) = self.store.transition(user, |session| {
            if session.search_seq != ticket {
                return Ok(SearchApply::Superseded);
            }
            Ok(match outcome {
                Ok(results) => SearchApply::Replaced(session.replace_results(query, results)),
                Err(err) => SearchApply::Reverted(session.reset(), err),
            })
        })?;

        match applied {
            SearchApply::Replaced(previous) => {
                self.cancel_download(user, previous);
                info!(
                    user = %user,
                    query,
                    results = session.results.len(),
                    "search results stored"
                );
                Ok(Transition::current(session))
            }
            SearchApply::Reverted(previous, err) => {
                self.cancel_download(user, previous);
                warn!(user = %user, query, error = %err, "search failed; session reset");
                Err(err.into())
            }
            SearchApply::Superseded => {
                debug!(user = %user, query, ticket, "search superseded by a newer request");
                Ok(Transition::current(session))
            }
        }
    }

    async fn back_to_search(&self, user: &UserId) -> DispatchResult<Transition> {
        let session = self.store.get(user);
        if session.state == SessionState::Idle || session.last_query.is_empty() {
            return Err(ValidationError::NothingToGoBackTo.into());
        }
        self.search(user, &session.last_query).await
    }

    fn select(&self, user: &UserId, index: usize) -> DispatchResult<Transition> {
        let ((), session) = self.store.transition(user, |session| {
            if session.state != SessionState::ShowingResults {
                return Err(inactive("results", session.state));
            }
            if index >= session.results.len() {
                return Err(ValidationError::IndexOutOfRange {
                    index,
                    len: session.results.len(),
                }
                .into());
            }
            session.selected_index = Some(index);
            session.state = SessionState::ShowingQuality;
            Ok(())
        })?;
        info!(user = %user, index, "result selected");
        Ok(Transition::current(session))
    }

    fn pick_quality(
        &self,
        user: &UserId,
        external_id: &str,
        quality: Quality,
    ) -> DispatchResult<Transition> {
        let ((previous, token), session) = self.store.transition(user, |session| {
            // A repeat pick while preparing restarts under a new generation.
            if !matches!(
                session.state,
                SessionState::ShowingQuality | SessionState::Downloading
            ) {
                return Err(inactive("quality", session.state));
            }
            let selected = session.selected().ok_or(StaleReference::SelectionChanged)?;
            if selected.external_id != external_id {
                return Err(StaleReference::SelectionChanged.into());
            }
            let token = DownloadToken::mint();
            session.selected_quality = Some(quality);
            session.delivery = None;
            let previous = session.active_download.replace(token);
            session.state = SessionState::Downloading;
            Ok((previous, token))
        })?;

        self.cancel_download(user, previous);
        self.simulator.start(user.clone(), token, quality);
        Ok(Transition::current(session))
    }

    fn cancel_download(&self, user: &UserId, token: Option<DownloadToken>) {
        if let Some(token) = token {
            let running = self.simulator.cancel_token(&token);
            debug!(user = %user, token = %token, running, "download generation retired");
        }
    }
}

fn inactive(expected: &'static str, actual: SessionState) -> DispatchError {
    StaleReference::InactiveButton {
        expected,
        actual: actual.to_string(),
    }
    .into()
}
