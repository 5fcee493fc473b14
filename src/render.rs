use crate::codec::Action;
use crate::model::{Quality, Session, SessionState};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ButtonKind {
    /// Callback button carrying an encoded [`Action`] token.
    Action(String),
    ExternalLink(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Button {
    pub label: String,
    pub kind: ButtonKind,
}

impl Button {
    pub fn action(label: impl Into<String>, action: &Action) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Action(action.encode()),
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::ExternalLink(url.into()),
        }
    }

    /// Token carried by a callback button.
    pub fn token(&self) -> Option<&str> {
        match &self.kind {
            ButtonKind::Action(token) => Some(token),
            ButtonKind::ExternalLink(_) => None,
        }
    }
}

/// Transport-neutral description of the next message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct OutboundPayload {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl OutboundPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// All buttons in row-major order.
    pub fn flat_buttons(&self) -> impl Iterator<Item = &Button> {
        self.buttons.iter().flatten()
    }
}

/// Maps session state to payloads. Never mutates the session and never calls
/// out to the search backend or the simulator.
#[derive(Clone, Debug)]
pub struct Renderer {
    bot_name: String,
    version: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new("Movie Download Bot", "2.0")
    }
}

impl Renderer {
    pub fn new(bot_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            version: version.into(),
        }
    }

    /// One rendering rule per state.
    pub fn render(&self, session: &Session) -> OutboundPayload {
        match session.state {
            SessionState::Idle => self.welcome(),
            SessionState::ShowingResults => self.results(session),
            SessionState::ShowingQuality => self.quality_picker(session),
            SessionState::Downloading => self.downloading(session),
            SessionState::DownloadReady => self.download_ready(session),
        }
    }

    pub fn welcome(&self) -> OutboundPayload {
        OutboundPayload {
            text: format!(
                "🎬 Welcome to {} 🎬\n\n\
                 I can help you search and download movies/series.\n\n\
                 How to use:\n\
                 1. Send me a movie/series name\n\
                 2. Choose from search results\n\
                 3. Select quality\n\
                 4. Download your file\n\n\
                 ⚠️ Only for educational purposes",
                self.bot_name
            ),
            buttons: vec![home_row()],
        }
    }

    /// Help text; keeps the buttons of the current step so the flow can continue.
    pub fn help(&self, session: &Session) -> OutboundPayload {
        let text = "📖 Help Guide\n\n\
                    Commands:\n\
                    /start - Start the bot\n\
                    /search <movie name> - Search for movies\n\
                    /help - Show this help message\n\
                    /about - About this bot\n\n\
                    You can also send a movie name directly, pick a result, \
                    then choose a quality (480p, 720p, 1080p).";
        self.with_text(session, text)
    }

    pub fn about(&self, session: &Session) -> OutboundPayload {
        let text = format!(
            "ℹ️ About This Bot\n\n\
             🤖 {}\n\
             Version: {}\n\n\
             📜 Disclaimer:\n\
             This bot is for educational purposes only.\n\
             Respect copyright laws in your country.",
            self.bot_name, self.version
        );
        self.with_text(session, text)
    }

    /// Error or notice text on top of the current step's buttons.
    pub fn notice(&self, session: &Session, message: impl Into<String>) -> OutboundPayload {
        self.with_text(session, message)
    }

    fn with_text(&self, session: &Session, text: impl Into<String>) -> OutboundPayload {
        OutboundPayload {
            text: text.into(),
            buttons: self.render(session).buttons,
        }
    }

    fn results(&self, session: &Session) -> OutboundPayload {
        if session.results.is_empty() {
            return OutboundPayload {
                text: format!(
                    "😕 No matches for: {}\n\nCheck the spelling or send another title.",
                    session.last_query
                ),
                buttons: vec![vec![Button::action("🔁 Try again", &Action::BackToSearch)]],
            };
        }

        let buttons = session
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                vec![Button::action(
                    format!("🎬 {} ({})", result.title, result.year),
                    &Action::Select(index),
                )]
            })
            .collect();
        OutboundPayload {
            text: format!(
                "🔍 Search results for: {}\n\nSelect a movie:",
                session.last_query
            ),
            buttons,
        }
    }

    fn quality_picker(&self, session: &Session) -> OutboundPayload {
        let Some(selected) = session.selected() else {
            warn!(user = %session.user_id, "quality step without a selection");
            return self.results(session);
        };
        let quality_button = |label: &str, quality: Quality| {
            Button::action(
                format!("{label} {quality}"),
                &Action::Quality {
                    external_id: selected.external_id.clone(),
                    quality,
                },
            )
        };
        OutboundPayload {
            text: format!(
                "🎬 {}\n\n📅 Year: {}\n🎭 Type: {}\n\nSelect download quality:",
                selected.title,
                selected.year,
                selected.media_type.label()
            ),
            buttons: vec![
                vec![
                    quality_button("📹", Quality::P480),
                    quality_button("🎥", Quality::P720),
                ],
                vec![
                    quality_button("🎬", Quality::P1080),
                    Button::action("🔙 Back", &Action::BackToSearch),
                ],
            ],
        }
    }

    fn downloading(&self, session: &Session) -> OutboundPayload {
        let quality = session
            .selected_quality
            .map(|q| q.to_string())
            .unwrap_or_else(|| "the selected quality".to_string());
        OutboundPayload::text(format!(
            "⏬ Preparing in {quality}...\n\nPlease wait, this may take a few minutes."
        ))
    }

    fn download_ready(&self, session: &Session) -> OutboundPayload {
        let Some(delivery) = &session.delivery else {
            warn!(user = %session.user_id, "ready step without delivery metadata");
            return self.downloading(session);
        };
        OutboundPayload {
            text: format!(
                "✅ Download Ready!\n\n\
                 🎬 Quality: {}\n\
                 📦 File Size: {}\n\
                 ⏱️ Duration: {}\n\n\
                 Click the button below to download:",
                delivery.quality, delivery.size_estimate, delivery.duration_estimate
            ),
            buttons: vec![
                vec![Button::link("📥 Download Now", &delivery.delivery_url)],
                vec![Button::action("🔍 Search Again", &Action::BackToSearch)],
            ],
        }
    }
}

fn home_row() -> Vec<Button> {
    vec![
        Button::action("📖 Help", &Action::Help),
        Button::action("ℹ️ About", &Action::About),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DownloadResult, MediaType, SearchResult, UserId};

    fn session_with_results(n: usize) -> Session {
        let mut session = Session::new(UserId::new("r"));
        let results = (0..n)
            .map(|i| SearchResult {
                title: format!("Title {i}"),
                year: "2021-2023".into(),
                external_id: format!("tt{i:07}"),
                media_type: MediaType::Series,
            })
            .collect();
        session.replace_results("Title", results);
        session
    }

    #[test]
    fn idle_offers_help_and_about() {
        let payload = Renderer::default().render(&Session::new(UserId::new("i")));
        let tokens: Vec<_> = payload.flat_buttons().filter_map(Button::token).collect();
        assert_eq!(tokens, ["help", "about"]);
    }

    #[test]
    fn results_get_one_select_button_each() {
        let payload = Renderer::default().render(&session_with_results(2));
        assert!(payload.text.contains("Title"));
        assert_eq!(payload.buttons.len(), 2);
        assert_eq!(payload.buttons[1][0].label, "🎬 Title 1 (2021-2023)");
        assert_eq!(payload.buttons[1][0].token(), Some("select:1"));
    }

    #[test]
    fn empty_results_render_no_matches_with_retry() {
        let payload = Renderer::default().render(&session_with_results(0));
        assert!(payload.text.contains("No matches"));
        let tokens: Vec<_> = payload.flat_buttons().filter_map(Button::token).collect();
        assert_eq!(tokens, ["back_to_search"]);
    }

    #[test]
    fn quality_picker_carries_selected_id() {
        let mut session = session_with_results(3);
        session.selected_index = Some(2);
        session.state = SessionState::ShowingQuality;
        let payload = Renderer::default().render(&session);
        assert!(payload.text.contains("Type: Series"));
        let tokens: Vec<_> = payload.flat_buttons().filter_map(Button::token).collect();
        assert_eq!(
            tokens,
            [
                "quality:tt0000002:480",
                "quality:tt0000002:720",
                "quality:tt0000002:1080",
                "back_to_search"
            ]
        );
    }

    #[test]
    fn ready_links_to_delivery_url() {
        let mut session = session_with_results(1);
        session.selected_index = Some(0);
        session.selected_quality = Some(Quality::P720);
        session.delivery = Some(DownloadResult {
            quality: Quality::P720,
            size_estimate: "~1.5GB".into(),
            duration_estimate: "2h 15m".into(),
            delivery_url: "https://cdn.test/720".into(),
        });
        session.state = SessionState::DownloadReady;
        let payload = Renderer::default().render(&session);
        assert!(payload.text.contains("Quality: 720p"));
        assert_eq!(
            payload.buttons[0][0].kind,
            ButtonKind::ExternalLink("https://cdn.test/720".into())
        );
        assert_eq!(payload.buttons[1][0].token(), Some("back_to_search"));
    }

    #[test]
    fn downloading_has_no_buttons() {
        let mut session = session_with_results(1);
        session.selected_index = Some(0);
        session.selected_quality = Some(Quality::P480);
        session.state = SessionState::Downloading;
        let payload = Renderer::default().render(&session);
        assert!(payload.text.contains("480p"));
        assert!(payload.buttons.is_empty());
    }
}
