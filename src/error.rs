use crate::model::Quality;
use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Callback token that does not match the button grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown token tag `{0}`")]
    UnknownTag(String),
    #[error("malformed argument for `{tag}`: {reason}")]
    MalformedArgument { tag: &'static str, reason: String },
}

/// Input that can never be valid for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("query must be at least {min} characters")]
    QueryTooShort { min: usize },
    #[error("query is empty")]
    EmptyQuery,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("index {index} is out of range for {len} results")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no previous search to return to")]
    NothingToGoBackTo,
}

/// Button that referred to session contents which have since changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleReference {
    #[error("button belongs to the {expected} step but the session is at {actual}")]
    InactiveButton {
        expected: &'static str,
        actual: String,
    },
    #[error("selected title changed since the button was rendered")]
    SelectionChanged,
    #[error("download generation was superseded")]
    SupersededDownload,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),
    #[error("search backend rejected query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("download cancelled")]
    Cancelled,
    #[error("no delivery profile configured for {0}")]
    QualityUnavailable(Quality),
    #[error("download interrupted: {0}")]
    Interrupted(String),
}

/// Everything a dispatcher transition can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Stale(#[from] StaleReference),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// The single place where failures become chat text.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::Decode(_) | DispatchError::Stale(_) => {
                "❌ Invalid selection. Please try again.".to_string()
            }
            DispatchError::Validation(err) => match err {
                ValidationError::QueryTooShort { .. } => {
                    "❌ Please enter a longer movie name.".to_string()
                }
                ValidationError::EmptyQuery => {
                    "Please provide a movie name. Example: /search Avengers".to_string()
                }
                ValidationError::UnknownCommand(name) => {
                    format!("❌ Unknown command /{name}. Send /help for the list of commands.")
                }
                ValidationError::IndexOutOfRange { .. } => {
                    "❌ Invalid selection. Please try again.".to_string()
                }
                ValidationError::NothingToGoBackTo => {
                    "❌ Nothing to go back to. Send me a movie name to search.".to_string()
                }
            },
            DispatchError::Provider(_) => "❌ Search failed. Please try again.".to_string(),
            DispatchError::Simulator(_) => {
                "❌ Download failed. Please try again later.".to_string()
            }
            DispatchError::Internal(_) => {
                "❌ An unexpected error occurred. Please try again.".to_string()
            }
        }
    }

    /// True for errors caused by a button that no longer matches the session.
    pub fn is_stale(&self) -> bool {
        matches!(self, DispatchError::Stale(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_and_validation_share_user_text() {
        let stale: DispatchError = StaleReference::SelectionChanged.into();
        let bounds: DispatchError = ValidationError::IndexOutOfRange { index: 5, len: 3 }.into();
        assert_eq!(stale.user_message(), bounds.user_message());
        assert!(stale.is_stale());
        assert!(!bounds.is_stale());
    }
}
