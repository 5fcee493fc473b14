//! Button token grammar.
//!
//! Tokens are ASCII and `:` delimited. Arguments are digits or alphanumeric
//! provider ids, so no escaping is needed:
//!
//! ```text
//! help | about | back_to_search
//! select:<index>
//! quality:<external_id>:<480|720|1080>
//! ```

use crate::error::DecodeError;
use crate::model::Quality;
use std::fmt;
use std::str::FromStr;

const TAG_HELP: &str = "help";
const TAG_ABOUT: &str = "about";
const TAG_BACK: &str = "back_to_search";
const TAG_SELECT: &str = "select";
const TAG_QUALITY: &str = "quality";

/// Decoded user intent carried by a button.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Help,
    About,
    BackToSearch,
    Select(usize),
    Quality {
        external_id: String,
        quality: Quality,
    },
}

impl Action {
    /// Renders the token carried by a button.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses a callback token. Anything that is not an exact match is rejected.
    pub fn decode(token: &str) -> Result<Self, DecodeError> {
        let mut parts = token.split(':');
        let tag = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match tag {
            TAG_HELP => no_args(TAG_HELP, &args).map(|_| Action::Help),
            TAG_ABOUT => no_args(TAG_ABOUT, &args).map(|_| Action::About),
            TAG_BACK => no_args(TAG_BACK, &args).map(|_| Action::BackToSearch),
            TAG_SELECT => {
                let [index] = args.as_slice() else {
                    return Err(arity(TAG_SELECT, 1, args.len()));
                };
                parse_index(index).map(Action::Select)
            }
            TAG_QUALITY => {
                let [external_id, quality] = args.as_slice() else {
                    return Err(arity(TAG_QUALITY, 2, args.len()));
                };
                if external_id.is_empty()
                    || !external_id.bytes().all(|b| b.is_ascii_alphanumeric())
                {
                    return Err(DecodeError::MalformedArgument {
                        tag: TAG_QUALITY,
                        reason: format!("external id `{external_id}` is not alphanumeric"),
                    });
                }
                let quality =
                    Quality::from_digits(quality).ok_or_else(|| DecodeError::MalformedArgument {
                        tag: TAG_QUALITY,
                        reason: format!("unsupported quality `{quality}`"),
                    })?;
                Ok(Action::Quality {
                    external_id: (*external_id).to_string(),
                    quality,
                })
            }
            other => Err(DecodeError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Help => f.write_str(TAG_HELP),
            Action::About => f.write_str(TAG_ABOUT),
            Action::BackToSearch => f.write_str(TAG_BACK),
            Action::Select(index) => write!(f, "{TAG_SELECT}:{index}"),
            Action::Quality {
                external_id,
                quality,
            } => write!(f, "{TAG_QUALITY}:{external_id}:{}", quality.as_digits()),
        }
    }
}

impl FromStr for Action {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::decode(s)
    }
}

fn no_args(tag: &'static str, args: &[&str]) -> Result<(), DecodeError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(arity(tag, 0, args.len()))
    }
}

fn arity(tag: &'static str, expected: usize, got: usize) -> DecodeError {
    DecodeError::MalformedArgument {
        tag,
        reason: format!("expected {expected} argument(s), got {got}"),
    }
}

fn parse_index(raw: &str) -> Result<usize, DecodeError> {
    // `usize::from_str` accepts a leading `+`; the grammar does not.
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::MalformedArgument {
            tag: TAG_SELECT,
            reason: format!("`{raw}` is not a base-10 index"),
        });
    }
    raw.parse().map_err(|_| DecodeError::MalformedArgument {
        tag: TAG_SELECT,
        reason: format!("index `{raw}` overflows"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_shape() {
        assert_eq!(Action::decode("help"), Ok(Action::Help));
        assert_eq!(Action::decode("about"), Ok(Action::About));
        assert_eq!(Action::decode("back_to_search"), Ok(Action::BackToSearch));
        assert_eq!(Action::decode("select:12"), Ok(Action::Select(12)));
        assert_eq!(
            Action::decode("quality:tt1234567:1080"),
            Ok(Action::Quality {
                external_id: "tt1234567".into(),
                quality: Quality::P1080,
            })
        );
    }

    #[test]
    fn rejects_partial_matches() {
        for token in [
            "",
            "helpme",
            "help:",
            "select",
            "select:",
            "select:+1",
            "select:-1",
            "select:1:2",
            "select_1",
            "quality:tt1:720p",
            "quality:tt1:360",
            "quality::720",
            "quality:tt-1:720",
            "quality:tt1",
            "quality:tt1:720:x",
        ] {
            assert!(Action::decode(token).is_err(), "{token} should be rejected");
        }
    }

    #[test]
    fn classifies_errors() {
        assert_eq!(
            Action::decode("download:1"),
            Err(DecodeError::UnknownTag("download".into()))
        );
        assert!(matches!(
            Action::decode("select:abc"),
            Err(DecodeError::MalformedArgument { tag: "select", .. })
        ));
        assert!(matches!(
            Action::decode("select:99999999999999999999999"),
            Err(DecodeError::MalformedArgument { tag: "select", .. })
        ));
    }
}
