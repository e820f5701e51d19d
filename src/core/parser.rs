//! Frame parsing for `label:score` device lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One parsed `(label, score)` observation from the device.
///
/// `label` is never empty and `score` is always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub label: String,
    pub score: f64,
}

impl Reading {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A data line that could not be turned into a [`Reading`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected a single ':' separator in {line:?}")]
    MalformedLine { line: String },

    #[error("empty label in {line:?}")]
    EmptyLabel { line: String },

    #[error("score {value:?} for label {label:?} is not a number")]
    InvalidScore { label: String, value: String },

    #[error("score {value:?} for label {label:?} is not finite")]
    NonFiniteScore { label: String, value: String },
}

/// Parse one raw device line.
///
/// Blank lines and lines without a `:` are device chatter and yield
/// `Ok(None)`. Lines that look like data but are broken yield a
/// [`ParseError`] so the caller can report them.
pub fn parse_line(raw: &str) -> Result<Option<Reading>, ParseError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some((label, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if value.contains(':') {
        return Err(ParseError::MalformedLine {
            line: line.to_string(),
        });
    }

    let label = label.trim();
    let value = value.trim();
    if label.is_empty() {
        return Err(ParseError::EmptyLabel {
            line: line.to_string(),
        });
    }

    let score: f64 = value.parse().map_err(|_| ParseError::InvalidScore {
        label: label.to_string(),
        value: value.to_string(),
    })?;
    if !score.is_finite() {
        return Err(ParseError::NonFiniteScore {
            label: label.to_string(),
            value: value.to_string(),
        });
    }

    Ok(Some(Reading::new(label, score)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        assert_eq!(parse_line("cat:0.9"), Ok(Some(Reading::new("cat", 0.9))));
        assert_eq!(
            parse_line("  dog : 0.25 \r"),
            Ok(Some(Reading::new("dog", 0.25)))
        );
    }

    #[test]
    fn test_blank_and_chatter_lines_are_skipped() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \t"), Ok(None));
        assert_eq!(parse_line("label_without_colon"), Ok(None));
        assert_eq!(parse_line("Starting inferencing in 2 seconds..."), Ok(None));
    }

    #[test]
    fn test_invalid_score() {
        let err = parse_line("label:not_a_number").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidScore {
                label: "label".into(),
                value: "not_a_number".into()
            }
        );
    }

    #[test]
    fn test_non_finite_score() {
        assert!(matches!(
            parse_line("x:inf"),
            Err(ParseError::NonFiniteScore { .. })
        ));
        assert!(matches!(
            parse_line("x:NaN"),
            Err(ParseError::NonFiniteScore { .. })
        ));
    }

    #[test]
    fn test_multiple_separators() {
        assert!(matches!(
            parse_line("a:b:0.5"),
            Err(ParseError::MalformedLine { .. })
        ));
    }

    #[test]
    fn test_empty_label() {
        assert!(matches!(
            parse_line(":0.5"),
            Err(ParseError::EmptyLabel { .. })
        ));
    }

    #[test]
    fn test_anomaly_is_parsed_like_any_label() {
        assert_eq!(
            parse_line("anomaly:-1.5"),
            Ok(Some(Reading::new("anomaly", -1.5)))
        );
    }
}
