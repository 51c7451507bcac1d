//! Structured logging and secret redaction utilities.
//!
//! Sets up `tracing-subscriber` and keeps upstream API keys out of log
//! sinks.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::{Result, ServiceError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. `logging.format = "json"` selects
/// one JSON object per line; anything else gets the pretty formatter.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ServiceError::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().pretty().with_target(false)).try_init()
    };

    installed.map_err(|e| ServiceError::Internal(format!("Log subscriber already installed: {}", e)))
}

/// Redacts API keys from text that may end up in a log line.
///
/// Covers OpenAI-style secret keys (`sk-...`) and the value following a
/// `Bearer ` prefix, wherever they appear.
pub fn sanitize(input: &str) -> String {
    let mut result = input.to_string();

    for (marker, replacement, keep_marker) in [
        ("Bearer ", "[REDACTED_TOKEN]", true),
        ("sk-", "[REDACTED_API_KEY]", false),
    ] {
        let mut search_from = 0;
        while let Some(pos) = result[search_from..].find(marker) {
            let found = search_from + pos;
            // Only match at a word boundary ("task-1" is not a key)
            if result[..found].chars().next_back().is_some_and(|c| c.is_alphanumeric()) {
                search_from = found + marker.len();
                continue;
            }
            let start = found + if keep_marker { marker.len() } else { 0 };
            let end = result[start..]
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
                .map(|i| start + i)
                .unwrap_or(result.len());
            result.replace_range(start..end, replacement);
            search_from = start + replacement.len();
        }
    }

    result
}

/// First `max_chars` characters of `input`, for previews in debug logs.
pub fn preview(input: &str, max_chars: usize) -> String {
    let mut out: String = input.chars().take(max_chars).collect();
    if input.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_api_key() {
        let input = r#"{"error":"invalid key sk-proj-abc123XYZ provided"}"#;
        let output = sanitize(input);
        assert!(output.contains("[REDACTED_API_KEY]"));
        assert!(!output.contains("abc123XYZ"));
    }

    #[test]
    fn test_sanitize_bearer_token() {
        let output = sanitize("Authorization: Bearer abc.def.ghi");
        assert_eq!(output, "Authorization: Bearer [REDACTED_TOKEN]");
    }

    #[test]
    fn test_sanitize_multiple_occurrences() {
        let output = sanitize("sk-one and sk-two");
        assert_eq!(output, "[REDACTED_API_KEY] and [REDACTED_API_KEY]");
    }

    #[test]
    fn test_sanitize_ignores_words_containing_marker() {
        assert_eq!(sanitize("task-42 failed"), "task-42 failed");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo world", 5), "héllo…");
        assert_eq!(preview("short", 10), "short");
    }
}
