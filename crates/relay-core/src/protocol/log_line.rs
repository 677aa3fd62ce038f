//! Operator log line formatting.
//!
//! Every line an admin receives has the shape:
//!
//! ```text
//! [2026-10-18T09:15:02.113Z][CONN][1001] device connected from 10.0.0.7:50122 (tcp)
//! ```

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats `message` with the current UTC time.
pub fn format_log_line(message: &impl Display) -> String {
    format_log_line_at(Utc::now(), message)
}

/// Formats `message` with an explicit timestamp.
pub fn format_log_line_at(at: DateTime<Utc>, message: &impl Display) -> String {
    format!("[{}]{message}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_log_line_at_fixed_time() {
        // Arrange
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 2).unwrap();

        // Act
        let line = format_log_line_at(at, &"[START] ready");

        // Assert
        assert_eq!(line, "[2026-10-18T09:15:02.000Z][START] ready");
    }

    #[test]
    fn test_format_log_line_starts_with_bracketed_timestamp() {
        let line = format_log_line(&"x");
        assert!(line.starts_with('['));
        assert!(line.ends_with("Z]x"));
    }
}
