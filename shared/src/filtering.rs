//! Filtering and truncation policy
//!
//! Pure, stateless reductions from raw telemetry to a caller-budgeted subset.
//! The same functions serve summaries built at execution time and query
//! results reduced after the fact.

use crate::types::NetworkFailure;

/// Default body budget in characters
pub const DEFAULT_TRUNCATE_CHARS: usize = 500;

/// Default backend log levels kept in summaries
pub const DEFAULT_BACKEND_LOG_LEVELS: [&str; 2] = ["WARN", "ERROR"];

/// Marker appended to a truncated body
pub const ELLIPSIS: char = '…';

pub fn default_backend_log_levels() -> Vec<String> {
    DEFAULT_BACKEND_LOG_LEVELS.iter().map(|level| level.to_string()).collect()
}

/// Cut `body` to `max_chars` characters plus a single ellipsis.
///
/// Absent or empty input yields `None`, never an empty string.
pub fn truncate_body(body: Option<&str>, max_chars: usize) -> Option<String> {
    let body = body.filter(|b| !b.is_empty())?;
    match body.char_indices().nth(max_chars) {
        None => Some(body.to_string()),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + ELLIPSIS.len_utf8());
            truncated.push_str(&body[..cut]);
            truncated.push(ELLIPSIS);
            Some(truncated)
        }
    }
}

/// Truncate the body of each failure independently, keeping every entry
pub fn truncate_network_bodies(failures: &[NetworkFailure], max_chars: usize) -> Vec<NetworkFailure> {
    failures
        .iter()
        .map(|failure| truncate_failure(failure, max_chars))
        .collect()
}

pub fn truncate_failure(failure: &NetworkFailure, max_chars: usize) -> NetworkFailure {
    NetworkFailure {
        response_body: truncate_body(failure.response_body.as_deref(), max_chars),
        ..failure.clone()
    }
}

/// Keep failures with no status or status >= 400, in order, bodies truncated
pub fn filter_network_for_summary(failures: &[NetworkFailure], max_chars: usize) -> Vec<NetworkFailure> {
    failures
        .iter()
        .filter(|failure| failure.status.map_or(true, |status| status >= 400))
        .map(|failure| truncate_failure(failure, max_chars))
        .collect()
}

/// Keep lines containing at least one level token (case-sensitive).
///
/// An empty level set is an explicit opt-out and yields nothing.
pub fn filter_backend_logs_by_level<S: AsRef<str>>(lines: &[String], levels: &[S]) -> Vec<String> {
    if levels.is_empty() {
        return Vec::new();
    }
    lines
        .iter()
        .filter(|line| levels.iter().any(|level| line.contains(level.as_ref())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(url: &str, status: Option<u16>, body: Option<&str>) -> NetworkFailure {
        NetworkFailure {
            url: url.to_string(),
            method: "GET".to_string(),
            status,
            response_body: body.map(str::to_string),
        }
    }

    #[test]
    fn test_truncate_within_budget_is_unchanged() {
        assert_eq!(truncate_body(Some("short"), 5).as_deref(), Some("short"));
        assert_eq!(truncate_body(Some("short"), 500).as_deref(), Some("short"));
    }

    #[test]
    fn test_truncate_over_budget_appends_single_marker() {
        let long = "x".repeat(600);
        for (body, max) in [("abcdefghij", 3usize), (long.as_str(), 500), ("ab", 0)] {
            let out = truncate_body(Some(body), max).unwrap();
            assert_eq!(out.chars().count(), max + 1);
            assert!(out.ends_with(ELLIPSIS));
            assert!(body.starts_with(out.trim_end_matches(ELLIPSIS)));
        }
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let out = truncate_body(Some("ñandú über"), 4).unwrap();
        assert_eq!(out, "ñand…");
    }

    #[test]
    fn test_truncate_absent_or_empty_is_absent() {
        assert_eq!(truncate_body(None, 10), None);
        assert_eq!(truncate_body(Some(""), 10), None);
    }

    #[test]
    fn test_summary_filter_keeps_failures_in_order() {
        let input = vec![
            failure("https://a", Some(404), Some("not found")),
            failure("https://b", Some(200), Some("fine")),
            failure("https://c", None, Some("net::ERR_CONNECTION_REFUSED")),
            failure("https://d", Some(302), None),
            failure("https://e", Some(500), Some("0123456789")),
        ];
        let out = filter_network_for_summary(&input, 4);
        let urls: Vec<&str> = out.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://c", "https://e"]);
        assert!(out.iter().all(|f| f.status.map_or(true, |s| s >= 400)));
        assert_eq!(out[2].response_body.as_deref(), Some("0123…"));
    }

    #[test]
    fn test_empty_level_set_yields_nothing() {
        let lines = vec!["ERROR boom".to_string(), "WARN slow".to_string()];
        let none: [&str; 0] = [];
        assert!(filter_backend_logs_by_level(&lines, &none).is_empty());
    }

    #[test]
    fn test_level_filter_is_case_sensitive_substring() {
        let lines = vec![
            "2024 [ERROR] db down".to_string(),
            "2024 [error] lowercase".to_string(),
            "2024 [INFO] ok".to_string(),
            "2024 [WARN] slow".to_string(),
        ];
        let out = filter_backend_logs_by_level(&lines, &default_backend_log_levels());
        assert_eq!(out, vec!["2024 [ERROR] db down".to_string(), "2024 [WARN] slow".to_string()]);
    }
}
