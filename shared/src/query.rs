//! Read-only queries against a stored run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SharedError;
use crate::types::{NetworkFailure, RunRecord};

/// Projection requested from a stored run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    FullTelemetry,
    NetworkByStatus,
    NetworkRequestFull,
    ConsoleErrors,
    BackendLogs,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::FullTelemetry => "full_telemetry",
            QueryKind::NetworkByStatus => "network_by_status",
            QueryKind::NetworkRequestFull => "network_request_full",
            QueryKind::ConsoleErrors => "console_errors",
            QueryKind::BackendLogs => "backend_logs",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full_telemetry" => Ok(QueryKind::FullTelemetry),
            "network_by_status" => Ok(QueryKind::NetworkByStatus),
            "network_request_full" => Ok(QueryKind::NetworkRequestFull),
            "console_errors" => Ok(QueryKind::ConsoleErrors),
            "backend_logs" => Ok(QueryKind::BackendLogs),
            other => Err(SharedError::UnknownQueryKind {
                input: other.to_string(),
            }),
        }
    }
}

/// Which backend log levels a `backend_logs` query keeps
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelSelection {
    /// Raw lines, no level filter
    Full,
    /// Lines containing at least one of these tokens
    Levels(Vec<String>),
}

impl LevelSelection {
    /// Split a comma separated list into trimmed, non-empty level tokens
    pub fn parse_levels(s: &str) -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl FromStr for LevelSelection {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("full") {
            Ok(LevelSelection::Full)
        } else {
            Ok(LevelSelection::Levels(Self::parse_levels(s)))
        }
    }
}

/// Caller-specified read against exactly one stored run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryQuery {
    pub kind: QueryKind,
    /// `network_by_status`: keep only this status
    pub status: Option<u16>,
    /// `network_request_full`: first failure with this exact URL
    pub request_url: Option<String>,
    /// Body budget for network projections
    pub truncate_body_chars: Option<usize>,
    /// `backend_logs`: level filter override
    pub backend_log_levels: Option<LevelSelection>,
}

impl TelemetryQuery {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            status: None,
            request_url: None,
            truncate_body_chars: None,
            backend_log_levels: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_request_url(mut self, url: impl Into<String>) -> Self {
        self.request_url = Some(url.into());
        self
    }

    pub fn with_truncation(mut self, max_chars: usize) -> Self {
        self.truncate_body_chars = Some(max_chars);
        self
    }

    pub fn with_levels(mut self, levels: LevelSelection) -> Self {
        self.backend_log_levels = Some(levels);
        self
    }
}

/// Projection returned by a query; serializes to the bare projected shape
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    Full(Box<RunRecord>),
    Network { network_failures: Vec<NetworkFailure> },
    Request(Option<NetworkFailure>),
    Console { console_errors: Vec<String> },
    Backend { backend_logs: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_kind_round_trips_through_text() {
        for kind in [
            QueryKind::FullTelemetry,
            QueryKind::NetworkByStatus,
            QueryKind::NetworkRequestFull,
            QueryKind::ConsoleErrors,
            QueryKind::BackendLogs,
        ] {
            assert_eq!(kind.as_str().parse::<QueryKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_query_kind_is_rejected() {
        let err = "dom_tree".parse::<QueryKind>().unwrap_err();
        assert!(err.to_string().contains("dom_tree"));
    }

    #[test]
    fn test_level_selection_parsing() {
        assert_eq!("full".parse::<LevelSelection>().unwrap(), LevelSelection::Full);
        assert_eq!(
            " WARN, ,ERROR ".parse::<LevelSelection>().unwrap(),
            LevelSelection::Levels(vec!["WARN".to_string(), "ERROR".to_string()])
        );
    }

    #[test]
    fn test_missing_request_serializes_as_null() {
        let data = QueryData::Request(None);
        assert_eq!(serde_json::to_string(&data).unwrap(), "null");
    }
}
