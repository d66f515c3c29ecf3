//! Extraction of compiled-artifact positions from error messages

use std::sync::OnceLock;

use regex::Regex;

const POSITION_PATTERN: &str = r"(?:\s|^)([^\s]+\.(?:js|ts|jsx|tsx|mjs|cjs)):(\d+)(?::(\d+))?";

/// A `file:line[:column]` reference found in an error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPosition {
    pub artifact: String,
    /// 1-based
    pub line: u32,
    /// 0-based; defaults to 0 when the message omits it
    pub column: u32,
}

fn position_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(POSITION_PATTERN).ok()).as_ref()
}

/// First recognisable artifact position in `message`
pub fn find_artifact_position(message: &str) -> Option<ArtifactPosition> {
    let captures = position_regex()?.captures(message)?;
    let artifact = captures.get(1)?.as_str().to_string();
    let line = captures.get(2)?.as_str().parse().ok()?;
    let column = captures
        .get(3)
        .and_then(|column| column.as_str().parse().ok())
        .unwrap_or(0);
    Some(ArtifactPosition { artifact, line, column })
}

/// Reduce a URL artifact to its path, relative to the source-map root
pub fn artifact_relative_path(artifact: &str) -> &str {
    let path = match artifact.find("://") {
        Some(scheme_end) => {
            let rest = &artifact[scheme_end + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => artifact,
    };
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_start_matches('/')
}
