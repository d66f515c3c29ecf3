//! Source map (v3) resolution from `<base>/<artifact>.map` files

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use shared::SourcePosition;
use tracing::debug;

use crate::core::artifact_relative_path;
use crate::traits::SourceMapResolver;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    source_root: Option<String>,
    mappings: String,
}

pub struct SourceMapFiles {
    base_path: PathBuf,
}

impl SourceMapFiles {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn map_path_for(&self, artifact: &str) -> PathBuf {
        self.base_path.join(format!("{}.map", artifact_relative_path(artifact)))
    }
}

#[async_trait]
impl SourceMapResolver for SourceMapFiles {
    async fn resolve(&self, artifact: &str, line: u32, column: u32) -> Option<SourcePosition> {
        let map_path = self.map_path_for(artifact);
        let raw = match tokio::fs::read_to_string(&map_path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %map_path.display(), error = %e, "No source map");
                return None;
            }
        };
        let map: RawSourceMap = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                debug!(path = %map_path.display(), error = %e, "Invalid source map");
                return None;
            }
        };
        original_position(&map, line, column)
    }
}

/// Greatest-lower-bound lookup of a 1-based line / 0-based column
fn original_position(map: &RawSourceMap, line: u32, column: u32) -> Option<SourcePosition> {
    let target = usize::try_from(line.checked_sub(1)?).ok()?;

    // Source index, original line and original column carry across lines
    let mut source_index: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut best: Option<(i64, i64, i64)> = None;

    for (generated_line, segments) in map.mappings.split(';').enumerate() {
        if generated_line > target {
            break;
        }
        let mut generated_column: i64 = 0;
        for segment in segments.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(segment)?;
            generated_column += fields[0];
            let covers = generated_line == target && generated_column <= i64::from(column);
            if fields.len() >= 4 {
                source_index += fields[1];
                original_line += fields[2];
                original_column += fields[3];
                if covers {
                    best = Some((source_index, original_line, original_column));
                }
            } else if covers {
                // An unmapped segment shadows earlier mappings on the line
                best = None;
            }
        }
    }

    let (source_index, original_line, original_column) = best?;
    let source = map.sources.get(usize::try_from(source_index).ok()?)?.clone()?;
    let source = match map.source_root.as_deref().filter(|root| !root.is_empty()) {
        Some(root) => Path::new(root).join(&source).to_string_lossy().into_owned(),
        None => source,
    };
    Some(SourcePosition {
        source,
        line: u32::try_from(original_line + 1).ok()?,
        column: u32::try_from(original_column).ok()?,
    })
}

fn base64_value(c: u8) -> Option<i64> {
    let value = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(i64::from(value))
}

/// Decode one base64-VLQ segment into its signed fields
fn decode_vlq(segment: &str) -> Option<Vec<i64>> {
    let mut fields = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0;
    for byte in segment.bytes() {
        let digit = base64_value(byte)?;
        value += (digit & 31) << shift;
        if digit & 32 != 0 {
            shift += 5;
            if shift > 60 {
                return None;
            }
        } else {
            let magnitude = value >> 1;
            fields.push(if value & 1 == 1 { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        }
    }
    (shift == 0 && !fields.is_empty()).then_some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vlq_signs_and_continuations() {
        assert_eq!(decode_vlq("AAAA"), Some(vec![0, 0, 0, 0]));
        assert_eq!(decode_vlq("AACA"), Some(vec![0, 0, 1, 0]));
        assert_eq!(decode_vlq("D"), Some(vec![-1]));
        // 16 needs a continuation digit
        assert_eq!(decode_vlq("gB"), Some(vec![16]));
        assert_eq!(decode_vlq("g"), None);
        assert_eq!(decode_vlq("!"), None);
    }

    #[test]
    fn test_lookup_uses_preceding_segment() {
        let map = RawSourceMap {
            sources: vec![Some("a.ts".to_string()), Some("b.ts".to_string())],
            source_root: Some("src".to_string()),
            // line 1: col 0 -> a.ts:1:0, col 10 -> b.ts:5:4
            mappings: "AAAA,UCII".to_string(),
        };
        let early = original_position(&map, 1, 3).unwrap();
        assert_eq!((early.source.as_str(), early.line, early.column), ("src/a.ts", 1, 0));
        let late = original_position(&map, 1, 40).unwrap();
        assert_eq!((late.source.as_str(), late.line, late.column), ("src/b.ts", 5, 4));
        assert!(original_position(&map, 2, 0).is_none());
        assert!(original_position(&map, 0, 0).is_none());
    }

    #[test]
    fn test_unmapped_segment_is_not_resolved() {
        let map = RawSourceMap {
            sources: vec![Some("a.ts".to_string())],
            source_root: None,
            // line 1: col 0 -> a.ts:1:0, col 5 unmapped, col 9 -> a.ts:2:0
            mappings: "AAAA,K,IACA".to_string(),
        };
        let mapped = original_position(&map, 1, 2).unwrap();
        assert_eq!((mapped.source.as_str(), mapped.line, mapped.column), ("a.ts", 1, 0));
        assert!(original_position(&map, 1, 7).is_none());
        let after = original_position(&map, 1, 12).unwrap();
        assert_eq!((after.source.as_str(), after.line, after.column), ("a.ts", 2, 0));
    }
}
