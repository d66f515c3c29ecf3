//! Tests for SourceMapFiles

use tempfile::TempDir;

use crate::services::source_map::SourceMapFiles;
use crate::traits::SourceMapResolver;

/// One mapping per line: generated line 1 -> src/foo.ts:1, line 2 -> src/foo.ts:2
const MINIMAL_MAP: &str = r#"{
    "version": 3,
    "sources": ["src/foo.ts"],
    "names": [],
    "mappings": "AAAA;AACA",
    "file": "bundle.js"
}"#;

fn map_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bundle.js.map"), MINIMAL_MAP).unwrap();
    dir
}

#[tokio::test]
async fn test_missing_map_resolves_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = SourceMapFiles::new(dir.path());
    assert!(resolver.resolve("nonexistent.js", 1, 0).await.is_none());
}

#[tokio::test]
async fn test_resolves_lines_through_map() {
    let dir = map_dir();
    let resolver = SourceMapFiles::new(dir.path());

    let first = resolver.resolve("bundle.js", 1, 0).await.unwrap();
    assert_eq!(first.source, "src/foo.ts");
    assert_eq!((first.line, first.column), (1, 0));

    let second = resolver.resolve("bundle.js", 2, 15).await.unwrap();
    assert_eq!((second.line, second.column), (2, 0));

    assert!(resolver.resolve("bundle.js", 3, 0).await.is_none());
}

#[tokio::test]
async fn test_url_artifact_maps_to_relative_file() {
    let dir = map_dir();
    let resolver = SourceMapFiles::new(dir.path());
    let position = resolver
        .resolve("http://localhost:5173/bundle.js", 1, 0)
        .await
        .unwrap();
    assert_eq!(position.source, "src/foo.ts");
}

#[tokio::test]
async fn test_invalid_map_resolves_to_none() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.js.map"), "{ not json").unwrap();
    let resolver = SourceMapFiles::new(dir.path());
    assert!(resolver.resolve("broken.js", 1, 0).await.is_none());
}
