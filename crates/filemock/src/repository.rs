//! Mock repository: filesystem discovery of mock files and collections.
//!
//! Every resolution pass re-scans the base directory and re-reads collection
//! files from bytes, so mocks can be edited live without restarting the
//! server. Scan order is lexicographic by relative path, which makes the
//! resolver's tie-break deterministic across platforms.

use crate::descriptor::MockDescriptor;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::Path;
use tracing::{error, warn};
use walkdir::WalkDir;

/// Filename suffix marking a mock collection.
pub const COLLECTION_EXT: &str = ".mocks.json";

/// List relative paths under `base` matching the include globs and not
/// matching the ignore globs, sorted lexicographically.
pub fn scan_files(
    base: &Path,
    ignore: &[String],
    include: &[String],
) -> Result<Vec<String>, anyhow::Error> {
    let include_set = build_glob_set(include)?;
    let ignore_set = build_glob_set(ignore)?;

    // An empty base means the current directory; WalkDir would treat it as
    // an unreadable path and yield nothing.
    let base = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable directory entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(base) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if include_set.is_match(&rel) && !ignore_set.is_match(&rel) {
            files.push(rel);
        }
    }

    files.sort();
    Ok(files)
}

/// Load every mock under `base`: standalone files decoded individually,
/// collections expanded entry by entry. Plain-file mocks come first, then
/// collection mocks, each group in scan order.
pub fn load_mocks(base: &Path, ignore: &[String], include: &[String]) -> Vec<MockDescriptor> {
    let files = match scan_files(base, ignore, include) {
        Ok(files) => files,
        Err(err) => {
            error!("Error while scanning mocks in {:?}: {err}", base);
            return Vec::new();
        }
    };

    let (collections, plain): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|file| file.ends_with(COLLECTION_EXT));

    let mut mocks = Vec::new();
    for file in plain {
        match MockDescriptor::from_path(base, &file) {
            Ok(mock) => mocks.push(mock),
            Err(err) => warn!("Skipping mock \"{file}\": invalid route pattern: {err}"),
        }
    }
    for file in collections {
        match load_collection_mocks(base, &file) {
            Ok(collection_mocks) => mocks.extend(collection_mocks),
            Err(err) => error!("Error while loading collection \"{file}\": {err}"),
        }
    }
    mocks
}

/// Read one collection file into its (key, value) entries, in key order.
pub fn load_collection(path: &Path) -> Result<Vec<(String, Value)>, anyhow::Error> {
    let contents = std::fs::read_to_string(path)?;
    let entries: serde_json::Map<String, Value> = serde_json::from_str(&contents)?;
    Ok(entries.into_iter().collect())
}

fn load_collection_mocks(base: &Path, file: &str) -> Result<Vec<MockDescriptor>, anyhow::Error> {
    let path = base.join(file);
    let mut mocks = Vec::new();
    for (key, value) in load_collection(&path)? {
        match MockDescriptor::from_collection_entry(&path, &key, value) {
            Ok(mock) => mocks.push(mock),
            Err(err) => {
                warn!("Skipping collection entry \"{key}\" in \"{file}\": invalid route pattern: {err}")
            }
        }
    }
    Ok(mocks)
}

fn build_glob_set(globs: &[String]) -> Result<GlobSet, anyhow::Error> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(
            GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .map_err(|err| anyhow::anyhow!("invalid glob \"{glob}\": {err}"))?,
        );
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.txt", "b");
        write(&dir, "a.txt", "a");
        write(&dir, "api/get_ping.json", "{}");
        write(&dir, "ignored/secret.txt", "x");

        let files = scan_files(
            dir.path(),
            &["ignored/**".to_string()],
            &["**/*".to_string()],
        )
        .unwrap();
        assert_eq!(files, vec!["a.txt", "api/get_ping.json", "b.txt"]);
    }

    #[test]
    fn test_empty_base_path_scans_current_directory() {
        let empty = scan_files(Path::new(""), &[], &["**/*".to_string()]).unwrap();
        let dot = scan_files(Path::new("."), &[], &["**/*".to_string()]).unwrap();
        assert!(!dot.is_empty());
        assert_eq!(empty, dot);
    }

    #[test]
    fn test_load_mocks_merges_files_and_collections() {
        let dir = TempDir::new().unwrap();
        write(&dir, "api/get_ping.txt", "pong");
        write(
            &dir,
            "api.mocks.json",
            r#"{"get_api#hello.json": {"hello": "world"}}"#,
        );

        let mocks = load_mocks(dir.path(), &[], &["**/*".to_string()]);
        assert_eq!(mocks.len(), 2);
        // Plain files come first, collection entries after.
        assert!(mocks[0].is_file_backed());
        assert!(!mocks[1].is_file_backed());
        assert_eq!(mocks[1].route, "api/hello");
    }

    #[test]
    fn test_broken_collection_is_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "get_ping.txt", "pong");
        write(&dir, "broken.mocks.json", "{not json");

        let mocks = load_mocks(dir.path(), &[], &["**/*".to_string()]);
        assert_eq!(mocks.len(), 1);
        assert_eq!(mocks[0].route, "ping");
    }

    #[test]
    fn test_collection_reread_on_every_load() {
        let dir = TempDir::new().unwrap();
        write(&dir, "api.mocks.json", r#"{"get_ping": "pong"}"#);
        assert_eq!(load_mocks(dir.path(), &[], &["**/*".to_string()]).len(), 1);

        write(
            &dir,
            "api.mocks.json",
            r#"{"get_ping": "pong", "get_pong": "ping"}"#,
        );
        assert_eq!(load_mocks(dir.path(), &[], &["**/*".to_string()]).len(), 2);
    }
}
