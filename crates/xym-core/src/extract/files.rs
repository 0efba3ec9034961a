//! Input discovery and output locations.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Recursively collect files named `NNNNN<extension>` (five ASCII digits
/// followed by the extension) under `dir`, sorted by path.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CoreError> {
    let mut found = Vec::new();
    walk(dir, extension, &mut found)?;
    found.sort();
    tracing::debug!(dir = %dir.display(), extension, count = found.len(), "discovered input files");
    Ok(found)
}

fn walk(current: &Path, extension: &str, found: &mut Vec<PathBuf>) -> Result<(), CoreError> {
    // Sorted for deterministic traversal across filesystems.
    let mut entries: Vec<_> = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.path());

    entries.into_iter().try_for_each(|entry| {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extension, found)
        } else {
            if is_store_file(&path, extension) {
                found.push(path);
            }
            Ok(())
        }
    })
}

fn is_store_file(path: &Path, extension: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_suffix(extension)
        .is_some_and(|stem| stem.len() == 5 && stem.bytes().all(|b| b.is_ascii_digit()))
}

/// Locations of everything an extraction run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractPaths {
    pub block_data: PathBuf,
    pub statement_data: PathBuf,
    pub state_map: PathBuf,
    pub block_summaries: PathBuf,
}

impl ExtractPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            block_data: dir.join("block_data.bin"),
            statement_data: dir.join("stmt_data.bin"),
            state_map: dir.join("state_map.bin"),
            block_summaries: dir.join("block_summaries.jsonl"),
        }
    }
}

impl Default for ExtractPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_numbered_files_recursively_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("00001");
        fs::create_dir(&nested).expect("mkdir");
        for name in ["00002.dat", "00000.dat", "0000.dat", "00003.dat.bak", "abcde.dat", "00001.stmt"] {
            fs::write(dir.path().join(name), b"").expect("write");
        }
        fs::write(nested.join("00010.dat"), b"").expect("write nested");

        let found = discover_files(dir.path(), ".dat").expect("discover");
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).expect("under dir").to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("00000.dat"),
                PathBuf::from("00001/00010.dat"),
                PathBuf::from("00002.dat"),
            ]
        );

        let statements = discover_files(dir.path(), ".stmt").expect("discover");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = discover_files(Path::new("/nonexistent/xym"), ".dat").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn output_paths_share_directory() {
        let paths = ExtractPaths::in_dir(Path::new("/out"));
        assert_eq!(paths.state_map, PathBuf::from("/out/state_map.bin"));
        assert_eq!(paths.block_data, PathBuf::from("/out/block_data.bin"));
    }
}
