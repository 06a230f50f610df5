//! Archive Bundling
//!
//! Tar creation and extraction shared by both backends. Archives are a
//! flat list of `<name>.json` entries at the root, each holding the same
//! encoded form the file backend stores on disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use tar::{Archive, Builder};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

fn archive_error(path: &Path, reason: impl ToString) -> StorageError {
    StorageError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Bundle `files` into a tar archive at `destination`.
///
/// Each `(entry_name, path)` pair lands flat at the archive root under
/// its entry name.
pub(crate) fn create(destination: &Path, files: &[(String, PathBuf)]) -> StorageResult<()> {
    let archive_file = File::create(destination).map_err(|e| archive_error(destination, e))?;
    let mut builder = Builder::new(archive_file);

    for (entry_name, path) in files {
        builder
            .append_path_with_name(path, entry_name)
            .map_err(|e| archive_error(destination, e))?;
    }

    builder.finish().map_err(|e| archive_error(destination, e))?;
    debug!(
        archive = %destination.display(),
        entries = files.len(),
        "archive created"
    );
    Ok(())
}

/// Extract a tar archive into `directory`, overwriting existing files.
pub(crate) fn extract(source: &Path, directory: &Path) -> StorageResult<()> {
    let archive_file = File::open(source).map_err(|e| archive_error(source, e))?;
    let mut archive = Archive::new(archive_file);
    archive.set_overwrite(true);
    archive
        .unpack(directory)
        .map_err(|e| archive_error(source, e))?;
    debug!(
        archive = %source.display(),
        directory = %directory.display(),
        "archive extracted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_create_and_extract_round_trip() {
        let workspace = tempfile::tempdir().unwrap();
        let source_dir = workspace.path().join("source");
        let target_dir = workspace.path().join("target");
        fs::create_dir_all(&source_dir).unwrap();
        fs::create_dir_all(&target_dir).unwrap();

        let first = source_dir.join("site.settings.json");
        let second = source_dir.join("system.core.json");
        fs::write(&first, "{\n  \"a\": 1\n}\n").unwrap();
        fs::write(&second, "{\n  \"b\": 2\n}\n").unwrap();

        let destination = workspace.path().join("export.tar");
        create(
            &destination,
            &[
                ("site.settings.json".to_string(), first),
                ("system.core.json".to_string(), second),
            ],
        )
        .unwrap();

        extract(&destination, &target_dir).unwrap();

        assert_eq!(
            fs::read_to_string(target_dir.join("site.settings.json")).unwrap(),
            "{\n  \"a\": 1\n}\n"
        );
        assert_eq!(
            fs::read_to_string(target_dir.join("system.core.json")).unwrap(),
            "{\n  \"b\": 2\n}\n"
        );
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let workspace = tempfile::tempdir().unwrap();
        let result = extract(&workspace.path().join("missing.tar"), workspace.path());
        assert!(matches!(result, Err(StorageError::Archive { .. })));
    }
}
