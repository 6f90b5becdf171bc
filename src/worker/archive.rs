//! Packing a finished job directory into a flat tar archive

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions never packed: partial downloads and earlier archives
pub const EXCLUDED_EXTENSIONS: &[&str] = &["zip", "lock", "tar"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive name must end with .tar: {0}")]
    InvalidName(PathBuf),

    #[error("job directory does not exist: {0}")]
    MissingDir(PathBuf),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub files: usize,
    /// Size of the archive on disk
    pub size: u64,
}

/// Pack every regular file under `job_dir` into `archive_path`, in file-name order,
/// deleting each source once it is appended. The directory itself is removed only
/// when nothing is left in it. Blocking; call from `spawn_blocking`.
pub fn archive_dir(
    job_dir: &Path,
    archive_path: &Path,
    excluded: &[&str],
) -> Result<ArchiveSummary, ArchiveError> {
    if archive_path.extension().and_then(|e| e.to_str()) != Some("tar") {
        return Err(ArchiveError::InvalidName(archive_path.to_path_buf()));
    }
    if !job_dir.is_dir() {
        return Err(ArchiveError::MissingDir(job_dir.to_path_buf()));
    }

    let mut builder = tar::Builder::new(BufWriter::new(File::create(archive_path)?));
    let mut files = 0;

    for entry in WalkDir::new(job_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let excluded_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| excluded.contains(&ext));
        if excluded_ext {
            debug!(path = %path.display(), "Leaving excluded file out of archive");
            continue;
        }

        let name = path.strip_prefix(job_dir).unwrap_or(path);
        builder.append_path_with_name(path, name)?;
        fs::remove_file(path)?;
        files += 1;
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    // excluded leftovers may belong to another job on the same board
    if let Err(e) = fs::remove_dir(job_dir) {
        warn!(dir = %job_dir.display(), error = %e, "Job directory not removed");
    }

    let size = fs::metadata(archive_path)?.len();
    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        files,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut reader = tar::Archive::new(File::open(archive).unwrap());
        reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_archive_removes_emptied_directory() {
        let temp = TempDir::new().unwrap();
        let job_dir = temp.path().join("7");
        fs::create_dir(&job_dir).unwrap();
        fs::write(job_dir.join("a.jpg"), b"aa").unwrap();

        let archive = temp.path().join("hb_3.tar");
        let summary = archive_dir(&job_dir, &archive, EXCLUDED_EXTENSIONS).unwrap();

        assert_eq!(summary.files, 1);
        assert!(!job_dir.exists());
    }

    #[test]
    fn test_archive_packs_sorted_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let job_dir = temp.path().join("42");
        fs::create_dir(&job_dir).unwrap();
        fs::write(job_dir.join("b.jpg"), b"bbbb").unwrap();
        fs::write(job_dir.join("a.jpg"), b"aa").unwrap();
        fs::write(job_dir.join("README.txt"), b"warn\n").unwrap();
        fs::write(job_dir.join("c.jpg.lock"), b"partial").unwrap();
        fs::write(job_dir.join("old.tar"), b"x").unwrap();

        let archive = temp.path().join("hb_1.tar");
        let summary = archive_dir(&job_dir, &archive, EXCLUDED_EXTENSIONS).unwrap();

        assert_eq!(summary.files, 3);
        assert_eq!(summary.size, fs::metadata(&archive).unwrap().len());
        assert_eq!(entry_names(&archive), vec!["README.txt", "a.jpg", "b.jpg"]);
        assert!(!job_dir.join("a.jpg").exists());
        // an in-flight partial from a concurrent job on this board survives
        assert!(job_dir.join("c.jpg.lock").is_file());
        assert!(job_dir.join("old.tar").is_file());
    }

    #[test]
    fn test_empty_directory_gives_empty_archive() {
        let temp = TempDir::new().unwrap();
        let job_dir = temp.path().join("empty");
        fs::create_dir(&job_dir).unwrap();

        let archive = temp.path().join("hb_2.tar");
        let summary = archive_dir(&job_dir, &archive, EXCLUDED_EXTENSIONS).unwrap();

        assert_eq!(summary.files, 0);
        assert!(entry_names(&archive).is_empty());
    }

    #[test]
    fn test_rejects_bad_name_and_missing_dir() {
        let temp = TempDir::new().unwrap();

        let result = archive_dir(temp.path(), &temp.path().join("out.zip"), &[]);
        assert!(matches!(result, Err(ArchiveError::InvalidName(_))));

        let result = archive_dir(
            &temp.path().join("nope"),
            &temp.path().join("out.tar"),
            &[],
        );
        assert!(matches!(result, Err(ArchiveError::MissingDir(_))));
    }
}
