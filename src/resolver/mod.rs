//! Turning caller input into a batch of download tasks.
//!
//! A [`Resolver`] produces `(source_url, filename)` pairs for one album;
//! [`build_batch`] places them in the working directory and enforces that
//! every task writes to its own file.
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait that individual resolvers implement
//! - [`ResolvedFile`] - One URL and the file name it is saved under
//! - [`ManifestResolver`] - Reads a plain-text manifest of URLs
//!
//! Resolvers must settle every field before returning; workers never block
//! on interactive input.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use albumdl_core::resolver::{build_batch, ManifestResolver, Resolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = "https://example.com/album/01-intro.mp3\nhttps://example.com/album/c.jpg cover.jpg\n";
//! let files = ManifestResolver::new().resolve(manifest).await?;
//! let tasks = build_batch(files, Path::new("./album"))?;
//! assert_eq!(tasks.len(), 2);
//! # Ok(())
//! # }
//! ```

mod error;
mod manifest;

pub use error::ResolveError;
pub use manifest::ManifestResolver;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::download::DownloadTask;

/// One file of a batch, as produced by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Where the bytes come from.
    pub source_url: String,
    /// Name of the file inside the working directory.
    pub filename: String,
    /// Size hint, when the resolver learned one.
    pub expected_size: Option<u64>,
}

impl ResolvedFile {
    /// Creates a resolved file with no size hint.
    #[must_use]
    pub fn new(source_url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            filename: filename.into(),
            expected_size: None,
        }
    }
}

/// Trait that all resolvers must implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via `Box<dyn Resolver>`.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the resolver's name (e.g., "manifest").
    fn name(&self) -> &str;

    /// Resolves `input` into the ordered files of one batch.
    async fn resolve(&self, input: &str) -> Result<Vec<ResolvedFile>, ResolveError>;
}

/// Joins each file name onto `working_dir` and turns the files into tasks.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidFilename`] for empty names, names with path
/// separators, `.` or `..`, and [`ResolveError::DuplicateFilename`] when two files
/// share a name.
pub fn build_batch(
    files: Vec<ResolvedFile>,
    working_dir: &Path,
) -> Result<Vec<DownloadTask>, ResolveError> {
    let mut seen = HashSet::with_capacity(files.len());
    let mut tasks = Vec::with_capacity(files.len());
    for file in files {
        check_filename(&file.filename)?;
        if !seen.insert(file.filename.clone()) {
            return Err(ResolveError::duplicate_filename(&file.filename));
        }
        let mut task = DownloadTask::new(file.source_url, working_dir.join(&file.filename));
        if let Some(size) = file.expected_size {
            task = task.with_expected_size(size);
        }
        tasks.push(task);
    }
    debug!(tasks = tasks.len(), dir = %working_dir.display(), "batch built");
    Ok(tasks)
}

fn check_filename(name: &str) -> Result<(), ResolveError> {
    if name.trim().is_empty() {
        return Err(ResolveError::invalid_filename(name, "name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(ResolveError::invalid_filename(
            name,
            "must not contain path separators",
        ));
    }
    if name == "." || name == ".." {
        return Err(ResolveError::invalid_filename(
            name,
            "must name a file, not a directory",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_build_batch_joins_working_dir() {
        let files = vec![
            ResolvedFile::new("https://h/1", "01-intro.mp3"),
            ResolvedFile::new("https://h/c", "cover.jpg"),
        ];
        let tasks = build_batch(files, Path::new("/music/album")).unwrap();
        assert_eq!(
            tasks[0].destination_path(),
            PathBuf::from("/music/album/01-intro.mp3")
        );
        assert_eq!(tasks[1].source_url(), "https://h/c");
    }

    #[test]
    fn test_build_batch_keeps_size_hint() {
        let mut file = ResolvedFile::new("https://h/1", "01.mp3");
        file.expected_size = Some(42);
        let tasks = build_batch(vec![file], Path::new(".")).unwrap();
        assert_eq!(tasks[0].expected_size(), Some(42));
    }

    #[test]
    fn test_build_batch_rejects_duplicates() {
        let files = vec![
            ResolvedFile::new("https://h/1", "01.mp3"),
            ResolvedFile::new("https://h/2", "01.mp3"),
        ];
        assert_eq!(
            build_batch(files, Path::new(".")).unwrap_err(),
            ResolveError::duplicate_filename("01.mp3")
        );
    }

    #[test]
    fn test_build_batch_rejects_escaping_names() {
        for name in ["", "  ", "../01.mp3", "a/b.mp3", "a\\b.mp3", "..", "."] {
            let files = vec![ResolvedFile::new("https://h/1", name)];
            assert!(
                matches!(
                    build_batch(files, Path::new(".")),
                    Err(ResolveError::InvalidFilename { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_build_batch_accepts_dots_inside_names() {
        let files = vec![
            ResolvedFile::new("https://h/1", "Intro...Outro.mp3"),
            ResolvedFile::new("https://h/2", "Vol..2.mp3"),
            ResolvedFile::new("https://h/3", ".hidden.jpg"),
        ];
        let tasks = build_batch(files, Path::new("/album")).unwrap();
        assert_eq!(
            tasks[0].destination_path(),
            PathBuf::from("/album/Intro...Outro.mp3")
        );
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn test_build_batch_empty() {
        assert!(build_batch(Vec::new(), Path::new(".")).unwrap().is_empty());
    }
}
