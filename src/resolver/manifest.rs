//! Manifest resolver - one file per line of plain text.
//!
//! Each non-blank line that does not start with `#` is
//! `<url> [<filename>]`. When the file name is omitted it is the
//! percent-decoded last path segment of the URL.

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{ResolveError, ResolvedFile, Resolver};

/// A resolver that reads URLs and file names from manifest text.
#[derive(Debug, Default)]
pub struct ManifestResolver;

impl ManifestResolver {
    /// Creates a new `ManifestResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses manifest text synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidUrl`] for lines that do not start with
    /// an absolute http(s) URL and [`ResolveError::MissingFilename`] when no
    /// name is given and the URL path has no last segment.
    pub fn parse(input: &str) -> Result<Vec<ResolvedFile>, ResolveError> {
        let mut files = Vec::new();
        for (index, raw) in input.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (url_text, name) = match line.split_once(char::is_whitespace) {
                Some((url_text, rest)) => (url_text, Some(rest.trim())),
                None => (line, None),
            };

            let url = Url::parse(url_text)
                .ok()
                .filter(|u| matches!(u.scheme(), "http" | "https"))
                .ok_or_else(|| ResolveError::invalid_url(line_no, url_text))?;

            let filename = match name.filter(|n| !n.is_empty()) {
                Some(name) => name.to_string(),
                None => filename_from_url(&url)
                    .ok_or_else(|| ResolveError::missing_filename(line_no, url_text))?,
            };

            files.push(ResolvedFile::new(url_text, filename));
        }
        Ok(files)
    }
}

/// Percent-decoded last non-empty path segment of `url`.
fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back().filter(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}

#[async_trait]
impl Resolver for ManifestResolver {
    fn name(&self) -> &'static str {
        "manifest"
    }

    #[instrument(skip(self, input), fields(resolver = "manifest", bytes = input.len()))]
    async fn resolve(&self, input: &str) -> Result<Vec<ResolvedFile>, ResolveError> {
        let files = Self::parse(input)?;
        debug!(files = files.len(), "manifest resolved");
        Ok(files)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_resolver_name() {
        assert_eq!(ManifestResolver::new().name(), "manifest");
    }

    #[test]
    fn test_parse_explicit_and_derived_names() {
        let files = ManifestResolver::parse(
            "https://example.com/a/01-intro.mp3\nhttp://example.com/img?id=7 cover.jpg\n",
        )
        .unwrap();
        assert_eq!(
            files,
            vec![
                ResolvedFile::new("https://example.com/a/01-intro.mp3", "01-intro.mp3"),
                ResolvedFile::new("http://example.com/img?id=7", "cover.jpg"),
            ]
        );
    }

    #[test]
    fn test_parse_skips_blank_lines_and_comments() {
        let files = ManifestResolver::parse("\n# album: Jailbreak\n   \nhttps://h/02.mp3\n").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "02.mp3");
    }

    #[test]
    fn test_parse_decodes_percent_escapes() {
        let files = ManifestResolver::parse("https://h/dl/03-derni%C3%A8re%20danse.mp3").unwrap();
        assert_eq!(files[0].filename, "03-dernière danse.mp3");
    }

    #[test]
    fn test_parse_keeps_spaces_in_explicit_name() {
        let files = ManifestResolver::parse("https://h/x   05 ballade.mp3  ").unwrap();
        assert_eq!(files[0].filename, "05 ballade.mp3");
    }

    #[test]
    fn test_parse_rejects_non_http_url() {
        let err = ManifestResolver::parse("https://h/1.mp3\nftp://h/2.mp3").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUrl { line: 2, .. }));
    }

    #[test]
    fn test_parse_rejects_relative_url() {
        let err = ManifestResolver::parse("album/01.mp3").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUrl { line: 1, .. }));
    }

    #[test]
    fn test_parse_requires_name_for_bare_directory_url() {
        let err = ManifestResolver::parse("https://h/album/").unwrap_err();
        assert!(matches!(err, ResolveError::MissingFilename { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_resolve_matches_parse() {
        let files = ManifestResolver::new()
            .resolve("https://h/01.mp3")
            .await
            .unwrap();
        assert_eq!(files, vec![ResolvedFile::new("https://h/01.mp3", "01.mp3")]);
    }
}
