//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use albumdl_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};
use clap::Parser;

/// Download every file of an album, resuming interrupted transfers.
///
/// Reads a manifest with one `<url> [<filename>]` per line and fetches the
/// files into the working directory, several at a time. Files already
/// complete on disk are skipped; partial ones are resumed.
#[derive(Parser, Debug)]
#[command(name = "albumdl")]
#[command(author, version, about)]
pub struct Args {
    /// Manifest file to read ("-" or omitted reads stdin)
    #[arg(value_name = "MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Working directory the files are saved into (created if missing)
    #[arg(short = 'p', long = "path", value_name = "DIR", default_value = ".")]
    pub path: PathBuf,

    /// Number of simultaneous downloads (1-32)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: u8,

    /// Connect and read timeout in seconds (1-300)
    #[arg(short = 't', long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=300))]
    pub timeout: u64,

    /// SOCKS5 proxy as host:port (e.g. 127.0.0.1:9050)
    #[arg(short = 's', long, value_name = "HOST:PORT")]
    pub socks: Option<String>,

    /// Maximum attempts per file, including the first (1-20)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub max_attempts: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print one JSON object per finished file instead of status lines
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Whether the manifest comes from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.manifest
            .as_deref()
            .is_none_or(|path| path.as_os_str() == "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["albumdl"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert_eq!(args.concurrency, 3); // DEFAULT_CONCURRENCY
        assert_eq!(args.max_attempts, 5); // DEFAULT_MAX_ATTEMPTS
        assert_eq!(args.timeout, 10);
        assert_eq!(args.path, PathBuf::from("."));
        assert!(args.socks.is_none());
        assert!(args.reads_stdin());
    }

    #[test]
    fn test_cli_manifest_positional() {
        let args = Args::try_parse_from(["albumdl", "album.txt"]).unwrap();
        assert_eq!(args.manifest, Some(PathBuf::from("album.txt")));
        assert!(!args.reads_stdin());

        let args = Args::try_parse_from(["albumdl", "-"]).unwrap();
        assert!(args.reads_stdin());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["albumdl", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["albumdl", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["albumdl", "--verbose", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["albumdl", "-q"]).unwrap();
        assert!(args.quiet);

        let args = Args::try_parse_from(["albumdl", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["albumdl", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["albumdl", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["albumdl", "--invalid-flag"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_path_short_and_long() {
        let args = Args::try_parse_from(["albumdl", "-p", "/music/album"]).unwrap();
        assert_eq!(args.path, PathBuf::from("/music/album"));

        let args = Args::try_parse_from(["albumdl", "--path", "out"]).unwrap();
        assert_eq!(args.path, PathBuf::from("out"));
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn test_cli_concurrency_short_flag() {
        let args = Args::try_parse_from(["albumdl", "-c", "5"]).unwrap();
        assert_eq!(args.concurrency, 5);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["albumdl", "--concurrency", "32"]).unwrap();
        assert_eq!(args.concurrency, 32);

        let err = Args::try_parse_from(["albumdl", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["albumdl", "-c", "33"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Timeout Tests ====================

    #[test]
    fn test_cli_timeout_flag() {
        let args = Args::try_parse_from(["albumdl", "-t", "30"]).unwrap();
        assert_eq!(args.timeout, 30);
    }

    #[test]
    fn test_cli_timeout_bounds() {
        let err = Args::try_parse_from(["albumdl", "-t", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["albumdl", "--timeout", "301"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Max Attempts Tests ====================

    #[test]
    fn test_cli_max_attempts_flags() {
        let args = Args::try_parse_from(["albumdl", "-r", "1"]).unwrap();
        assert_eq!(args.max_attempts, 1);

        let args = Args::try_parse_from(["albumdl", "--max-attempts", "20"]).unwrap();
        assert_eq!(args.max_attempts, 20);
    }

    #[test]
    fn test_cli_max_attempts_out_of_range_rejected() {
        let err = Args::try_parse_from(["albumdl", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["albumdl", "-r", "21"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Proxy and Output Tests ====================

    #[test]
    fn test_cli_socks_is_taken_verbatim() {
        // validated later by SocksProxy::parse
        let args = Args::try_parse_from(["albumdl", "-s", "127.0.0.1:9050"]).unwrap();
        assert_eq!(args.socks.as_deref(), Some("127.0.0.1:9050"));
    }

    #[test]
    fn test_cli_json_flag() {
        let args = Args::try_parse_from(["albumdl", "--json", "album.txt"]).unwrap();
        assert!(args.json);
    }

    #[test]
    fn test_cli_combined_all_flags() {
        let args = Args::try_parse_from([
            "albumdl", "-p", "out", "-c", "4", "-t", "20", "-s", "proxy:1080", "-r", "3", "-vv",
            "album.txt",
        ])
        .unwrap();
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.timeout, 20);
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.socks.as_deref(), Some("proxy:1080"));
    }
}
