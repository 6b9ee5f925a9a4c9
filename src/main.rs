//! CLI entry point for the albumdl tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use albumdl_core::{
    BatchOutcome, CancelSignal, DownloadEngine, JsonReporter, LineReporter, ManifestResolver,
    Reporter, Resolver, RetryPolicy, SocksProxy, TransferOptions, Verbosity, build_batch,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

mod cli;
mod output;

use cli::Args;
use output::{ProgressReporter, summary_line};

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Every file is complete on disk.
    Success,
    /// A file failed, was never started, or setup failed.
    Failure,
    /// The run was cancelled with Ctrl-C.
    Interrupted,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Interrupted => ExitCode::from(130),
        }
    }
}

/// Maps a finished batch to the process outcome.
fn determine_exit_outcome(outcome: &BatchOutcome) -> ProcessExit {
    if outcome.was_cancelled() {
        ProcessExit::Interrupted
    } else if outcome.is_success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let options = base_options(&args);

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(options.verbosity().filter_directive())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(args, options).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: Args, options: TransferOptions) -> Result<ProcessExit> {
    let options = with_proxy(options, &args)?;

    let Some(manifest) = read_manifest(&args)? else {
        info!("No manifest provided. Pass a manifest file or pipe one via stdin.");
        info!("Example: echo 'https://example.com/album/01.mp3' | albumdl -p ./album");
        return Ok(ProcessExit::Success);
    };

    let files = ManifestResolver::new()
        .resolve(&manifest)
        .await
        .context("failed to read manifest")?;
    if files.is_empty() {
        info!("Manifest lists no files");
        return Ok(ProcessExit::Success);
    }

    std::fs::create_dir_all(&args.path)
        .with_context(|| format!("failed to create working directory {}", args.path.display()))?;
    let tasks = build_batch(files, &args.path).context("invalid manifest entries")?;
    let engine = DownloadEngine::from_options(&options).context("failed to set up downloads")?;

    info!(
        files = tasks.len(),
        dir = %args.path.display(),
        concurrency = engine.concurrency(),
        "Starting album download"
    );

    let cancel = CancelSignal::shared();
    spawn_interrupt_handler(Arc::clone(&cancel));

    let total = tasks.len();
    let outcome = if args.json {
        let reporter = JsonReporter::new(io::stdout());
        run_with(&engine, tasks, cancel, &reporter).await?
    } else if args.quiet || !io::stderr().is_terminal() {
        let reporter = LineReporter::new(io::stdout());
        run_with(&engine, tasks, cancel, &reporter).await?
    } else {
        let reporter = ProgressReporter::new(total);
        let outcome = run_with(&engine, tasks, cancel, &reporter).await;
        reporter.finish();
        outcome?
    };

    if outcome.was_cancelled() {
        warn!("{}", summary_line(&outcome));
    } else {
        info!("{}", summary_line(&outcome));
    }
    Ok(determine_exit_outcome(&outcome))
}

async fn run_with(
    engine: &DownloadEngine,
    tasks: Vec<albumdl_core::DownloadTask>,
    cancel: Arc<CancelSignal>,
    reporter: &dyn Reporter,
) -> Result<BatchOutcome> {
    engine
        .run_batch_with_reporter(tasks, cancel, reporter)
        .await
        .context("download batch rejected")
}

/// Options that cannot fail to build; the proxy is added by [`with_proxy`].
fn base_options(args: &Args) -> TransferOptions {
    TransferOptions::new(usize::from(args.concurrency))
        .with_network_timeout(Duration::from_secs(args.timeout))
        .with_verbosity(Verbosity::from_flags(args.quiet, args.verbose))
        .with_retry_policy(RetryPolicy::with_max_attempts(u32::from(args.max_attempts)))
}

fn with_proxy(options: TransferOptions, args: &Args) -> Result<TransferOptions> {
    let Some(socks) = &args.socks else {
        return Ok(options);
    };
    let proxy = SocksProxy::parse(socks)?;
    debug!(host = proxy.host(), port = proxy.port(), "SOCKS proxy configured");
    Ok(options.with_socks_proxy(proxy))
}

/// Manifest text, or `None` when stdin is an interactive terminal.
fn read_manifest(args: &Args) -> Result<Option<String>> {
    if let Some(path) = args.manifest.as_deref().filter(|_| !args.reads_stdin()) {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        return Ok(Some(text));
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read manifest from stdin")?;
    Ok(Some(buffer))
}

fn spawn_interrupt_handler(cancel: Arc<CancelSignal>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping downloads (partial files are kept)");
                cancel.cancel();
            }
            Err(e) => debug!(error = %e, "unable to listen for Ctrl-C"),
        }
    });
}
