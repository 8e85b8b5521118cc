//! `imagepipe fetch` - push URLs through the coordinator and report outcomes.

use clap::Args;
use futures::future::join_all;
use imagepipe::config::Size;
use imagepipe::logging::{default_log_dir, default_log_file, init_logging};
use imagepipe::{Bitmap, ImagePipeline, Outcome};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use super::config::load_config;
use crate::error::CliError;

/// Arguments for `imagepipe fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Image URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Subscribe to every URL this many times concurrently
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Configuration file (default: ~/.imagepipe/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Memory cache size, e.g. 256MB (overrides the configuration)
    #[arg(long)]
    pub cache_size: Option<Size>,

    /// Per-attempt timeout in milliseconds (overrides the configuration)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Attempts per URL before giving up (overrides the configuration)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,
}

/// Per-URL tally of the outcomes its subscribers received.
struct UrlReport<'a> {
    url: &'a str,
    delivered: usize,
    first: Option<Outcome<Bitmap>>,
}

/// Run the fetch command.
///
/// The pipeline is assembled before the runtime starts: its blocking HTTP
/// client must not be created from inside an async context.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let _logging = init_logging(default_log_dir(), default_log_file())
        .map_err(CliError::LoggingInit)?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(size) = args.cache_size {
        config.cache = config.cache.with_max_bytes(Some(size.bytes()));
    }
    if let Some(ms) = args.timeout_ms {
        config.coordinator = config
            .coordinator
            .with_attempt_timeout(Duration::from_millis(ms));
    }
    if let Some(attempts) = args.max_attempts {
        config.coordinator = config.coordinator.with_max_attempts(attempts);
    }

    let pipeline = ImagePipeline::new(&config).map_err(CliError::ServiceCreation)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let started = Instant::now();
    let mut urls = Vec::new();
    let outcomes = runtime.block_on(async {
        let mut pending = Vec::new();
        for url in &args.urls {
            for _ in 0..args.repeat {
                urls.push(url.as_str());
                pending.push(pipeline.fetch(url.as_str()));
            }
        }
        info!(
            urls = args.urls.len(),
            subscriptions = pending.len(),
            "Fetching"
        );
        join_all(pending).await
    });
    let elapsed = started.elapsed();

    let reports = tally(&args.urls, urls.into_iter().zip(outcomes));
    let failed = reports
        .iter()
        .filter(|r| !r.first.as_ref().is_some_and(Outcome::is_ready))
        .count();

    for report in &reports {
        print_report(report);
    }

    println!();
    println!("Completed in {:.2?}", elapsed);
    let stats = pipeline.coordinator_stats();
    println!(
        "Coordinator: {} requests, {} coalesced ({:.1}%), {} executions, {} attempts, {} retries, {} timeouts",
        stats.total_requests,
        stats.coalesced_requests,
        stats.coalescing_ratio() * 100.0,
        stats.executions,
        stats.attempts,
        stats.retries,
        stats.timeouts
    );
    let cache = pipeline.cache_stats();
    println!(
        "Memory cache: {} entries, {} of {}, {} hits, {} misses, {} evictions",
        cache.entry_count,
        Size(cache.size_bytes),
        Size(pipeline.cache().max_size_bytes()),
        cache.hits,
        cache.misses,
        cache.evictions
    );
    pipeline.log_stats();

    // Abandoned attempts may still hold blocking threads.
    runtime.shutdown_background();

    if failed > 0 {
        return Err(CliError::FetchFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

/// Group outcomes by URL, preserving the order URLs were given in.
fn tally<'a>(
    urls: &'a [String],
    outcomes: impl IntoIterator<Item = (&'a str, Outcome<Bitmap>)>,
) -> Vec<UrlReport<'a>> {
    let mut reports: Vec<UrlReport<'a>> = Vec::new();
    for url in urls {
        if !reports.iter().any(|r| r.url == url.as_str()) {
            reports.push(UrlReport {
                url: url.as_str(),
                delivered: 0,
                first: None,
            });
        }
    }

    for (url, outcome) in outcomes {
        if let Some(report) = reports.iter_mut().find(|r| r.url == url) {
            report.delivered += 1;
            report.first.get_or_insert(outcome);
        }
    }
    reports
}

fn print_report(report: &UrlReport<'_>) {
    match &report.first {
        Some(Outcome::Ready(bitmap)) => println!(
            "  OK    {}  {}x{} ({} delivered)",
            report.url,
            bitmap.width(),
            bitmap.height(),
            report.delivered
        ),
        Some(Outcome::Failed(e)) => println!("  FAIL  {}  {}", report.url, e),
        None => println!("  FAIL  {}  no outcome delivered", report.url),
    }
}
