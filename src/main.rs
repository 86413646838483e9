//! Command-line front end for policy discovery.
//!
//! ```bash
//! # Privacy policy of one site
//! policy-locator privacy example.com
//!
//! # Terms of service for several sites, static strategies only
//! policy-locator terms example.com github.com/acme/widget --no-render
//!
//! # Layer flags over a config file and append every result to a log
//! policy-locator privacy example.com --config locator.json --record results.jsonl
//! ```
//!
//! Results are printed to stdout as JSON, one document per input. Logs go to
//! stderr and honour `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::{BoxFuture, join_all};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use policy_locator::{DiscoveryConfig, Discoverer, DiscoveryResponse, DocumentKind, ResultSink};

/// Find a website's Terms of Service or Privacy Policy.
#[derive(Parser)]
#[command(name = "policy-locator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Document to look for: terms or privacy
    kind: DocumentKind,

    /// One or more site URLs; the scheme may be omitted
    #[arg(required = true)]
    urls: Vec<String>,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the headless browser stage
    #[arg(long)]
    no_render: bool,

    /// Show the browser window while rendering
    #[arg(long)]
    headed: bool,

    /// Per-request time budget in seconds
    #[arg(long)]
    budget: Option<u64>,

    /// Minimum confidence for a candidate to resolve a request
    #[arg(long)]
    threshold: Option<f64>,

    /// Append every response as a JSON line to this file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

/// Appends responses to a JSON Lines file.
struct JsonLinesSink {
    file: Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ResultSink for JsonLinesSink {
    fn record<'a>(&'a self, response: &'a DiscoveryResponse) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut line = serde_json::to_vec(response)?;
            line.push(b'\n');
            let mut file = self.file.lock().await;
            file.write_all(&line).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

fn load_config(cli: &Cli) -> Result<DiscoveryConfig> {
    let base = match &cli.config {
        Some(path) => DiscoveryConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DiscoveryConfig::default(),
    };

    let mut builder = base.to_builder();
    if cli.no_render {
        builder = builder.render_enabled(false);
    }
    if cli.headed {
        builder = builder.headless(false);
    }
    if let Some(secs) = cli.budget {
        builder = builder.request_budget_secs(secs);
    }
    if let Some(threshold) = cli.threshold {
        builder = builder.confidence_threshold(threshold);
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut discoverer = Discoverer::new(config)?;
    if let Some(path) = &cli.record {
        discoverer = discoverer.with_sink(Arc::new(JsonLinesSink::open(path).await?));
    }

    let kind = cli.kind;
    let requests = cli.urls.iter().map(|url| {
        let discoverer = discoverer.clone();
        async move { (url, discoverer.discover(kind, url).await) }
    });

    let mut all_found = true;
    for (url, outcome) in join_all(requests).await {
        match outcome {
            Ok(response) => {
                all_found &= response.found;
                let rendered = if cli.compact {
                    serde_json::to_string(&response)?
                } else {
                    serde_json::to_string_pretty(&response)?
                };
                println!("{rendered}");
            }
            Err(e) => {
                all_found = false;
                tracing::error!("{url}: {e}");
            }
        }
    }

    Ok(if all_found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
