use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::PathBuf;
use url::Url;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use prefetchr::config::Config;
use prefetchr::domain::{LoadOutcome, Priority, ResourceKind};
use prefetchr::scheduler::PrefetchScheduler;
use prefetchr::{admission, error::PrefetchError};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prefetchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("prefetchr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Resolve the base origin from the CLI flag or the config file.
fn base_origin(flag: Option<String>, config: &Config) -> Result<Url> {
    let raw = match flag.or_else(|| config.base_url.clone()) {
        Some(raw) => raw,
        None => bail!("No base origin: pass --base or set base_url in the config file"),
    };
    Url::parse(&raw).context(format!("Invalid base url: {}", raw))
}

/// Guess a resource kind from the url's extension.
fn guess_kind(url: &str) -> ResourceKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path.rsplit('.').next().unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" => ResourceKind::Image,
        "css" => ResourceKind::Style,
        "js" | "mjs" => ResourceKind::Script,
        "woff" | "woff2" | "ttf" | "otf" => ResourceKind::Font,
        _ => ResourceKind::Document,
    }
}

/// Collect urls from positional args plus an optional file (one per line,
/// blank lines and # comments skipped).
fn collect_urls(urls: Vec<String>, file: Option<PathBuf>) -> Result<Vec<String>> {
    let mut all_urls = urls;
    if let Some(path) = file {
        let content = fs::read_to_string(&path)
            .context(format!("Failed to read url file {}", path.display()))?;
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                all_urls.push(line.to_string());
            }
        }
    }
    Ok(all_urls)
}

async fn handle_warm(
    base: Option<String>,
    urls: Vec<String>,
    file: Option<PathBuf>,
    kind: Option<String>,
    priority: Option<String>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let base_url = base_origin(base, config)?;
    let all_urls = collect_urls(urls, file)?;
    if all_urls.is_empty() {
        bail!("No urls to warm: pass urls as arguments or via --file");
    }

    let forced_kind = match kind {
        Some(raw) => Some(raw.parse::<ResourceKind>().map_err(PrefetchError::Config)?),
        None => None,
    };
    let priority = match priority {
        Some(raw) => Some(raw.parse::<Priority>().map_err(PrefetchError::Config)?),
        None => None,
    };

    info!("Warming {} urls against {}", all_urls.len(), base_url);
    let scheduler =
        PrefetchScheduler::with_http_loader(config.scheduler.clone(), base_url, &config.http)?;

    for url in &all_urls {
        let kind = forced_kind.unwrap_or_else(|| guess_kind(url));
        scheduler.prefetch(url, kind, priority);
    }
    scheduler.drained().await;

    let attempts = scheduler.attempts();
    let mut completed = 0usize;
    for (url, record) in &attempts {
        match &record.outcome {
            LoadOutcome::Completed => {
                completed += 1;
                println!("{} {}", "warmed:".green(), url);
            }
            LoadOutcome::Failed(reason) => println!("{} {} ({})", "failed:".red(), url, reason),
            LoadOutcome::TimedOut => println!("{} {}", "timeout:".yellow(), url),
        }
    }

    let skipped = all_urls.len().saturating_sub(attempts.len());
    println!(
        "\n{} {} warmed, {} missed, {} filtered at admission",
        "Summary:".cyan(),
        completed,
        attempts.len() - completed,
        skipped
    );

    if json {
        let status = scheduler.status();
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    Ok(())
}

fn handle_check(base: Option<String>, urls: Vec<String>, config: &Config) -> Result<()> {
    let base_url = base_origin(base, config)?;
    if urls.is_empty() {
        bail!("No urls to check");
    }

    for url in &urls {
        match admission::resolve(&base_url, url) {
            Ok(resolved) => println!("{} {} -> {}", "admit:".green(), url, resolved),
            Err(reason) => println!("{} {} ({})", "reject:".red(), url, reason),
        }
    }
    Ok(())
}

async fn run_application(cli: Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        None => {
            println!("{}", "No command given; try `prefetchr warm --help`".yellow());
            Ok(())
        }
        Some(Commands::Warm {
            base,
            urls,
            file,
            kind,
            priority,
            json,
        }) => handle_warm(base, urls, file, kind, priority, json, config).await,
        Some(Commands::Check { base, urls }) => handle_check(base, urls, config),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(cli, &config).await.context("Application failed")?;

    Ok(())
}
