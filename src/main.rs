use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use static_mirror::cli::{Command, MirrorCommand};
use static_mirror::downloader::fetch_with_retry;
use static_mirror::file_manager::format_bytes;
use static_mirror::{
    BatchReport, CaptureOutcome, Clock, HttpFetcher, Job, JsonFileStore, KeyValueStore,
    MirrorConfig, ReqwestFetcher, RequestInfo, RetryPolicy, StaticMirror, StoreScheduler,
    SystemClock,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();
    init_tracing(args.verbose);

    let config = args.load_config().context("Failed to load configuration")?;
    let state_file = config.state_file();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&state_file)
            .with_context(|| format!("Failed to open state file {state_file:?}"))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(StoreScheduler::new(store.clone(), clock.clone()));
    let fetcher = Arc::new(
        ReqwestFetcher::new(&config.fetch.user_agent).context("Failed to build HTTP client")?,
    );
    let mirror = StaticMirror::new(
        config.clone(),
        store,
        clock,
        fetcher.clone(),
        scheduler.clone(),
    )
    .context("Failed to initialise static mirror")?;

    match args.command {
        Command::Enable => {
            mirror.enable()?;
            println!("✅ Static capture {}", "enabled".green());
        }
        Command::Disable => {
            mirror.disable()?;
            println!("⏸️  Static capture {}", "disabled".yellow());
        }
        Command::Status => print_status(&mirror, &scheduler)?,
        Command::Capture { path, html_file } => {
            let html = match html_file {
                Some(file) => read_html(&file)?,
                None => fetch_live_page(fetcher.as_ref(), &config, &path).await?,
            };
            let outcome = mirror.handle_response(&RequestInfo::anonymous_get(&path), &html);
            print_capture(&path, &outcome)?;
        }
        Command::Process { batch, all } => {
            let size = batch
                .map(|n| n as usize)
                .unwrap_or(config.batch.interactive_size);
            if all {
                process_all(&mirror, size).await?;
            } else {
                let report = mirror.process_pending_batch(size).await?;
                print_report(&report);
            }
        }
        Command::Cron => {
            let reports = mirror.run_due_jobs(&scheduler).await?;
            if reports.is_empty() {
                println!("⏭️  No jobs due");
            }
            for (job, report) in reports {
                println!("🕒 Ran {:?}", job);
                print_report(&report);
            }
        }
        Command::Zip { output } => {
            let dest = output.unwrap_or_else(|| mirror.default_archive_path());
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
            spinner.set_message(format!("Packing {:?}", mirror.static_tree_root()));
            let path = mirror.create_archive(&dest)?;
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            spinner.finish_with_message(format!(
                "✅ Archive written to {} ({})",
                path.display().to_string().green(),
                format_bytes(size)
            ));
        }
        Command::Clear { yes } => {
            if !yes {
                bail!(
                    "Refusing to delete {:?} without --yes",
                    mirror.static_tree_root()
                );
            }
            if !mirror.clear_all() {
                bail!("Failed to clear {:?}", mirror.static_tree_root());
            }
            println!("🧹 Cleared {:?}", mirror.static_tree_root());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("static_mirror=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("static_mirror=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn read_html(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {file:?}"))
}

async fn fetch_live_page(
    fetcher: &dyn HttpFetcher,
    config: &MirrorConfig,
    path: &str,
) -> Result<String> {
    let url = config
        .site()?
        .join(path)
        .with_context(|| format!("Invalid request path {path:?}"))?;
    println!("🌐 Fetching {}", url.as_str().blue());
    let response = fetch_with_retry(fetcher, url.as_str(), RetryPolicy::from(&config.fetch))
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;
    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

async fn process_all(mirror: &StaticMirror, size: usize) -> Result<()> {
    let pending = mirror.pending_count()?;
    if pending == 0 {
        println!("✅ No pending assets");
        return Ok(());
    }

    let progress_bar = ProgressBar::new(pending as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let total = mirror
        .process_all(size, |report| {
            progress_bar.inc((report.processed + report.failed) as u64);
            progress_bar.set_message(format!("{} remaining", report.remaining));
        })
        .await?;

    progress_bar.finish_with_message("✅ Asset queue drained");
    print_report(&total);
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!(
        "📦 {} processed, {} failed, {} remaining",
        report.processed.to_string().green(),
        if report.failed > 0 {
            report.failed.to_string().red()
        } else {
            report.failed.to_string().normal()
        },
        report.remaining.to_string().cyan()
    );
}

fn print_capture(path: &str, outcome: &CaptureOutcome) -> Result<()> {
    match outcome {
        CaptureOutcome::Captured {
            path: file,
            assets_found,
            assets_queued,
        } => {
            println!("✅ Captured {} to {:?}", path.green(), file);
            println!("🔗 {assets_found} assets found, {assets_queued} newly queued");
        }
        CaptureOutcome::Fresh { path: file } => {
            println!("⏭️  {} is fresh at {:?}", path.cyan(), file);
        }
        CaptureOutcome::Skipped(reason) => {
            println!("⏭️  Skipped {}: {}", path, reason);
        }
        CaptureOutcome::Disabled => {
            println!(
                "⚠️  Static capture is {}; run `static-mirror enable` first",
                "disabled".yellow()
            );
        }
        CaptureOutcome::Failed(error) => bail!("Capture of {path} failed: {error}"),
    }
    Ok(())
}

fn print_status(mirror: &StaticMirror, scheduler: &StoreScheduler) -> Result<()> {
    let status = mirror.status()?;
    let enabled = if status.enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!("📁 Static root: {:?}", status.static_root);
    println!("⚙️  Capture: {enabled}");
    println!("📄 Pages: {}", status.pages);
    println!(
        "📦 Assets: {} downloaded, {} pending, {} awaiting retry",
        status.downloaded_assets.to_string().green(),
        status.pending_assets.to_string().cyan(),
        status.failed_assets
    );
    println!("💾 Size: {}", format_bytes(status.tree_size_bytes));
    match scheduler.due_at(Job::ProcessAssets)? {
        Some(at) => println!("🕒 Next asset job due at {}", at.to_rfc3339()),
        None => println!("🕒 No asset job scheduled"),
    }
    Ok(())
}
