use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MirrorConfig;
use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "static-mirror",
    about = "Captures a live site into a self-contained static mirror",
    version,
    long_about = "Keeps an offline-browsable static copy of a live site. Rendered pages are captured one request at a time, their stylesheets, scripts, images and fonts are downloaded into a flat assets/ directory, and every reference is rewritten to work from disk."
)]
pub struct MirrorCommand {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Public base URL of the live site (overrides the config file)
    #[arg(long, global = true)]
    pub site_url: Option<String>,

    /// Static tree root (overrides the config file)
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start capturing pages
    Enable,
    /// Stop capturing pages
    Disable,
    /// Show capture and asset queue state
    Status,
    /// Capture one page as an anonymous visitor would see it
    Capture {
        /// Request path, e.g. /blog/post/
        path: String,

        /// Read the rendered HTML from this file instead of fetching the page
        #[arg(long)]
        html_file: Option<PathBuf>,
    },
    /// Download pending assets
    Process {
        /// Assets per batch (defaults to the interactive batch size)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        batch: Option<u32>,

        /// Keep processing batches until the queue is empty
        #[arg(long)]
        all: bool,
    },
    /// Run deferred jobs that are due
    Cron,
    /// Pack the static tree into a ZIP archive
    Zip {
        /// Archive path (defaults to a timestamped file next to the static root)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete the static tree and all asset state
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

impl MirrorCommand {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn load_config(&self) -> Result<MirrorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => MirrorConfig::from_file(path)?,
            None => MirrorConfig::default(),
        };
        if let Some(site_url) = &self.site_url {
            config.site_url = site_url.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
