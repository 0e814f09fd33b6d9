use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podfetch::opml::{config_skeleton, read_opml};
use podfetch::{
    CliOverrides, Config, DateContext, ProgressEvent, ProgressReporter, ReqwestClient,
    RunOptions, SharedProgressReporter, default_config_path, load_config_or_default,
    load_last_run_and_touch, run_all,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static DRY: Emoji<'_, '_> = Emoji("💭 ", "[?] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

/// Download new podcast episodes from RSS feeds
#[derive(Parser, Debug)]
#[command(name = "podfetch")]
#[command(about = "Download new podcast episodes from RSS feeds")]
#[command(version)]
struct Args {
    /// Maximum number of files to download in this run
    #[arg(long = "downloads_limit", value_name = "N")]
    downloads_limit: Option<usize>,

    /// What to download for feeds whose directory is empty
    #[arg(long = "if_directory_empty", value_name = "POLICY")]
    if_directory_empty: Option<String>,

    /// Path to the configuration file [default: ~/.podfetch_config.json]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds to wait before each download
    #[arg(long = "download_delay", value_name = "SECONDS")]
    download_delay: Option<u64>,

    /// Show what would be downloaded without downloading it
    #[arg(long = "dry_run")]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Print a configuration skeleton for the feeds of an OPML file and exit
    #[arg(long = "from_opml", value_name = "FILE")]
    from_opml: Option<PathBuf>,
}

/// Progress reporter printing feed lines and a bar for the running download
struct ConsoleReporter {
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    fn new() -> Self {
        let main_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = ProgressBar::new_spinner();
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn start_download_bar(&self, length: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = ProgressBar::new(length);
        bar.set_style(style);

        if let Ok(mut slot) = self.download_bar.lock() {
            if let Some(previous) = slot.replace(bar.clone()) {
                previous.finish_and_clear();
            }
        }
        bar
    }

    fn take_download_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().ok().and_then(|mut slot| slot.take())
    }

    fn line(&self, message: String) {
        self.main_bar.println(message);
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FeedDisabled { podcast } => {
                self.line(format!("{SKIP}{} {}", podcast.dimmed(), "(disabled)".dimmed()));
            }

            ProgressEvent::FetchingFeed { podcast, source } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Fetching {} {}",
                    podcast.cyan(),
                    source.dimmed()
                ));
            }

            ProgressEvent::FeedChecked {
                podcast,
                total_episodes,
                missing_episodes,
                last_downloaded,
            } => {
                self.line(format!(
                    "{HEADPHONES}{} • {} episodes, {} new {}",
                    podcast.bold().green(),
                    total_episodes.to_string().cyan(),
                    missing_episodes.to_string().yellow(),
                    format!("(last: {})", last_downloaded.as_deref().unwrap_or("<none>")).dimmed()
                ));
            }

            ProgressEvent::NothingNew { .. } => {
                self.line(format!("   {}", "No new episodes".dimmed()));
            }

            ProgressEvent::EpisodeAlreadyPresent { file_name, .. } => {
                self.line(format!("   {} {}", "Already present:".dimmed(), file_name.dimmed()));
            }

            ProgressEvent::DownloadStarting {
                episode_title,
                episode_index,
                total_to_download,
                content_length,
            } => {
                let bar = self.start_download_bar(content_length.unwrap_or(0));
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total_to_download.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
            } => {
                if let Ok(slot) = self.download_bar.lock()
                    && let Some(bar) = slot.as_ref()
                {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted {
                file_name,
                bytes_downloaded,
                ..
            } => {
                if let Some(bar) = self.take_download_bar() {
                    bar.finish_and_clear();
                }
                self.line(format!(
                    "   {SUCCESS}{} {}",
                    file_name.green(),
                    format!("({})", HumanBytes(bytes_downloaded)).dimmed()
                ));
            }

            ProgressEvent::DownloadFailed {
                file_name, error, ..
            } => {
                if let Some(bar) = self.take_download_bar() {
                    bar.finish_and_clear();
                }
                self.line(format!("   {FAILURE}{} - {}", file_name.red(), error.red()));
            }

            ProgressEvent::DryRun {
                file_name, link, ..
            } => {
                self.line(format!(
                    "   {DRY}{} {} {}",
                    "[dry run]".yellow(),
                    file_name,
                    format!("<- {link}").dimmed()
                ));
            }

            ProgressEvent::LimitReached { .. } => {
                self.line(format!("   {}", "Global downloads limit reached".yellow()));
            }

            ProgressEvent::FeedFailed { podcast, error } => {
                self.line(format!("{FAILURE}{} - {}", podcast.red().bold(), error.red()));
            }

            ProgressEvent::RunCompleted {
                downloaded,
                simulated,
                skipped,
                failed_downloads,
                errors,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} simulated, {} feeds skipped, {} failed downloads, {} errors",
                    "Done:".bold().green(),
                    downloaded.to_string().green().bold(),
                    simulated.to_string().yellow(),
                    skipped.to_string().yellow(),
                    count_or_red(failed_downloads),
                    count_or_red(errors)
                );
            }
        }
    }
}

fn count_or_red(count: usize) -> colored::ColoredString {
    if count > 0 {
        count.to_string().red().bold()
    } else {
        count.to_string().green()
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,podfetch=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(opml_path) = &args.from_opml {
        let podcasts = read_opml(opml_path).context("Failed to import OPML file")?;
        println!("{}", config_skeleton(&podcasts)?);
        return Ok(());
    }

    println!(
        "\n{}{} {}\n",
        MICROPHONE,
        "podfetch".bold().magenta(),
        "- Podcast Downloader".dimmed()
    );

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let file = load_config_or_default(&config_path);

    let cli = CliOverrides {
        downloads_limit: args.downloads_limit,
        if_directory_empty: args.if_directory_empty.clone(),
        download_delay: args.download_delay,
    };
    let config = Config::from_layers(file, &cli).context("Configuration problem")?;

    let now = Local::now();
    let last_run = load_last_run_and_touch(config.last_run_mark_file_path.as_deref(), now)
        .context("Failed to read the last run marker")?;
    if let Some(last_run) = last_run {
        tracing::info!(last_run = %last_run.format("%Y-%m-%d %H:%M:%S"), "last run");
    }

    let dates = DateContext {
        today: now.date_naive(),
        last_run: last_run.map(|time| time.date_naive()),
    };

    let client = ReqwestClient::with_feed_timeout(config.feed_timeout)
        .context("Failed to create HTTP client")?;
    let reporter: SharedProgressReporter = Arc::new(ConsoleReporter::new());
    let options = RunOptions {
        dry_run: args.dry_run,
    };

    let summary = run_all(&client, &config, &dates, &options, &reporter).await;

    if summary.errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
