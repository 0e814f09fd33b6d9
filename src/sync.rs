// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PodcastConfig};
use crate::episode::{
    DownloadContext, FileNameLimit, FileNamer, allowed_mime_types, download_episode, normalize,
};
use crate::error::{DownloadError, SyncError};
use crate::feed::load_feed;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::selection::{Candidate, DateContext, select_missing};
use crate::state::downloaded_files;

/// Options that apply to the whole run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Report what would be downloaded without transferring or writing anything
    pub dry_run: bool,
}

/// Downloads still allowed in this run, shared by all feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadBudget {
    remaining: usize,
}

impl DownloadBudget {
    pub fn new(limit: usize) -> Self {
        Self { remaining: limit }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Result of processing one feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Configured name, else the feed title
    pub podcast: String,
    /// Episodes transferred to disk
    pub downloaded: usize,
    /// Episodes a dry run would have transferred
    pub simulated: usize,
    /// Selected episodes that were already on disk
    pub already_present: usize,
    /// Title and error of every failed transfer
    pub failed_episodes: Vec<(String, String)>,
    /// The selection found nothing to download
    pub nothing_new: bool,
    /// The global budget ran out before the feed was done
    pub limit_reached: bool,
}

/// Totals over all feeds of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub simulated: usize,
    /// Feeds that were disabled or had nothing new
    pub skipped: usize,
    pub failed_downloads: usize,
    /// Feeds that ended in an error
    pub errors: usize,
}

/// Process one feed: fetch, select the missing episodes and download them
/// oldest first.
///
/// Transfer failures are recorded per episode and never end the feed. The
/// budget is decremented for every download, simulated ones included.
pub async fn sync_feed<C: HttpClient>(
    client: &C,
    podcast: &PodcastConfig,
    file_name_limit: FileNameLimit,
    dates: &DateContext,
    budget: &mut DownloadBudget,
    options: &RunOptions,
    reporter: &SharedProgressReporter,
) -> Result<FeedOutcome, SyncError> {
    let settings = podcast.overrides.resolve()?;

    reporter.report(ProgressEvent::FetchingFeed {
        podcast: podcast.label().to_string(),
        source: podcast.rss_link.clone(),
    });

    let feed = load_feed(client, &podcast.rss_link, &settings.http_headers).await?;

    let name = podcast
        .name
        .clone()
        .or(feed.title)
        .unwrap_or_else(|| podcast.rss_link.clone());
    info!(podcast = %name, "checking feed");

    let episodes = normalize(
        &feed.entries,
        &allowed_mime_types(&settings.podcast_extensions),
    );

    let namer = FileNamer::new(
        settings.file_name_template.as_str(),
        file_name_limit.for_directory(&podcast.path),
    );

    let mut present: HashSet<String> =
        downloaded_files(&podcast.path, &settings.podcast_extensions)?
            .into_iter()
            .collect();

    let selection = select_missing(&episodes, &present, &settings.selection, dates, |episode| {
        namer.render(episode)
    })?;

    debug!(
        podcast = %name,
        feed_files = ?episodes.iter().map(|e| namer.render(e)).collect::<Vec<_>>(),
        on_disk = ?present,
        last_downloaded = ?selection.last_downloaded,
        "selection inputs"
    );

    reporter.report(ProgressEvent::FeedChecked {
        podcast: name.clone(),
        total_episodes: episodes.len(),
        missing_episodes: selection.missing.len(),
        last_downloaded: selection.last_downloaded.clone(),
    });

    let mut outcome = FeedOutcome {
        podcast: name.clone(),
        ..FeedOutcome::default()
    };

    if selection.missing.is_empty() {
        reporter.report(ProgressEvent::NothingNew { podcast: name });
        outcome.nothing_new = true;
        return Ok(outcome);
    }

    let total_to_download = selection.missing.len();
    let mut directory_ready = false;

    for (episode_index, candidate) in selection.download_order().enumerate() {
        if present.contains(&candidate.file_name) {
            reporter.report(ProgressEvent::EpisodeAlreadyPresent {
                podcast: name.clone(),
                file_name: candidate.file_name.clone(),
            });
            outcome.already_present += 1;
            continue;
        }

        if budget.is_exhausted() {
            info!(podcast = %name, "global downloads limit reached");
            reporter.report(ProgressEvent::LimitReached {
                podcast: name.clone(),
            });
            outcome.limit_reached = true;
            break;
        }

        if !settings.download_delay.is_zero() {
            debug!(delay = ?settings.download_delay, "waiting before next download");
            tokio::time::sleep(settings.download_delay).await;
        }

        if options.dry_run {
            reporter.report(ProgressEvent::DryRun {
                podcast: name.clone(),
                file_name: candidate.file_name.clone(),
                link: candidate.episode.link.clone(),
            });
            outcome.simulated += 1;
            budget.consume();
            continue;
        }

        if !directory_ready {
            if let Err(e) = tokio::fs::create_dir_all(&podcast.path).await {
                let e = DownloadError::CreateDirectoryFailed {
                    path: podcast.path.clone(),
                    source: e,
                };
                record_failure(&mut outcome, candidate, &e, reporter);
                continue;
            }
            directory_ready = true;
        }

        let context = DownloadContext {
            episode_index,
            total_to_download,
        };
        let result = download_episode(
            client,
            candidate.episode,
            &settings.http_headers,
            &podcast.path.join(&candidate.file_name),
            &context,
            reporter,
        )
        .await;

        match result {
            Ok(_) => {
                outcome.downloaded += 1;
                budget.consume();
                present.insert(candidate.file_name.clone());
            }
            Err(e) => record_failure(&mut outcome, candidate, &e, reporter),
        }
    }

    Ok(outcome)
}

/// Process every configured feed in order.
///
/// A failing feed, even one that panics, is counted and reported, and the
/// run moves on to the next feed.
pub async fn run_all<C: HttpClient>(
    client: &C,
    config: &Config,
    dates: &DateContext,
    options: &RunOptions,
    reporter: &SharedProgressReporter,
) -> RunSummary {
    let mut budget = DownloadBudget::new(config.downloads_limit);
    let mut summary = RunSummary::default();

    for podcast in &config.podcasts {
        if podcast.disable {
            info!(podcast = %podcast.label(), "skipping disabled feed");
            reporter.report(ProgressEvent::FeedDisabled {
                podcast: podcast.label().to_string(),
            });
            summary.skipped += 1;
            continue;
        }

        let result = AssertUnwindSafe(sync_feed(
            client,
            podcast,
            config.file_name_limit,
            dates,
            &mut budget,
            options,
            reporter,
        ))
        .catch_unwind()
        .await;

        let error = match result {
            Ok(Ok(outcome)) => {
                summary.downloaded += outcome.downloaded;
                summary.simulated += outcome.simulated;
                summary.failed_downloads += outcome.failed_episodes.len();
                if outcome.nothing_new {
                    summary.skipped += 1;
                }
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("unexpected failure: {}", panic_message(panic.as_ref())),
        };

        error!(podcast = %podcast.label(), error = %error, "failed to process feed");
        reporter.report(ProgressEvent::FeedFailed {
            podcast: podcast.label().to_string(),
            error,
        });
        summary.errors += 1;
    }

    reporter.report(ProgressEvent::RunCompleted {
        downloaded: summary.downloaded,
        simulated: summary.simulated,
        skipped: summary.skipped,
        failed_downloads: summary.failed_downloads,
        errors: summary.errors,
    });

    summary
}

fn record_failure(
    outcome: &mut FeedOutcome,
    candidate: &Candidate<'_>,
    error: &DownloadError,
    reporter: &SharedProgressReporter,
) {
    warn!(
        podcast = %outcome.podcast,
        link = %candidate.episode.link,
        error = %error,
        "episode download failed"
    );
    reporter.report(ProgressEvent::DownloadFailed {
        episode_title: candidate.episode.title.clone(),
        file_name: candidate.file_name.clone(),
        error: error.to_string(),
    });
    outcome
        .failed_episodes
        .push((candidate.episode.title.clone(), error.to_string()));
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "panic"
    }
}
