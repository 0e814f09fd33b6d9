use std::sync::Arc;

/// Events emitted while a run walks its feeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Feed is marked `disable` in the configuration
    FeedDisabled { podcast: String },

    /// Feed is being fetched from a URL or read from disk
    FetchingFeed { podcast: String, source: String },

    /// Feed was compared against the podcast directory
    FeedChecked {
        podcast: String,
        /// Episodes in the feed with an allowed MIME type
        total_episodes: usize,
        /// Episodes selected for download
        missing_episodes: usize,
        /// Rendered name the selection resumed from, if any
        last_downloaded: Option<String>,
    },

    /// Nothing to download for this feed
    NothingNew { podcast: String },

    /// A selected episode turned out to be on disk already
    EpisodeAlreadyPresent { podcast: String, file_name: String },

    /// A download is starting
    DownloadStarting {
        episode_title: String,
        /// Index of this episode in the feed's download queue
        episode_index: usize,
        /// Total number of episodes queued for the feed
        total_to_download: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_title: String,
        file_name: String,
        bytes_downloaded: u64,
    },

    /// A download failed; the feed carries on with its next episode
    DownloadFailed {
        episode_title: String,
        file_name: String,
        error: String,
    },

    /// Dry run: the episode would have been downloaded
    DryRun {
        podcast: String,
        file_name: String,
        link: String,
    },

    /// The global download limit stopped this feed's downloads
    LimitReached { podcast: String },

    /// The feed could not be processed at all
    FeedFailed { podcast: String, error: String },

    /// All feeds have been visited
    RunCompleted {
        downloaded: usize,
        /// Dry-run episodes that would have been downloaded
        simulated: usize,
        /// Feeds that were disabled or had nothing new
        skipped: usize,
        /// Episodes whose transfer failed
        failed_downloads: usize,
        /// Feeds that could not be processed
        errors: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// The library never prints; implementations decide whether events become
/// console output, log lines or collected statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Collecting {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            podcast: "Test Podcast".to_string(),
            source: "https://example.com/feed.xml".to_string(),
        });

        reporter.report(ProgressEvent::DownloadFailed {
            episode_title: "Episode 2".to_string(),
            file_name: "episode-2.mp3".to_string(),
            error: "Connection timeout".to_string(),
        });

        reporter.report(ProgressEvent::RunCompleted {
            downloaded: 4,
            simulated: 0,
            skipped: 5,
            failed_downloads: 2,
            errors: 1,
        });
    }

    #[test]
    fn shared_reporter_forwards_events() {
        let collecting = Arc::new(Collecting::default());
        let shared: SharedProgressReporter = collecting.clone();

        shared.report(ProgressEvent::NothingNew {
            podcast: "Quiet Show".to_string(),
        });

        assert_eq!(
            *collecting.0.lock().unwrap(),
            vec![ProgressEvent::NothingNew {
                podcast: "Quiet Show".to_string()
            }]
        );
    }
}
