pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod marker;
pub mod opml;
pub mod progress;
pub mod selection;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::{
    CliOverrides, Config, ConfigFile, FeedOverrides, FeedSettings, PodcastConfig,
    default_config_path, load_config_file, load_config_or_default,
};
pub use episode::{Episode, FileNameLimit, FileNamer};
pub use error::{ConfigError, DownloadError, FeedError, OpmlError, StateError, SyncError};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use marker::load_last_run_and_touch;
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use selection::{DateContext, EmptyDirectoryPolicy, NoOverlapPolicy, SelectionOptions};
pub use sync::{DownloadBudget, FeedOutcome, RunOptions, RunSummary, run_all, sync_feed};
