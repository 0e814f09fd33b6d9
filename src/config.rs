// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layered configuration: defaults, the JSON file, per-feed entries and
//! command line flags, in increasing order of precedence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::episode::{DEFAULT_TEMPLATE, FileNameLimit};
use crate::error::ConfigError;
use crate::http::{DEFAULT_FEED_TIMEOUT, Headers};
use crate::selection::{EmptyDirectoryPolicy, NoOverlapPolicy, SelectionOptions};

/// Configuration file looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".podfetch_config.json";

/// User agent sent unless `http_headers` says otherwise
pub const USER_AGENT: &str = concat!("podfetch/", env!("CARGO_PKG_VERSION"));

/// Settings that may be given globally and overridden per feed.
///
/// Every field is optional so that layers can be stacked with [`FeedOverrides::or`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedOverrides {
    pub file_name_template: Option<String>,
    pub podcast_extensions: Option<BTreeMap<String, String>>,
    pub if_directory_empty: Option<String>,
    pub if_no_overlap: Option<String>,
    pub fill_up_gaps: Option<bool>,
    /// Seconds to wait before each download
    pub download_delay: Option<u64>,
    pub http_headers: Option<BTreeMap<String, String>>,
}

impl FeedOverrides {
    /// Fill every unset field from `fallback`. Maps are taken whole.
    pub fn or(self, fallback: &FeedOverrides) -> FeedOverrides {
        FeedOverrides {
            file_name_template: self
                .file_name_template
                .or_else(|| fallback.file_name_template.clone()),
            podcast_extensions: self
                .podcast_extensions
                .or_else(|| fallback.podcast_extensions.clone()),
            if_directory_empty: self
                .if_directory_empty
                .or_else(|| fallback.if_directory_empty.clone()),
            if_no_overlap: self.if_no_overlap.or_else(|| fallback.if_no_overlap.clone()),
            fill_up_gaps: self.fill_up_gaps.or(fallback.fill_up_gaps),
            download_delay: self.download_delay.or(fallback.download_delay),
            http_headers: self.http_headers.or_else(|| fallback.http_headers.clone()),
        }
    }

    /// Apply built-in defaults and parse the policy strings
    pub fn resolve(&self) -> Result<FeedSettings, ConfigError> {
        let empty_directory = match &self.if_directory_empty {
            Some(policy) => policy.parse()?,
            None => EmptyDirectoryPolicy::DownloadLast,
        };
        let no_overlap = match &self.if_no_overlap {
            Some(policy) => policy.parse()?,
            None => NoOverlapPolicy::default(),
        };

        Ok(FeedSettings {
            file_name_template: self
                .file_name_template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            podcast_extensions: self
                .podcast_extensions
                .clone()
                .unwrap_or_else(default_podcast_extensions),
            selection: SelectionOptions {
                empty_directory,
                no_overlap,
                fill_up_gaps: self.fill_up_gaps.unwrap_or(false),
            },
            download_delay: Duration::from_secs(self.download_delay.unwrap_or(0)),
            http_headers: self.http_headers.clone().unwrap_or_else(default_http_headers),
        })
    }
}

fn default_podcast_extensions() -> BTreeMap<String, String> {
    BTreeMap::from([(".mp3".to_string(), "audio/mpeg".to_string())])
}

fn default_http_headers() -> Headers {
    Headers::from([("User-Agent".to_string(), USER_AGENT.to_string())])
}

/// Effective settings of one feed, after layering and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub file_name_template: String,
    /// File extension (with dot) to MIME type
    pub podcast_extensions: BTreeMap<String, String>,
    pub selection: SelectionOptions,
    pub download_delay: Duration,
    pub http_headers: Headers,
}

/// One entry of the `podcasts` array, as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodcastEntry {
    pub name: Option<String>,
    pub path: Option<String>,
    pub rss_link: Option<String>,
    pub disable: bool,
    #[serde(flatten)]
    pub overrides: FeedOverrides,
}

/// The configuration file as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub downloads_limit: Option<usize>,
    pub last_run_mark_file_path: Option<String>,
    /// Seconds before a feed request is abandoned
    pub feed_timeout: Option<u64>,
    /// Fixed file name budget replacing the platform rule
    pub max_file_name_length: Option<usize>,
    #[serde(flatten)]
    pub defaults: FeedOverrides,
    pub podcasts: Vec<PodcastEntry>,
}

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub downloads_limit: Option<usize>,
    pub if_directory_empty: Option<String>,
    pub download_delay: Option<u64>,
}

impl CliOverrides {
    fn as_feed_overrides(&self) -> FeedOverrides {
        FeedOverrides {
            if_directory_empty: self.if_directory_empty.clone(),
            download_delay: self.download_delay,
            ..FeedOverrides::default()
        }
    }
}

/// A validated feed from the `podcasts` array
#[derive(Debug, Clone)]
pub struct PodcastConfig {
    /// Display name; the feed title is used when absent
    pub name: Option<String>,
    pub path: PathBuf,
    /// HTTP(S) URL or local file path
    pub rss_link: String,
    pub disable: bool,
    /// CLI, feed and global layers already combined
    pub overrides: FeedOverrides,
}

impl PodcastConfig {
    /// Name for messages before the feed has been fetched
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.rss_link)
    }
}

/// The validated configuration of a run
#[derive(Debug, Clone)]
pub struct Config {
    pub downloads_limit: usize,
    pub last_run_mark_file_path: Option<PathBuf>,
    pub feed_timeout: Duration,
    pub file_name_limit: FileNameLimit,
    pub podcasts: Vec<PodcastConfig>,
}

impl Config {
    /// Combine the file with the command line and validate every feed.
    ///
    /// Fails on the first podcast lacking `path` or `rss_link`.
    pub fn from_layers(file: ConfigFile, cli: &CliOverrides) -> Result<Config, ConfigError> {
        let cli_layer = cli.as_feed_overrides();

        let podcasts = file
            .podcasts
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let podcast = entry
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("unnamed podcast at index {index}"));

                let path = entry.path.ok_or_else(|| ConfigError::MissingField {
                    field: "path",
                    podcast: podcast.clone(),
                })?;
                let rss_link = entry.rss_link.ok_or(ConfigError::MissingField {
                    field: "rss_link",
                    podcast,
                })?;

                Ok(PodcastConfig {
                    name: entry.name,
                    path: expand_tilde(&path),
                    rss_link,
                    disable: entry.disable,
                    overrides: cli_layer.clone().or(&entry.overrides.or(&file.defaults)),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let file_name_limit = match file.max_file_name_length {
            Some(length) => FileNameLimit::Fixed(length),
            None => FileNameLimit::platform_default(),
        };

        Ok(Config {
            downloads_limit: cli
                .downloads_limit
                .or(file.downloads_limit)
                .unwrap_or(usize::MAX),
            last_run_mark_file_path: file
                .last_run_mark_file_path
                .as_deref()
                .filter(|path| !path.is_empty())
                .map(expand_tilde),
            feed_timeout: file
                .feed_timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FEED_TIMEOUT),
            file_name_limit,
            podcasts,
        })
    }
}

/// Read and parse a configuration file
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::JsonParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Like [`load_config_file`], but a missing or broken file only produces a
/// warning and an empty configuration
pub fn load_config_or_default(path: &Path) -> ConfigFile {
    debug!(path = %path.display(), "loading configuration file");

    match load_config_file(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "could not load configuration file, using defaults");
            ConfigFile::default()
        }
    }
}

/// `~/.podfetch_config.json`, or the bare file name without a home directory
pub fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_CONFIG_FILE),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(raw),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::DayLabel;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn parse(json: &str) -> ConfigFile {
        serde_json::from_str(json).unwrap()
    }

    const SAMPLE: &str = r#"{
        "downloads_limit": 5,
        "if_directory_empty": "download_from_3_days",
        "podcast_extensions": {".mp3": "audio/mpeg", ".m4a": "audio/mp4"},
        "fill_up_gaps": true,
        "feed_timeout": 15,
        "podcasts": [
            {
                "name": "Weekly",
                "path": "/pods/weekly",
                "rss_link": "https://example.com/weekly.xml",
                "if_directory_empty": "download_from_friday",
                "podcast_extensions": {".ogg": "audio/ogg"}
            },
            {
                "path": "/pods/daily",
                "rss_link": "https://example.com/daily.xml",
                "disable": true,
                "download_delay": 2
            }
        ]
    }"#;

    #[test]
    fn per_feed_values_override_global_ones() {
        let config = Config::from_layers(parse(SAMPLE), &CliOverrides::default()).unwrap();

        let weekly = config.podcasts[0].overrides.resolve().unwrap();
        assert_eq!(
            weekly.selection.empty_directory,
            EmptyDirectoryPolicy::FromDay(DayLabel::Weekday(chrono::Weekday::Fri))
        );
        assert_eq!(
            weekly.podcast_extensions,
            BTreeMap::from([(".ogg".to_string(), "audio/ogg".to_string())])
        );
        assert!(weekly.selection.fill_up_gaps);

        let daily = config.podcasts[1].overrides.resolve().unwrap();
        assert_eq!(daily.selection.empty_directory, EmptyDirectoryPolicy::FromDays(3));
        assert_eq!(daily.podcast_extensions.len(), 2);
        assert_eq!(daily.download_delay, Duration::from_secs(2));
        assert!(config.podcasts[1].disable);
    }

    #[test]
    fn command_line_beats_everything() {
        let cli = CliOverrides {
            downloads_limit: Some(1),
            if_directory_empty: Some("download_all_from_feed".to_string()),
            download_delay: Some(9),
        };
        let config = Config::from_layers(parse(SAMPLE), &cli).unwrap();

        assert_eq!(config.downloads_limit, 1);
        for podcast in &config.podcasts {
            let settings = podcast.overrides.resolve().unwrap();
            assert_eq!(settings.selection.empty_directory, EmptyDirectoryPolicy::DownloadAll);
            assert_eq!(settings.download_delay, Duration::from_secs(9));
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_layers(
            parse(r#"{"podcasts": [{"path": "/p", "rss_link": "feed.xml"}]}"#),
            &CliOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.downloads_limit, usize::MAX);
        assert_eq!(config.feed_timeout, DEFAULT_FEED_TIMEOUT);
        assert_eq!(config.last_run_mark_file_path, None);
        assert_eq!(config.file_name_limit, FileNameLimit::platform_default());

        let settings = config.podcasts[0].overrides.resolve().unwrap();
        assert_eq!(
            settings,
            FeedSettings {
                file_name_template: "%title%.%file_extension%".to_string(),
                podcast_extensions: default_podcast_extensions(),
                selection: SelectionOptions {
                    empty_directory: EmptyDirectoryPolicy::DownloadLast,
                    no_overlap: NoOverlapPolicy::DownloadAll,
                    fill_up_gaps: false,
                },
                download_delay: Duration::ZERO,
                http_headers: default_http_headers(),
            }
        );
        assert_eq!(config.podcasts[0].label(), "feed.xml");
    }

    #[test]
    fn fixed_file_name_length_replaces_platform_rule() {
        let config = Config::from_layers(
            parse(r#"{"max_file_name_length": 80}"#),
            &CliOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.file_name_limit, FileNameLimit::Fixed(80));
    }

    #[test]
    fn missing_path_is_reported_with_podcast_name() {
        let result = Config::from_layers(
            parse(r#"{"podcasts": [{"name": "Nameless", "rss_link": "x"}]}"#),
            &CliOverrides::default(),
        );

        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field: "path", ref podcast }) if podcast == "Nameless"
        ));
    }

    #[test]
    fn missing_rss_link_is_reported_with_index() {
        let result = Config::from_layers(
            parse(r#"{"podcasts": [{"path": "/a", "rss_link": "x"}, {"path": "/b"}]}"#),
            &CliOverrides::default(),
        );

        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field: "rss_link", ref podcast })
                if podcast == "unnamed podcast at index 1"
        ));
    }

    #[test]
    fn unrecognized_policy_fails_resolution() {
        let overrides = FeedOverrides {
            if_directory_empty: Some("download_whatever".to_string()),
            ..FeedOverrides::default()
        };

        assert!(matches!(
            overrides.resolve(),
            Err(ConfigError::UnrecognizedPolicy(value)) if value == "download_whatever"
        ));
    }

    #[test]
    fn unrecognized_no_overlap_policy_fails_resolution() {
        let overrides = FeedOverrides {
            if_no_overlap: Some("panic".to_string()),
            ..FeedOverrides::default()
        };

        assert!(overrides.resolve().is_err());
    }

    #[test]
    fn maps_are_replaced_not_merged() {
        let global = FeedOverrides {
            http_headers: Some(BTreeMap::from([
                ("User-Agent".to_string(), "global".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ])),
            ..FeedOverrides::default()
        };
        let feed = FeedOverrides {
            http_headers: Some(BTreeMap::from([(
                "User-Agent".to_string(),
                "feed".to_string(),
            )])),
            ..FeedOverrides::default()
        };

        let headers = feed.or(&global).http_headers.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["User-Agent"], "feed");
    }

    #[test]
    fn load_config_file_reports_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::JsonParseFailed { .. })
        ));
        assert!(load_config_or_default(&path).podcasts.is_empty());
    }

    #[test]
    fn load_config_or_default_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let file = load_config_or_default(&dir.path().join("absent.json"));

        assert!(file.podcasts.is_empty());
        assert_eq!(file.downloads_limit, None);
    }

    #[test]
    fn expand_tilde_only_touches_leading_home() {
        let home = dirs::home_dir().unwrap();

        assert_eq!(expand_tilde("~/pods"), home.join("pods"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("/abs/~/pods"), PathBuf::from("/abs/~/pods"));
        assert_eq!(expand_tilde("~someone/pods"), PathBuf::from("~someone/pods"));
    }
}
