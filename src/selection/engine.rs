// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use crate::episode::Episode;
use crate::error::ConfigError;

use super::policy::{DateContext, EmptyDirectoryPolicy, NoOverlapPolicy};

/// An episode paired with its rendered file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub episode: &'a Episode,
    pub file_name: String,
}

impl AsRef<Episode> for Candidate<'_> {
    fn as_ref(&self) -> &Episode {
        self.episode
    }
}

/// Per-feed knobs of the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOptions {
    pub empty_directory: EmptyDirectoryPolicy,
    pub no_overlap: NoOverlapPolicy,
    pub fill_up_gaps: bool,
}

/// Outcome of comparing a feed against the files on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    /// Episodes to download, newest first
    pub missing: Vec<Candidate<'a>>,
    /// Rendered name of the episode the missing set was measured from
    pub last_downloaded: Option<String>,
}

impl<'a> Selection<'a> {
    /// Missing episodes oldest first, the order they are downloaded in
    pub fn download_order(&self) -> impl Iterator<Item = &Candidate<'a>> {
        self.missing.iter().rev()
    }
}

/// Decide which episodes of a feed are missing from disk.
///
/// `episodes` must be newest first. `render` must be the same function
/// that produced the names in `on_disk`, since rendered names are the only
/// link between the feed and the directory.
pub fn select_missing<'a, F>(
    episodes: &'a [Episode],
    on_disk: &HashSet<String>,
    options: &SelectionOptions,
    dates: &DateContext,
    render: F,
) -> Result<Selection<'a>, ConfigError>
where
    F: Fn(&Episode) -> String,
{
    let candidates: Vec<Candidate<'a>> = episodes
        .iter()
        .map(|episode| Candidate {
            episode,
            file_name: render(episode),
        })
        .collect();

    if on_disk.is_empty() {
        let missing = options
            .empty_directory
            .apply(&candidates, dates)?
            .into_iter()
            .cloned()
            .collect();

        return Ok(Selection {
            missing,
            last_downloaded: None,
        });
    }

    let Some(boundary) = find_boundary(&candidates, on_disk, options.fill_up_gaps) else {
        let missing = match options.no_overlap {
            NoOverlapPolicy::DownloadAll => candidates,
            NoOverlapPolicy::DownloadNothing => Vec::new(),
            NoOverlapPolicy::AsEmptyDirectory => options
                .empty_directory
                .apply(&candidates, dates)?
                .into_iter()
                .cloned()
                .collect(),
        };

        return Ok(Selection {
            missing,
            last_downloaded: None,
        });
    };

    let missing = take_until(candidates, &boundary);

    Ok(Selection {
        missing,
        last_downloaded: Some(boundary),
    })
}

/// The rendered name downloads resume from, `None` if nothing in the feed is on disk
fn find_boundary(
    candidates: &[Candidate<'_>],
    on_disk: &HashSet<String>,
    fill_up_gaps: bool,
) -> Option<String> {
    let ordered_files: Vec<&str> = candidates
        .iter()
        .rev()
        .map(|candidate| candidate.file_name.as_str())
        .collect();

    let downloaded_in_feed: Vec<&str> = ordered_files
        .iter()
        .copied()
        .filter(|file| on_disk.contains(*file))
        .collect();

    let newest_downloaded = *downloaded_in_feed.last()?;

    let boundary = if fill_up_gaps {
        last_downloaded_before_gap(&ordered_files, on_disk).unwrap_or(newest_downloaded)
    } else {
        newest_downloaded
    };

    Some(boundary.to_string())
}

/// Walk oldest to newest and return the last downloaded file before the
/// first missing one. Without a gap this is the newest downloaded file.
pub fn last_downloaded_before_gap<'f>(
    ordered_files: &[&'f str],
    on_disk: &HashSet<String>,
) -> Option<&'f str> {
    let mut last_seen = None;

    for &file in ordered_files {
        if on_disk.contains(file) {
            last_seen = Some(file);
        } else if last_seen.is_some() {
            return last_seen;
        }
    }

    last_seen
}

/// Newest-first prefix up to (excluding) the boundary
fn take_until<'a>(candidates: Vec<Candidate<'a>>, boundary: &str) -> Vec<Candidate<'a>> {
    candidates
        .into_iter()
        .take_while(|candidate| candidate.file_name != boundary)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::FileNamer;
    use crate::selection::DayLabel;
    use chrono::{NaiveDate, TimeZone, Utc, Weekday};
    use pretty_assertions::assert_eq;

    /// Episodes e{count}..e1, newest first, e{n} published on Jan 10+n
    fn feed(count: u32) -> Vec<Episode> {
        (1..=count)
            .rev()
            .map(|n| Episode {
                published_date: Utc.with_ymd_and_hms(2024, 1, 10 + n, 6, 0, 0).unwrap(),
                title: format!("Episode {n}"),
                mime_type: "audio/mpeg".to_string(),
                link: format!("https://example.com/feed/e{n}.mp3"),
            })
            .collect()
    }

    fn namer() -> FileNamer {
        FileNamer::new("%file_name%.%file_extension%", 255)
    }

    fn disk(files: &[&str]) -> HashSet<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    fn options(empty_directory: EmptyDirectoryPolicy, fill_up_gaps: bool) -> SelectionOptions {
        SelectionOptions {
            empty_directory,
            no_overlap: NoOverlapPolicy::DownloadAll,
            fill_up_gaps,
        }
    }

    fn dates() -> DateContext {
        DateContext {
            today: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            last_run: None,
        }
    }

    fn names(selection: &Selection<'_>) -> Vec<String> {
        selection
            .missing
            .iter()
            .map(|c| c.file_name.clone())
            .collect()
    }

    fn select<'a>(
        episodes: &'a [Episode],
        on_disk: &HashSet<String>,
        options: &SelectionOptions,
    ) -> Selection<'a> {
        let namer = namer();
        select_missing(episodes, on_disk, options, &dates(), |e| namer.render(e)).unwrap()
    }

    // === Gap scan ===

    #[test]
    fn gap_scan_stops_at_first_gap() {
        let on_disk = disk(&["e1.mp3", "e2.mp3", "e4.mp3", "e5.mp3"]);
        let files = ["e1.mp3", "e2.mp3", "e3.mp3", "e4.mp3", "e5.mp3"];
        assert_eq!(last_downloaded_before_gap(&files, &on_disk), Some("e2.mp3"));
    }

    #[test]
    fn gap_scan_ignores_missing_prefix() {
        let on_disk = disk(&["e3.mp3", "e4.mp3"]);
        let files = ["e1.mp3", "e2.mp3", "e3.mp3", "e4.mp3", "e5.mp3"];
        assert_eq!(last_downloaded_before_gap(&files, &on_disk), Some("e4.mp3"));
    }

    #[test]
    fn gap_scan_without_gap_returns_newest() {
        let on_disk = disk(&["e1.mp3", "e2.mp3", "e3.mp3"]);
        let files = ["e1.mp3", "e2.mp3", "e3.mp3"];
        assert_eq!(last_downloaded_before_gap(&files, &on_disk), Some("e3.mp3"));
    }

    #[test]
    fn gap_scan_without_downloads_returns_none() {
        let files = ["e1.mp3", "e2.mp3"];
        assert_eq!(last_downloaded_before_gap(&files, &disk(&["other.mp3"])), None);
    }

    // === Overlap cases ===

    #[test]
    fn fill_up_gaps_resumes_at_gap() {
        let episodes = feed(5);
        let on_disk = disk(&["e5.mp3", "e4.mp3", "e2.mp3", "e1.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, true),
        );

        assert_eq!(selection.last_downloaded.as_deref(), Some("e2.mp3"));
        assert_eq!(names(&selection), vec!["e5.mp3", "e4.mp3", "e3.mp3"]);
    }

    #[test]
    fn without_gap_filling_resumes_after_newest_download() {
        let episodes = feed(5);
        let on_disk = disk(&["e5.mp3", "e4.mp3", "e2.mp3", "e1.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        assert_eq!(selection.last_downloaded.as_deref(), Some("e5.mp3"));
        assert!(selection.missing.is_empty());
    }

    #[test]
    fn new_episodes_after_last_download_are_missing() {
        let episodes = feed(5);
        let on_disk = disk(&["e2.mp3", "e1.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        assert_eq!(selection.last_downloaded.as_deref(), Some("e2.mp3"));
        assert_eq!(names(&selection), vec!["e5.mp3", "e4.mp3", "e3.mp3"]);
    }

    #[test]
    fn download_order_is_oldest_first() {
        let episodes = feed(4);
        let on_disk = disk(&["e1.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        let order: Vec<_> = selection
            .download_order()
            .map(|c| c.file_name.as_str())
            .collect();
        assert_eq!(order, vec!["e2.mp3", "e3.mp3", "e4.mp3"]);
    }

    #[test]
    fn unrelated_files_on_disk_are_ignored() {
        let episodes = feed(3);
        let on_disk = disk(&["e1.mp3", "something-else.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        assert_eq!(names(&selection), vec!["e3.mp3", "e2.mp3"]);
    }

    #[test]
    fn selection_is_idempotent() {
        let episodes = feed(5);
        let on_disk = disk(&["e2.mp3", "e4.mp3"]);
        let opts = options(EmptyDirectoryPolicy::DownloadLast, true);

        let first = select(&episodes, &on_disk, &opts);
        let second = select(&episodes, &on_disk, &opts);

        assert_eq!(first, second);
    }

    // === Empty directory ===

    #[test]
    fn empty_directory_download_last() {
        let episodes = feed(3);
        let selection = select(
            &episodes,
            &HashSet::new(),
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        assert_eq!(selection.last_downloaded, None);
        assert_eq!(names(&selection), vec!["e3.mp3"]);
    }

    #[test]
    fn empty_directory_download_from_days() {
        // today is Jan 16; e5 is Jan 15, e3 Jan 13 (the cutoff day), e2 Jan 12
        let episodes = feed(5);
        let selection = select(
            &episodes,
            &HashSet::new(),
            &options(EmptyDirectoryPolicy::FromDays(3), false),
        );

        assert_eq!(names(&selection), vec!["e5.mp3", "e4.mp3", "e3.mp3"]);
    }

    #[test]
    fn empty_directory_download_from_weekday() {
        // Jan 16 2024 is a Tuesday; the previous Saturday is Jan 13
        let episodes = feed(5);
        let selection = select(
            &episodes,
            &HashSet::new(),
            &options(EmptyDirectoryPolicy::FromDay(DayLabel::Weekday(Weekday::Sat)), false),
        );

        assert_eq!(names(&selection), vec!["e5.mp3", "e4.mp3", "e3.mp3"]);
    }

    #[test]
    fn empty_directory_policy_errors_propagate() {
        let episodes = feed(2);
        let namer = namer();
        let result = select_missing(
            &episodes,
            &HashSet::new(),
            &options(EmptyDirectoryPolicy::SinceLastRun, false),
            &dates(),
            |e| namer.render(e),
        );

        assert!(matches!(result, Err(ConfigError::MissingLastRunMarker)));
    }

    // === No overlap ===

    #[test]
    fn no_overlap_downloads_whole_feed_by_default() {
        let episodes = feed(3);
        let on_disk = disk(&["renamed-episode.mp3"]);

        let selection = select(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
        );

        assert_eq!(selection.last_downloaded, None);
        assert_eq!(names(&selection), vec!["e3.mp3", "e2.mp3", "e1.mp3"]);
    }

    #[test]
    fn no_overlap_can_download_nothing() {
        let episodes = feed(3);
        let on_disk = disk(&["renamed-episode.mp3"]);
        let opts = SelectionOptions {
            no_overlap: NoOverlapPolicy::DownloadNothing,
            ..options(EmptyDirectoryPolicy::DownloadLast, false)
        };

        assert!(select(&episodes, &on_disk, &opts).missing.is_empty());
    }

    #[test]
    fn no_overlap_can_fall_back_to_empty_directory_policy() {
        let episodes = feed(3);
        let on_disk = disk(&["renamed-episode.mp3"]);
        let opts = SelectionOptions {
            no_overlap: NoOverlapPolicy::AsEmptyDirectory,
            ..options(EmptyDirectoryPolicy::LastEpisodes(2), true)
        };

        assert_eq!(
            names(&select(&episodes, &on_disk, &opts)),
            vec!["e3.mp3", "e2.mp3"]
        );
    }

    #[test]
    fn boundary_uses_the_truncated_name() {
        let episodes = feed(3);
        let short = FileNamer::new("long-prefix-%file_name%.%file_extension%", 10);
        let on_disk = disk(&[&short.render(&episodes[2])]);

        let selection = select_missing(
            &episodes,
            &on_disk,
            &options(EmptyDirectoryPolicy::DownloadLast, false),
            &dates(),
            |e| short.render(e),
        )
        .unwrap();

        assert_eq!(selection.last_downloaded.as_deref(), Some("long-p.mp3"));
        // all three truncate to the same name, so the boundary is the newest
        assert!(selection.missing.is_empty());
    }
}
