// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::episode::Episode;
use crate::error::ConfigError;

/// Reference dates used to resolve date-based policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    /// Today's local calendar date
    pub today: NaiveDate,
    /// Local date of the previous run, read from the marker file
    pub last_run: Option<NaiveDate>,
}

/// A day named in `download_from_<label>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Weekday(Weekday),
    DayOfMonth(u32),
}

impl FromStr for DayLabel {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDayLabel(raw.to_string());
        let label = raw.to_lowercase();

        let numeric = ["st", "nd", "rd", "th"]
            .iter()
            .find_map(|suffix| label.strip_suffix(*suffix))
            .unwrap_or(label.as_str());

        if let Ok(day) = numeric.parse::<u32>() {
            return if (1..=31).contains(&day) {
                Ok(DayLabel::DayOfMonth(day))
            } else {
                Err(invalid())
            };
        }

        let weekday = match label.as_str() {
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            "sunday" | "sun" => Weekday::Sun,
            _ => return Err(invalid()),
        };

        Ok(DayLabel::Weekday(weekday))
    }
}

impl DayLabel {
    /// The most recent date carrying this label, as seen from `today`.
    ///
    /// A weekday equal to today's resolves to one week ago. A day of month
    /// resolves to this month when it has already been reached, else to the
    /// previous month, clamped to that month's last day.
    pub fn most_recent(self, today: NaiveDate) -> NaiveDate {
        match self {
            DayLabel::Weekday(target) => {
                let today_index = today.weekday().num_days_from_monday();
                let target_index = target.num_days_from_monday();
                let days_ago = match (today_index + 7 - target_index) % 7 {
                    0 => 7,
                    days => days,
                };
                today - Days::new(u64::from(days_ago))
            }
            DayLabel::DayOfMonth(day) if today.day() >= day => {
                today.with_day(day).unwrap_or(today)
            }
            DayLabel::DayOfMonth(day) => {
                let last_of_previous = today
                    .with_day(1)
                    .and_then(|first| first.pred_opt())
                    .unwrap_or(today);
                last_of_previous.with_day(day).unwrap_or(last_of_previous)
            }
        }
    }
}

/// What to download for a feed whose directory holds no episodes yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyDirectoryPolicy {
    /// `download_last`
    DownloadLast,
    /// `download_all_from_feed`
    DownloadAll,
    /// `download_since_last_run`
    SinceLastRun,
    /// `download_from_<N>_days`
    FromDays(u64),
    /// `download_last_<N>_episodes`
    LastEpisodes(usize),
    /// `download_from_<day-label>`
    FromDay(DayLabel),
}

impl FromStr for EmptyDirectoryPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "download_last" => return Ok(Self::DownloadLast),
            "download_all_from_feed" => return Ok(Self::DownloadAll),
            "download_since_last_run" => return Ok(Self::SinceLastRun),
            _ => {}
        }

        if let Some(count) = value
            .strip_prefix("download_last_")
            .and_then(|rest| rest.strip_suffix("_episodes"))
        {
            return count
                .parse()
                .map(Self::LastEpisodes)
                .map_err(|_| ConfigError::UnrecognizedPolicy(value.to_string()));
        }

        if let Some(label) = value.strip_prefix("download_from_") {
            if let Some(days) = label
                .strip_suffix("_days")
                .and_then(|days| days.parse().ok())
            {
                return Ok(Self::FromDays(days));
            }
            return label.parse().map(Self::FromDay);
        }

        Err(ConfigError::UnrecognizedPolicy(value.to_string()))
    }
}

impl EmptyDirectoryPolicy {
    /// Pick episodes from a newest-first list according to this policy
    pub fn apply<'a, T: AsRef<Episode>>(
        &self,
        episodes: &'a [T],
        dates: &DateContext,
    ) -> Result<Vec<&'a T>, ConfigError> {
        let selected = match *self {
            Self::DownloadLast => only_last_n(episodes, 1),
            Self::DownloadAll => episodes.iter().collect(),
            Self::LastEpisodes(count) => only_last_n(episodes, count),
            Self::SinceLastRun => {
                let last_run = dates.last_run.ok_or(ConfigError::MissingLastRunMarker)?;
                only_from_date(episodes, last_run)
            }
            Self::FromDays(days) => {
                let cutoff = dates
                    .today
                    .checked_sub_days(Days::new(days))
                    .unwrap_or(NaiveDate::MIN);
                only_from_date(episodes, cutoff)
            }
            Self::FromDay(label) => only_from_date(episodes, label.most_recent(dates.today)),
        };

        Ok(selected)
    }
}

/// The `count` newest episodes
pub fn only_last_n<T>(episodes: &[T], count: usize) -> Vec<&T> {
    episodes.iter().take(count).collect()
}

/// Episodes published on `cutoff` or later, compared by calendar date only
pub fn only_from_date<T: AsRef<Episode>>(episodes: &[T], cutoff: NaiveDate) -> Vec<&T> {
    episodes
        .iter()
        .filter(|episode| episode.as_ref().published_date.date_naive() >= cutoff)
        .collect()
}

/// What to download when the directory has files but none of them match
/// the feed's rendered names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoOverlapPolicy {
    /// `download_all_from_feed`
    #[default]
    DownloadAll,
    /// `download_nothing`
    DownloadNothing,
    /// `as_empty_directory`: fall back to the empty-directory policy
    AsEmptyDirectory,
}

impl FromStr for NoOverlapPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "download_all_from_feed" => Ok(Self::DownloadAll),
            "download_nothing" => Ok(Self::DownloadNothing),
            "as_empty_directory" => Ok(Self::AsEmptyDirectory),
            _ => Err(ConfigError::UnrecognizedPolicy(value.to_string())),
        }
    }
}
