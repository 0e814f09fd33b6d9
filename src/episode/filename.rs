// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Write;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

use super::normalize::Episode;

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "%title%.%file_extension%";

/// Opening marker of a custom date placeholder, e.g. `%publish_date:$Y-$m-$d%`
const CUSTOM_DATE_MARKER: &str = "%publish_date:";

/// Check if a character must not appear in a file name
fn is_reserved_char(c: char) -> bool {
    c.is_ascii_control() || matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|')
}

/// Sanitize an episode title for use in a file name.
///
/// The title is normalized to composed form. Control and reserved characters
/// become single spaces, and surrounding whitespace is trimmed.
pub fn sanitize_title(title: &str) -> String {
    title
        .nfc()
        .map(|c| if is_reserved_char(c) { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Last path segment of a link, lower-cased, query string removed.
///
/// The link is treated as plain text so the segment keeps its characters as
/// written in the feed, percent escapes included.
fn link_file_segment(link: &str) -> String {
    let without_query = match link.rfind('?') {
        Some(question) if question > 0 => &link[..question],
        _ => link,
    };

    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_lowercase()
}

/// Split a segment into base name and extension; a leading dot is not an extension
fn split_extension(segment: &str) -> (&str, &str) {
    match segment.rfind('.') {
        Some(dot) if segment.find('.').is_some_and(|first| first > 0) => {
            (&segment[..dot], &segment[dot + 1..])
        }
        _ => (segment, ""),
    }
}

/// The base name (no extension) of the file a link points to
pub fn link_to_file_name(link: &str) -> String {
    let segment = link_file_segment(link);
    split_extension(&segment).0.to_string()
}

/// The extension (without dot) of the file a link points to, or empty
pub fn link_to_extension(link: &str) -> String {
    let segment = link_file_segment(link);
    split_extension(&segment).1.to_string()
}

/// Format a date with a strftime string, `None` if the format is invalid
fn format_date(date: &DateTime<Utc>, format: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }

    let mut formatted = String::new();
    write!(formatted, "{}", date.format_with_items(items.iter())).ok()?;
    Some(formatted)
}

/// Replace every `%publish_date:FORMAT%` token, where FORMAT uses `$` for `%`.
///
/// A marker without a closing `%` is dropped and the text after it is kept.
/// A token with an invalid format is dropped entirely. Scanning always moves
/// forward, so repeated malformed tokens cannot loop.
fn expand_custom_dates(template: &str, date: &DateTime<Utc>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(CUSTOM_DATE_MARKER) {
        output.push_str(&rest[..start]);
        let after_marker = &rest[start + CUSTOM_DATE_MARKER.len()..];

        let Some(end) = after_marker.find('%') else {
            tracing::warn!(
                template,
                "Date placeholder in file name template has no closing '%', ignoring it"
            );
            rest = after_marker;
            continue;
        };

        let format = after_marker[..end].replace('$', "%");
        match format_date(date, &format) {
            Some(formatted) => output.push_str(&formatted),
            None => tracing::warn!(
                template,
                format = %format,
                "Invalid date format in file name template, skipping it"
            ),
        }
        rest = &after_marker[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Render a file name from a template.
///
/// Custom date tokens are resolved first, then `%file_name%`,
/// `%publish_date%`, `%file_extension%` and `%title%`.
pub fn render_template(template: &str, episode: &Episode) -> String {
    expand_custom_dates(template, &episode.published_date)
        .replace("%file_name%", &link_to_file_name(&episode.link))
        .replace(
            "%publish_date%",
            &episode.published_date.format("%Y%m%d").to_string(),
        )
        .replace("%file_extension%", &link_to_extension(&episode.link))
        .replace("%title%", &sanitize_title(&episode.title))
        .trim()
        .to_string()
}

/// Cut a file name down to `maximum_length` characters, keeping its extension
/// whenever the extension itself fits.
pub fn limit_file_name(maximum_length: usize, file_name: &str) -> String {
    if file_name.chars().count() <= maximum_length {
        return file_name.to_string();
    }

    let hard_truncate = || file_name.chars().take(maximum_length).collect::<String>();

    let Some(dot) = file_name.rfind('.') else {
        return hard_truncate();
    };

    let extension = &file_name[dot..];
    let extension_length = extension.chars().count();
    if extension_length > maximum_length {
        return hard_truncate();
    }

    let stem: String = file_name[..dot]
        .chars()
        .take(maximum_length - extension_length)
        .collect();
    stem + extension
}

/// How long a file name may be inside a given directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameLimit {
    /// The same budget regardless of directory
    Fixed(usize),
    /// A total path budget; the directory path and a separator are subtracted
    PathBudget(usize),
}

impl FileNameLimit {
    /// 255 characters on Windows, else whatever is left of a 260 character path
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            FileNameLimit::Fixed(255)
        } else {
            FileNameLimit::PathBudget(260)
        }
    }

    /// Maximum file name length for files placed in `directory`
    pub fn for_directory(self, directory: &Path) -> usize {
        match self {
            FileNameLimit::Fixed(length) => length,
            FileNameLimit::PathBudget(total) => {
                let directory_length = directory.to_string_lossy().chars().count();
                total.saturating_sub(directory_length + 1)
            }
        }
    }
}

/// Renders the final, length-limited file name of an episode.
///
/// For a fixed template and limit this is a pure function of the episode,
/// which makes rendered names comparable against files on disk.
#[derive(Debug, Clone)]
pub struct FileNamer {
    template: String,
    max_length: usize,
}

impl FileNamer {
    pub fn new(template: impl Into<String>, max_length: usize) -> Self {
        Self {
            template: template.into(),
            max_length,
        }
    }

    pub fn render(&self, episode: &Episode) -> String {
        limit_file_name(self.max_length, &render_template(&self.template, episode))
    }
}
