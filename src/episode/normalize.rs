// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::feed::RawEntry;

/// One downloadable media item, derived from a single enclosure link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub published_date: DateTime<Utc>,
    pub title: String,
    pub mime_type: String,
    pub link: String,
}

impl AsRef<Episode> for Episode {
    fn as_ref(&self) -> &Episode {
        self
    }
}

/// Collect the MIME types allowed by a `podcast_extensions` map
pub fn allowed_mime_types(podcast_extensions: &BTreeMap<String, String>) -> BTreeSet<String> {
    podcast_extensions.values().cloned().collect()
}

/// Flatten feed entries into episodes, one per link with an allowed MIME type.
///
/// Entries without a parseable publish date are dropped. Feed order is
/// preserved, and links keep their order within an entry.
pub fn normalize(entries: &[RawEntry], allowed_mime_types: &BTreeSet<String>) -> Vec<Episode> {
    entries
        .iter()
        .filter_map(|entry| entry.published.map(|date| (entry, date)))
        .flat_map(|(entry, published_date)| {
            entry
                .links
                .iter()
                .filter(|link| allowed_mime_types.contains(&link.mime_type))
                .map(move |link| Episode {
                    published_date,
                    title: entry.title.clone(),
                    mime_type: link.mime_type.clone(),
                    link: link.href.clone(),
                })
        })
        .collect()
}
