// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};

use crate::error::FeedError;

/// A parsed feed, entries in document order (newest first by convention)
#[derive(Debug, Clone)]
pub struct RawFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// A single feed item before it is flattened into episodes
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub title: String,
    /// `None` when the item has no `pubDate` or it could not be parsed
    pub published: Option<DateTime<Utc>>,
    pub links: Vec<RawLink>,
}

/// A downloadable link attached to an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    pub mime_type: String,
}

/// Parse RSS feed XML bytes into a RawFeed
pub fn parse_feed(xml_bytes: &[u8]) -> Result<RawFeed, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let entries = channel.items().iter().map(parse_entry).collect();

    Ok(RawFeed {
        title: Some(channel.title().trim().to_string()).filter(|s| !s.is_empty()),
        entries,
    })
}

fn parse_entry(item: &rss::Item) -> RawEntry {
    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let published = item.pub_date().and_then(parse_pub_date);

    RawEntry {
        title,
        published,
        links: collect_links(item),
    }
}

/// Gather the `<enclosure>` and any `<media:content>` links, deduplicated by URL
fn collect_links(item: &rss::Item) -> Vec<RawLink> {
    let mut links: Vec<RawLink> = Vec::new();

    if let Some(enclosure) = item.enclosure() {
        links.push(RawLink {
            href: enclosure.url().trim().to_string(),
            mime_type: enclosure.mime_type().trim().to_string(),
        });
    }

    let media_contents = item
        .extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .into_iter()
        .flatten();

    for extension in media_contents {
        let attrs = extension.attrs();
        let Some(href) = attrs.get("url") else {
            continue;
        };
        let href = href.trim();

        if links.iter().any(|link| link.href == href) {
            continue;
        }

        links.push(RawLink {
            href: href.to_string(),
            mime_type: attrs
                .get("type")
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
        });
    }

    links.retain(|link| !link.href.is_empty());
    links
}

/// Parse a publish date, accepting RFC 2822 and a few common deviations
fn parse_pub_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
