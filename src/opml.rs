// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turn an OPML subscription export into a configuration skeleton.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::OpmlError;

/// A podcast entry of the generated configuration. Fields are declared in
/// alphabetical order so the output keys come out sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpmlPodcast {
    pub name: String,
    /// Left empty for the user to fill in
    pub path: String,
    pub rss_link: String,
}

#[derive(Serialize)]
struct Skeleton<'a> {
    podcasts: &'a [OpmlPodcast],
}

/// Read an OPML file and collect its RSS outlines
pub fn read_opml(path: &Path) -> Result<Vec<OpmlPodcast>, OpmlError> {
    let content = std::fs::read_to_string(path).map_err(|e| OpmlError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_opml(&content)
}

/// Collect every `<outline type="rss">` with an `xmlUrl`, at any depth
pub fn parse_opml(content: &str) -> Result<Vec<OpmlPodcast>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut podcasts = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(podcast) = outline_to_podcast(&e, &reader)? {
                    podcasts.push(podcast);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(podcasts)
}

fn outline_to_podcast(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<OpmlPodcast>, OpmlError> {
    let mut is_rss = false;
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?
            .to_string();

        match attr.key.as_ref() {
            b"type" => is_rss = value.eq_ignore_ascii_case("rss"),
            b"xmlUrl" => xml_url = Some(value),
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            _ => {}
        }
    }

    let Some(rss_link) = xml_url.filter(|_| is_rss) else {
        return Ok(None);
    };

    Ok(Some(OpmlPodcast {
        name: title.or(text).unwrap_or_else(|| rss_link.clone()),
        path: String::new(),
        rss_link,
    }))
}

/// Render `{"podcasts": [...]}` with four-space indentation
pub fn config_skeleton(podcasts: &[OpmlPodcast]) -> Result<String, OpmlError> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    Skeleton { podcasts }.serialize(&mut serializer)?;

    Ok(String::from_utf8_lossy(&out).into_owned())
}
