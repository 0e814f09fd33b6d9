mod fetch;
mod parse;

pub use fetch::{fetch_feed_bytes, is_url, load_feed, read_feed_file};
pub use parse::{RawEntry, RawFeed, RawLink, parse_feed};
