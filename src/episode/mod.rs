mod download;
mod filename;
mod normalize;

pub use download::{DownloadContext, download_episode, partial_path};
pub use filename::{
    DEFAULT_TEMPLATE, FileNameLimit, FileNamer, limit_file_name, link_to_extension,
    link_to_file_name, render_template, sanitize_title,
};
pub use normalize::{Episode, allowed_mime_types, normalize};
