// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::http::{Headers, HttpClient};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::normalize::Episode;

/// Where an episode is staged while its bytes are still arriving
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut staged = output_path.as_os_str().to_owned();
    staged.push(".partial");
    PathBuf::from(staged)
}

/// Position of a download within its feed, for progress reporting
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Index of this episode in the feed's download queue
    pub episode_index: usize,
    /// Total number of episodes queued for the feed
    pub total_to_download: usize,
}

/// Download an episode to the specified output path
///
/// Streams the response body into a `.partial` file next to `output_path`
/// and renames it once complete, so an interrupted transfer never looks
/// like a downloaded episode. Returns the number of bytes downloaded.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    episode: &Episode,
    headers: &Headers,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let staged_path = partial_path(output_path);

    let result = stream_to_file(client, episode, headers, &staged_path, context, reporter).await;

    let bytes_downloaded = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&staged_path).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&staged_path, output_path)
        .await
        .map_err(|e| DownloadError::FileRenameFailed {
            from: staged_path.clone(),
            source: e,
        })?;

    reporter.report(ProgressEvent::DownloadCompleted {
        episode_title: episode.title.clone(),
        file_name: file_name_of(output_path),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

async fn stream_to_file<C: HttpClient>(
    client: &C,
    episode: &Episode,
    headers: &Headers,
    staged_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = episode.link.as_str();

    let response = client
        .get_stream(url, headers)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        episode_title: episode.title.clone(),
        episode_index: context.episode_index,
        total_to_download: context.total_to_download,
        content_length: response.content_length,
    });

    let mut file = File::create(staged_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: staged_path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: staged_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: staged_path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
