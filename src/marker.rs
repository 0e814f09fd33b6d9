// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::ConfigError;

/// Contents of a freshly created marker file. Only its timestamps matter.
const MARKER_TEXT: &str =
    "podfetch last run marker. The access time of this file records the previous run.\n";

/// Read the previous run time from the marker file and stamp it with `now`.
///
/// Returns `None` when no marker path is configured. A marker that does
/// not exist yet is created and reports `now` as the last run.
pub fn load_last_run_and_touch(
    path: Option<&Path>,
    now: DateTime<Local>,
) -> Result<Option<DateTime<Local>>, ConfigError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let failed = |source| ConfigError::MarkerFailed {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(failed)?;
        }
        std::fs::write(path, MARKER_TEXT).map_err(failed)?;
        touch(path, now).map_err(failed)?;

        debug!(marker = %path.display(), "created last run marker");
        return Ok(Some(now));
    }

    let metadata = std::fs::metadata(path).map_err(failed)?;
    let previous = metadata
        .accessed()
        .or_else(|_| metadata.modified())
        .map_err(failed)?;

    touch(path, now).map_err(failed)?;

    let previous = DateTime::<Local>::from(previous);
    debug!(marker = %path.display(), last_run = %previous, "read last run marker");

    Ok(Some(previous))
}

fn touch(path: &Path, now: DateTime<Local>) -> std::io::Result<()> {
    let now = SystemTime::from(now);
    let times = FileTimes::new().set_accessed(now).set_modified(now);
    File::options().write(true).open(path)?.set_times(times)
}
