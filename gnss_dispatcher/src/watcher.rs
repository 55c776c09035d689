/*
 * Copyright (c) 2026, the gnss-ingest contributors.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may
 * obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Inbound watcher: `notify` events on INCOMING plus a slow periodic
//! rescan fallback, both gated by a settle age so a file mid-upload is
//! never dispatched out from under its writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gnss_common::fs::file_age;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const EVENT_SETTLE_AGE: Duration = Duration::from_secs(1);
const RESCAN_SETTLE_AGE: Duration = Duration::from_secs(20);
const RESCAN_PERIOD: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub enum WatchMessage {
    File(PathBuf),
    Rescan,
    Exit,
}

/// spawns the blocking `notify` watcher on its own thread and forwards
/// settled paths to `tx`; returns the handle to keep the watcher alive.
pub fn spawn_notify_watcher(incoming_dir: PathBuf, tx: mpsc::Sender<WatchMessage>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "notify watch error");
                    return;
                }
            };
            for path in event.paths {
                if !path.is_file() {
                    continue;
                }
                if tx.blocking_send(WatchMessage::File(path)).is_err() {
                    break;
                }
            }
        },
        Config::default(),
    )?;
    watcher.watch(&incoming_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// drains `incoming_dir` for files older than `RESCAN_SETTLE_AGE`, used both
/// for the idle fallback and a forced rescan on SIGHUP.
pub fn rescan(incoming_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(incoming_dir) else { return Vec::new() };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| file_age(p).map(|age| age >= RESCAN_SETTLE_AGE).unwrap_or(false))
        .collect()
}

/// tracks paths already forwarded so a burst of rename/write/close events
/// for the same upload doesn't dispatch the file twice.
#[derive(Default)]
pub struct SeenSet {
    seen: HashSet<PathBuf>,
}

impl SeenSet {
    pub fn new() -> Self {
        SeenSet::default()
    }

    /// `true` if this path has not been forwarded yet and has settled past
    /// [`EVENT_SETTLE_AGE`]; marks it seen as a side effect.
    pub fn admit(&mut self, path: &Path) -> bool {
        if self.seen.contains(path) {
            return false;
        }
        let settled = file_age(path).map(|age| age >= EVENT_SETTLE_AGE).unwrap_or(false);
        if !settled {
            debug!(path = %path.display(), "event too fresh, waiting for settle");
            return false;
        }
        self.seen.insert(path.to_path_buf());
        true
    }

    pub fn forget(&mut self, path: &Path) {
        self.seen.remove(path);
    }
}

pub fn rescan_period() -> Duration {
    RESCAN_PERIOD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seen_set_suppresses_duplicate_admits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "x").unwrap();
        std::thread::sleep(Duration::from_millis(1100));

        let mut seen = SeenSet::new();
        assert!(seen.admit(&path));
        assert!(!seen.admit(&path));
    }

    #[test]
    fn rescan_skips_freshly_written_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fresh.txt"), "x").unwrap();
        assert!(rescan(dir.path()).is_empty());
    }
}
