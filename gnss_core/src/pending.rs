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

//! Pending Aggregator: a single task owning `Pending: ident -> RinexSet`,
//! gathering multi-file uploads under quiescence and age rules before
//! submitting them to the Job Engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::ident::WorkUnitId;
use crate::job::JobQueue;
use crate::parse::FileKind;
use crate::rinex_set::RinexSet;
use crate::state::StateFile;
use crate::unpack::{day_job_blocks, promote_and_enqueue, unpack_dir};

const TICK_PERIOD: Duration = Duration::from_secs(3);
const QUIESCENCE: Duration = Duration::from_secs(20);
const STALE_AGE: Duration = Duration::from_secs(7200);

#[derive(Debug, Clone)]
pub enum PendingMessage {
    Add { ident: WorkUnitId, fname: String, orig: String, interval: Option<u16>, kind: FileKind },
    /// enqueued by the main loop on shutdown.
    Exit,
}

enum EvalAction {
    Postpone,
    Discard,
    Drop,
    Submit,
}

pub struct PendingAggregator {
    entries: HashMap<WorkUnitId, RinexSet>,
    workdir_root: PathBuf,
    incoming_dir: PathBuf,
    jobqueue: JobQueue,
}

impl PendingAggregator {
    pub fn new(workdir_root: impl Into<PathBuf>, incoming_dir: impl Into<PathBuf>, jobqueue: JobQueue) -> Self {
        PendingAggregator {
            entries: HashMap::new(),
            workdir_root: workdir_root.into(),
            incoming_dir: incoming_dir.into(),
            jobqueue,
        }
    }

    fn workdir_for(&self, ident: &WorkUnitId) -> PathBuf {
        self.workdir_root.join(&ident.site).join(ident.year.to_string()).join(ident.doy.to_string())
    }

    fn handle_add(&mut self, ident: WorkUnitId, fname: String, orig: String, interval: Option<u16>, kind: FileKind) {
        let workdir = self.workdir_for(&ident);
        let rs_path = workdir.join(format!("rs.{}.json", ident.hour));

        let rs = self.entries.entry(ident.clone()).or_insert_with(|| {
            if rs_path.is_file() {
                match RinexSet::from_json_path(&rs_path) {
                    Ok(rs) => {
                        info!(ident = %ident, "late arrival: reloaded existing rinex set");
                        rs
                    }
                    Err(e) => {
                        warn!(ident = %ident, error = %e, "failed to reload rinex set, starting fresh");
                        RinexSet::new(&ident)
                    }
                }
            } else {
                RinexSet::new(&ident)
            }
        });

        rs.attach(kind, fname, interval, orig);
    }

    /// evaluate every pending entry once; called on each 3s tick and right
    /// after processing an `Add`.
    fn evaluate_all(&mut self) {
        let idents: Vec<WorkUnitId> = self.entries.keys().cloned().collect();
        for ident in idents {
            self.evaluate_one(&ident);
        }
    }

    fn evaluate_one(&mut self, ident: &WorkUnitId) {
        let workdir = self.workdir_for(ident);
        let incoming_dir = self.incoming_dir.clone();

        let action = {
            let rs = self.entries.get_mut(ident).expect("ident taken from entries keys");
            classify(rs, &incoming_dir, &workdir)
        };

        match action {
            EvalAction::Postpone => {}
            EvalAction::Discard => {
                warn!(ident = %ident, "stale pending job: discarding");
                self.entries.remove(ident);
            }
            EvalAction::Drop => {
                warn!(ident = %ident, "day-job already queued/running: dropping late hour submission");
                self.entries.remove(ident);
            }
            EvalAction::Submit => {
                self.submit(ident);
            }
        }
    }

    fn submit(&mut self, ident: &WorkUnitId) {
        let mut rs = self.entries.remove(ident).expect("ident taken from entries keys");
        let workdir = self.workdir_for(ident);
        let stage = unpack_dir(&workdir, ident.hour);
        let state_file = StateFile::new(workdir.join(format!("state.{}", ident.hour)));

        match promote_and_enqueue(&stage, &workdir, &state_file, &mut rs, &self.jobqueue) {
            Ok(_) => info!(ident = %ident, "promoted pending set and emitted ftp job"),
            Err(e) => {
                warn!(ident = %ident, error = %e, "promotion failed, re-queuing for a later tick");
                self.entries.insert(ident.clone(), rs);
            }
        }
    }

    /// drive the aggregator until an `Exit` message arrives.
    pub async fn run(mut self, mut rx: mpsc::Receiver<PendingMessage>) {
        let mut tick = tokio::time::interval(TICK_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.evaluate_all();
                }
                msg = rx.recv() => {
                    match msg {
                        Some(PendingMessage::Add { ident, fname, orig, interval, kind }) => {
                            self.handle_add(ident.clone(), fname, orig, interval, kind);
                            self.evaluate_one(&ident);
                        }
                        Some(PendingMessage::Exit) | None => {
                            info!("pending aggregator received exit sentinel, shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn age_exceeds(from: gnss_common::datetime::EpochMillis, now: gnss_common::datetime::EpochMillis, threshold: Duration) -> bool {
    let delta_ms = now.millis().saturating_sub(from.millis());
    delta_ms >= threshold.as_millis() as i64
}

/// the per-entry evaluation rule: submittable-and-complete promotes
/// immediately, submittable-but-incomplete waits out the quiescence window,
/// and anything still unsubmittable past the stale age is abandoned.
fn classify(rs: &mut RinexSet, incoming_dir: &Path, workdir: &Path) -> EvalAction {
    use gnss_common::datetime::EpochMillis;
    let now = EpochMillis::now();

    if !rs.is_submittable() && !rs.is_complete() {
        if age_exceeds(rs.timecreated, now, STALE_AGE) {
            return EvalAction::Discard;
        }
        return EvalAction::Postpone;
    }

    if rs.is_submittable() && !rs.is_complete() && !age_exceeds(rs.timestamp, now, QUIESCENCE) {
        return EvalAction::Postpone;
    }

    if incoming_has_prefix(incoming_dir, &rs.prefix()) {
        rs.timestamp = now;
        return EvalAction::Postpone;
    }

    let ident = rs.id();
    if !ident.is_day_job() && day_job_blocks(workdir, &ident) {
        return EvalAction::Drop;
    }

    EvalAction::Submit
}

fn incoming_has_prefix(incoming_dir: &Path, prefix: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(incoming_dir) else { return false };
    entries
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_str().map(|n| n.starts_with(prefix)).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::FileKind;
    use gnss_common::fs::ensure_dir;

    fn new_aggregator(dir: &Path) -> PendingAggregator {
        let workdir_root = dir.join("workdir");
        let incoming = dir.join("incoming");
        ensure_dir(&workdir_root).unwrap();
        ensure_dir(&incoming).unwrap();
        PendingAggregator::new(workdir_root, incoming, JobQueue::new(dir.join("jobqueue")))
    }

    #[test]
    fn incomplete_set_is_postponed_then_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = new_aggregator(dir.path());
        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');

        agg.handle_add(ident.clone(), "mo.rnx".into(), "mo.rnx".into(), Some(30), FileKind::Mo);
        let workdir = agg.workdir_for(&ident);
        let incoming = agg.incoming_dir.clone();
        assert!(matches!(
            classify(agg.entries.get_mut(&ident).unwrap(), &incoming, &workdir),
            EvalAction::Postpone
        ));

        agg.handle_add(ident.clone(), "gn.rnx".into(), "gn.rnx".into(), None, FileKind::Nav('G'));
        // still not quiescent immediately after the second file arrives
        assert!(matches!(
            classify(agg.entries.get_mut(&ident).unwrap(), &incoming, &workdir),
            EvalAction::Postpone
        ));
    }

    #[test]
    fn complete_set_bypasses_quiescence_wait() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = new_aggregator(dir.path());
        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');

        agg.handle_add(ident.clone(), "mo.rnx".into(), "mo.rnx".into(), Some(30), FileKind::Mo);
        agg.handle_add(ident.clone(), "gn.rnx".into(), "gn.rnx".into(), None, FileKind::Nav('G'));
        agg.handle_add(ident.clone(), "mn.rnx".into(), "mn.rnx".into(), None, FileKind::Mn);

        let workdir = agg.workdir_for(&ident);
        let incoming = agg.incoming_dir.clone();
        let action = classify(agg.entries.get_mut(&ident).unwrap(), &incoming, &workdir);
        assert!(matches!(action, EvalAction::Submit));
    }

    #[test]
    fn stale_incomplete_entry_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = new_aggregator(dir.path());
        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        agg.handle_add(ident.clone(), "mo.rnx".into(), "mo.rnx".into(), Some(30), FileKind::Mo);

        let workdir = agg.workdir_for(&ident);
        let incoming = agg.incoming_dir.clone();
        let rs = agg.entries.get_mut(&ident).unwrap();
        rs.timecreated = gnss_common::datetime::EpochMillis::new(0);
        assert!(matches!(classify(rs, &incoming, &workdir), EvalAction::Discard));
    }
}
