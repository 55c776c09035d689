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

//! Unpack Pool: per-request decode dispatch for the four source dialects.
//!
//! This module holds the synchronous per-file logic; the binaries run it
//! on a bounded pool of worker tasks that consume an unpack work channel.

use std::fs;
use std::path::{Path, PathBuf};

use gnss_common::fs::{atomic_move_into, ensure_dir};
use gnss_common::process::run_decoder;
use thiserror::Error;
use tracing::warn;

use crate::ident::WorkUnitId;
use crate::job::{JobDescriptor, JobKind, JobQueue};
use crate::parse::{legacy_suffix_to_kind, parse, FileKind, ParsedName, SourceKind};
use crate::rinex_set::RinexSet;
use crate::state::{peek_state, State, StateFile};

#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("unpack io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unpack decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    State(#[from] crate::state::StateError),

    #[error(transparent)]
    RinexSet(#[from] crate::rinex_set::RinexSetError),

    #[error(transparent)]
    Job(#[from] crate::job::JobError),
}

/// paths to the external decoder binaries, always configuration.
#[derive(Debug, Clone)]
pub struct Decoders {
    pub gunzip: PathBuf,
    pub unzip: PathBuf,
    pub crx2rnx: PathBuf,
    pub sbf2rin: PathBuf,
}

/// a unit of work handed from the Dispatcher to an Unpack worker.
#[derive(Debug, Clone)]
pub struct UnpackRequest {
    /// absolute path of the file, already moved to `SAVEDIR/<site>/<year>/<doy>/`.
    pub path: PathBuf,
    pub parsed: ParsedName,
    /// canonical 9-char site, resolved via the Site Catalog.
    pub site9: String,
    /// configured observation interval for this site.
    pub interval: u16,
    /// `WORKDIR/<site>/<year>/<doy>`.
    pub workdir: PathBuf,
}

#[derive(Debug, Clone)]
pub enum UnpackOutcome {
    /// Long RINEX v3: forward to the Pending Aggregator, no state touched.
    PendingAdd { ident: WorkUnitId, fname: String, orig: String, interval: Option<u16>, kind: FileKind },
    /// single-file upload promoted straight to `queued`.
    Queued { ident: WorkUnitId },
    /// day-job already `queued`/`running`: hour abandoned.
    Abandoned { ident: WorkUnitId },
    /// decoder failure: state reset to `none`, file stays in SAVEDIR.
    Failed { ident: WorkUnitId },
}

/// `unpack.<hour>/` staging directory for a work unit.
pub fn unpack_dir(workdir: &Path, hour: char) -> PathBuf {
    workdir.join(format!("unpack.{hour}"))
}

pub fn process_request(req: &UnpackRequest, decoders: &Decoders, jobqueue: &JobQueue) -> Result<UnpackOutcome, UnpackError> {
    let ident = WorkUnitId::new(req.site9.clone(), req.parsed.year, req.parsed.doy, req.parsed.hour);
    let stage = unpack_dir(&req.workdir, ident.hour);
    ensure_dir(&stage)?;

    match req.parsed.source {
        SourceKind::SeptentrioRnx3 => {
            let fname = gunzip_if_needed(&req.path, &stage, decoders)?;
            let kind = req.parsed.ftyp.expect("rnx3 names always carry a file kind");
            let orig = req.path.file_name().unwrap().to_string_lossy().to_string();
            Ok(UnpackOutcome::PendingAdd {
                ident,
                fname,
                orig,
                interval: req.parsed.interval,
                kind,
            })
        }

        SourceKind::SeptentrioRaw => {
            let state_file = StateFile::new(state_path(&req.workdir, ident.hour));
            let mut guard = state_file.lock()?;
            guard.require(&[State::None, State::Processed])?;

            let fname = req.path.file_name().unwrap().to_string_lossy().to_string();

            let decode_result = run_decoder(
                &decoders.sbf2rin,
                [req.path.as_os_str(), stage.as_os_str()],
                &stage,
            );
            if let Err(e) = decode_result {
                warn!(ident = %ident, error = %e, "sbf2rin decode failed");
                guard.transition(State::None)?;
                return Ok(UnpackOutcome::Failed { ident });
            }

            let mut rs = RinexSet::new(&ident);
            rs.interval = Some(req.interval);
            for extracted in scan_staged_files(&stage)? {
                let name = extracted.file_name().unwrap().to_string_lossy().to_string();
                let kind = output_file_kind(&name);
                if let Some(kind) = kind {
                    rs.attach(kind, name, Some(req.interval), fname.clone());
                }
            }

            finish_single_file_unpack(&stage, &req.workdir, &mut rs, jobqueue, &ident)
        }

        SourceKind::TrinzicZip | SourceKind::LeicaZip => {
            let state_file = StateFile::new(state_path(&req.workdir, ident.hour));
            let mut guard = state_file.lock()?;
            guard.require(&[State::None, State::Processed])?;

            let orig = req.path.file_name().unwrap().to_string_lossy().to_string();
            if let Err(e) = run_decoder(&decoders.unzip, [req.path.as_os_str(), stage.as_os_str()], &stage) {
                warn!(ident = %ident, error = %e, "unzip failed");
                guard.transition(State::None)?;
                return Ok(UnpackOutcome::Failed { ident });
            }

            let mut rs = RinexSet::new(&ident);
            rs.interval = Some(req.interval);
            rs.zipfile = Some(orig.clone());

            for member in scan_staged_files(&stage)? {
                match normalize_member(&member, &stage, decoders, &rs) {
                    Ok(Some((kind, canonical))) => rs.attach(kind, canonical, Some(req.interval), orig.clone()),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(ident = %ident, member = %member.display(), error = %e, "member decode failed");
                        guard.transition(State::None)?;
                        return Ok(UnpackOutcome::Failed { ident });
                    }
                }
            }

            finish_single_file_unpack(&stage, &req.workdir, &mut rs, jobqueue, &ident)
        }
    }
}

/// the common tail shared by the two single-file dialects and the Pending
/// Aggregator's own promotion path: day-job exclusivity, promote
/// `unpack.<h>/*` into the work directory, persist the RINEX Set, transition
/// to `queued`, emit an `ftp` job, release the lock on every exit path.
pub fn promote_and_enqueue(
    stage: &Path,
    workdir: &Path,
    state_file: &StateFile,
    rs: &mut RinexSet,
    jobqueue: &JobQueue,
) -> Result<UnpackOutcome, UnpackError> {
    let ident = rs.id();

    if !ident.is_day_job() && day_job_blocks(workdir, &ident) {
        warn!(ident = %ident, "day-job already queued/running, abandoning hour");
        return Ok(UnpackOutcome::Abandoned { ident });
    }

    let mut guard = state_file.lock()?;
    guard.require(&[State::None, State::Processed])?;

    for entry in fs::read_dir(stage)? {
        let entry = entry?;
        atomic_move_into(entry.path(), workdir)?;
    }
    let _ = fs::remove_dir(stage);

    let rs_path = workdir.join(format!("rs.{}.json", ident.hour));
    rs.to_json_path(&rs_path)?;

    guard.transition(State::Queued)?;

    let job = JobDescriptor {
        site: ident.site.clone(),
        year: ident.year,
        doy: ident.doy,
        hour: ident.hour,
        interval: rs.interval.unwrap_or(0),
        kind: JobKind::Ftp,
        rsfile: rs_path.to_string_lossy().to_string(),
        force_complete: false,
    };
    jobqueue.emit(&job)?;

    Ok(UnpackOutcome::Queued { ident })
}

fn finish_single_file_unpack(
    stage: &Path,
    workdir: &Path,
    rs: &mut RinexSet,
    jobqueue: &JobQueue,
    ident: &WorkUnitId,
) -> Result<UnpackOutcome, UnpackError> {
    let state_file = StateFile::new(state_path(workdir, ident.hour));
    promote_and_enqueue(stage, workdir, &state_file, rs, jobqueue)
}

pub fn day_job_blocks(workdir: &Path, ident: &WorkUnitId) -> bool {
    let path = state_path(workdir, '0');
    matches!(peek_state(path), Ok(State::Queued) | Ok(State::Running)) && !ident.is_day_job()
}

fn state_path(workdir: &Path, hour: char) -> PathBuf {
    workdir.join(format!("state.{hour}"))
}

fn gunzip_if_needed(path: &Path, stage: &Path, decoders: &Decoders) -> Result<String, UnpackError> {
    let fname = path.file_name().unwrap().to_string_lossy().to_string();
    let staged = atomic_move_into(path, stage)?;
    if fname.ends_with(".gz") {
        run_decoder(&decoders.gunzip, [staged.as_os_str()], stage)
            .map_err(|e| UnpackError::Decode(e.to_string()))?;
        Ok(fname.trim_end_matches(".gz").to_string())
    } else {
        Ok(fname)
    }
}

fn scan_staged_files(stage: &Path) -> Result<Vec<PathBuf>, UnpackError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(stage)? {
        let entry = entry?;
        if entry.path().is_file() {
            out.push(entry.path());
        }
    }
    Ok(out)
}

/// classify one decoder-produced output file by its own name: try the long-
/// form parser first, falling back to the legacy single-letter suffix map.
/// `sbf2rin` and `crx2rnx` may each emit a mix of naming conventions across
/// a single run, so every output file must be inspected individually rather
/// than inherited from the kind of the file that was decoded.
fn output_file_kind(name: &str) -> Option<FileKind> {
    if let Ok(p) = parse(name) {
        if let Some(kind) = p.ftyp {
            return Some(kind);
        }
    }
    name.rsplit('.').next().and_then(|s| s.chars().next()).and_then(legacy_suffix_to_kind)
}

/// gunzip then CRX->RNX an extracted archive member as needed, classify it
/// by its own (post-decode) name, and rename it to the canonical RINEX v3
/// name recorded by `rs`. Returns `None` for members that carry no
/// recognizable RINEX content (e.g. log files bundled in the zip).
fn normalize_member(member: &Path, stage: &Path, decoders: &Decoders, rs: &RinexSet) -> Result<Option<(FileKind, String)>, UnpackError> {
    let mut current = member.to_path_buf();

    if current.extension().and_then(|e| e.to_str()) == Some("gz") {
        run_decoder(&decoders.gunzip, [current.as_os_str()], stage)
            .map_err(|e| UnpackError::Decode(e.to_string()))?;
        current = current.with_extension("");
    }

    let mut name = current.file_name().unwrap().to_string_lossy().to_string();

    // crinex-compressed observation files carry a 'd' in the last suffix
    // position by convention; decompress to RINEX before classifying.
    if name.ends_with('d') || name.ends_with('D') {
        run_decoder(&decoders.crx2rnx, [current.as_os_str()], stage).map_err(|e| UnpackError::Decode(e.to_string()))?;
        let was_upper = name.ends_with('D');
        name.pop();
        name.push(if was_upper { 'O' } else { 'o' });
        current = stage.join(&name);
    }

    let Some(kind) = output_file_kind(&name) else { return Ok(None) };

    let canonical = rs.canonical_name(kind);
    fs::rename(&current, stage.join(&canonical))?;
    Ok(Some((kind, canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateFile;

    #[test]
    fn day_job_block_only_applies_to_hour_files() {
        let dir = tempfile::tempdir().unwrap();
        let sf = StateFile::new(dir.path().join("state.0"));
        let mut guard = sf.lock().unwrap();
        guard.transition(State::Running).unwrap();
        drop(guard);

        let hour_id = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        assert!(day_job_blocks(dir.path(), &hour_id));

        let day_id = WorkUnitId::day("ABCD00DNK", 2019, 152);
        assert!(!day_job_blocks(dir.path(), &day_id));
    }

    #[test]
    fn promote_and_enqueue_writes_state_rs_and_job() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("workdir");
        let stage = workdir.join("unpack.a");
        ensure_dir(&stage).unwrap();
        fs::write(stage.join("ABCD00DNK_R_20191520000_01H_30S_MO.rnx"), b"x").unwrap();

        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        let mut rs = RinexSet::new(&ident);
        rs.interval = Some(30);

        let sf = StateFile::new(workdir.join("state.a"));
        let jq = JobQueue::new(dir.path().join("jobqueue"));

        let outcome = promote_and_enqueue(&stage, &workdir, &sf, &mut rs, &jq).unwrap();
        assert!(matches!(outcome, UnpackOutcome::Queued { .. }));
        assert!(workdir.join("rs.a.json").is_file());
        assert!(workdir.join("ABCD00DNK_R_20191520000_01H_30S_MO.rnx").is_file());
        assert_eq!(peek_state(workdir.join("state.a")).unwrap(), State::Queued);
        assert_eq!(jq.entries_older_than(std::time::Duration::ZERO).unwrap().len(), 1);
    }

    #[test]
    fn output_file_kind_classifies_by_own_suffix() {
        assert_eq!(output_file_kind("abcd152a.19n"), Some(FileKind::Nav('G')));
        assert_eq!(output_file_kind("ABCD00DNK_R_20191520000_01H_GN.rnx"), Some(FileKind::Nav('G')));
        assert_eq!(output_file_kind("readme.txt"), None);
    }

    #[test]
    fn normalize_member_renames_to_canonical_name() {
        let dir = tempfile::tempdir().unwrap();
        let stage = dir.path().join("stage");
        ensure_dir(&stage).unwrap();
        let member = stage.join("abcd152a.19o");
        fs::write(&member, b"x").unwrap();

        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        let mut rs = RinexSet::new(&ident);
        rs.interval = Some(30);

        let decoders = Decoders {
            gunzip: PathBuf::from("/bin/true"),
            unzip: PathBuf::from("/bin/true"),
            crx2rnx: PathBuf::from("/bin/true"),
            sbf2rin: PathBuf::from("/bin/true"),
        };

        let (kind, canonical) = normalize_member(&member, &stage, &decoders, &rs).unwrap().unwrap();
        assert_eq!(kind, FileKind::Mo);
        assert_eq!(canonical, "ABCD00DNK_R_20191520000_01H_30S_MO.rnx");
        assert!(!member.exists());
        assert!(stage.join(&canonical).is_file());
    }
}
