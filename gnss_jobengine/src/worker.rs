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

//! Per-job worker logic: runs inside the re-exec'd `--run-job` child
//! process, one job per process so a crash only takes out that child.

use std::path::PathBuf;

use gnss_common::process::run_decoder;
use gnss_config::JobPrograms;
use gnss_core::job::JobDescriptor;
use gnss_core::state::{State, StateFile};
use tracing::{error, info, warn};

/// exit code convention read back by the boss: 0 ok, 1 handled error,
/// anything else (including abnormal termination) is fatal.
pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;

pub fn run_job(desc: &JobDescriptor, workdir_root: &std::path::Path, programs: &JobPrograms) -> i32 {
    if let Err(e) = desc.validate() {
        error!(error = %e, "job descriptor failed validation");
        return EXIT_ERROR;
    }

    let workdir = workdir_root.join(&desc.site).join(desc.year.to_string()).join(desc.doy.to_string());
    if let Err(e) = std::env::set_current_dir(&workdir) {
        error!(workdir = %workdir.display(), error = %e, "cannot change to job work directory");
        return EXIT_ERROR;
    }

    let state_file = StateFile::new(state_path(&workdir, desc.hour));
    let mut guard = match state_file.lock() {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "cannot acquire state lock");
            return EXIT_ERROR;
        }
    };
    if let Err(e) = guard.require(&[State::Queued]) {
        error!(error = %e, "job is not in queued state");
        return EXIT_ERROR;
    }
    if let Err(e) = guard.transition(State::Running) {
        error!(error = %e, "failed to transition to running");
        return EXIT_ERROR;
    }
    drop(guard);

    let ident = desc.id();
    info!(ident = %ident, "job running");
    let outcome = process(desc, programs);

    let mut guard = match state_file.lock() {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "cannot re-acquire state lock after job.process()");
            return EXIT_ERROR;
        }
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = guard.transition(State::Processed) {
                error!(error = %e, "failed to transition to processed");
                return EXIT_ERROR;
            }
            info!(ident = %ident, "job ok");
            EXIT_OK
        }
        Err(e) => {
            warn!(ident = %ident, error = %e, "job.process() reported a handled failure, resetting state");
            let _ = guard.transition(State::None);
            EXIT_ERROR
        }
    }
}

/// `job.process()`: the opaque boundary to external domain code. Here
/// that boundary is a single opaque subprocess invocation per job kind -
/// the uploader and the hour-to-daily aggregator are both out of scope
/// (treated as external collaborators), so this module only knows how to
/// hand them the RINEX Set path and check their exit status.
fn process(desc: &JobDescriptor, programs: &JobPrograms) -> Result<(), std::io::Error> {
    let program = match desc.kind {
        gnss_core::job::JobKind::Ftp => PathBuf::from(&programs.ftp_uploader),
        gnss_core::job::JobKind::Hour2daily => PathBuf::from(&programs.hour2daily),
    };
    run_decoder(&program, [desc.rsfile.as_str()], ".").map(|_| ())
}

fn state_path(workdir: &std::path::Path, hour: char) -> PathBuf {
    workdir.join(format!("state.{hour}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_core::job::JobKind;

    #[test]
    fn rejects_job_not_in_queued_state() {
        let dir = tempfile::tempdir().unwrap();
        let workdir_root = dir.path().join("workdir");
        let workdir = workdir_root.join("ABCD00DNK").join("2019").join("152");
        std::fs::create_dir_all(&workdir).unwrap();

        let desc = JobDescriptor {
            site: "ABCD00DNK".to_string(),
            year: 2019,
            doy: 152,
            hour: 'a',
            interval: 30,
            kind: JobKind::Ftp,
            rsfile: "rs.a.json".to_string(),
            force_complete: false,
        };

        let programs = JobPrograms {
            ftp_uploader: "/bin/true".to_string(),
            hour2daily: "/bin/true".to_string(),
            uploader_pidfile: "/dev/null".to_string(),
        };

        // state file absent => none, not queued => EXIT_ERROR
        let code = run_job(&desc, &workdir_root, &programs);
        assert_eq!(code, EXIT_ERROR);
    }
}
