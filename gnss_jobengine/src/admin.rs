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

//! Admin command execution: reload, force-complete, reprocess, plus the
//! idle-loop forced-completion scan.

use std::path::{Path, PathBuf};

use gnss_common::fs::ensure_dir;
use gnss_common::process::run_decoder;
use gnss_core::command::AdminCommand;
use gnss_core::job::{JobDescriptor, JobKind, JobQueue};
use gnss_core::rinex_set::RinexSet;
use tracing::{error, info, warn};

use crate::errors::EngineError;

pub struct AdminContext<'a> {
    pub workdir_root: &'a Path,
    pub savedir: &'a Path,
    pub incoming_dir: &'a Path,
    pub jobqueue: &'a JobQueue,
    pub uploader_pidfile: &'a str,
}

pub fn execute(cmd: &AdminCommand, ctx: &AdminContext) -> Result<(), EngineError> {
    match cmd {
        AdminCommand::ReloadFtpUploader => reload_ftp_uploader(ctx),
        AdminCommand::ForceComplete { site, year, doy } => force_complete(site, *year, *doy, ctx),
        AdminCommand::Reprocess { site, year, doy_start, doy_end } => reprocess(site, *year, *doy_start, *doy_end, ctx),
    }
}

fn reload_ftp_uploader(ctx: &AdminContext) -> Result<(), EngineError> {
    let pid = std::fs::read_to_string(ctx.uploader_pidfile)
        .map_err(|e| EngineError::ProgramFailed { program: "ftpuploader".to_string(), detail: e.to_string() })?;
    let pid = pid.trim();
    run_decoder(Path::new("/bin/kill"), ["-HUP", pid], ".")
        .map_err(|e| EngineError::ProgramFailed { program: "kill -HUP".to_string(), detail: e.to_string() })?;
    info!(pid, "ftpuploader reload signal sent");
    Ok(())
}

/// enqueue a day-job (hour `'0'`) for an incomplete day if at least one
/// processed hour's RINEX Set can supply the interval.
fn force_complete(site: &str, year: u16, doy: u16, ctx: &AdminContext) -> Result<(), EngineError> {
    let workdir = ctx.workdir_root.join(site).join(year.to_string()).join(doy.to_string());

    let interval = ('a'..='x')
        .chain(std::iter::once('0'))
        .find_map(|hour| {
            let rs_path = workdir.join(format!("rs.{hour}.json"));
            RinexSet::from_json_path(&rs_path).ok().and_then(|rs| rs.interval)
        });

    let Some(interval) = interval else {
        error!(site, year, doy, "force complete: no rs.<hour>.json found to supply an interval");
        return Ok(());
    };

    let rs_path = workdir.join("rs.0.json");
    let job = JobDescriptor {
        site: site.to_string(),
        year,
        doy,
        hour: '0',
        interval,
        kind: JobKind::Hour2daily,
        rsfile: rs_path.to_string_lossy().to_string(),
        force_complete: true,
    };
    ctx.jobqueue.emit(&job)?;
    info!(site, year, doy, interval, "force-complete day job emitted");
    Ok(())
}

/// move all files under `SAVEDIR/<site>/<year>/<doy>` back to `INCOMING`
/// for each `doy` in the inclusive range.
fn reprocess(site: &str, year: u16, doy_start: u16, doy_end: u16, ctx: &AdminContext) -> Result<(), EngineError> {
    ensure_dir(ctx.incoming_dir)?;
    for doy in doy_start..=doy_end {
        let src = ctx.savedir.join(site).join(year.to_string()).join(doy.to_string());
        if !src.is_dir() {
            warn!(site, year, doy, path = %src.display(), "reprocess: source directory missing");
            continue;
        }
        for entry in std::fs::read_dir(&src)? {
            let entry = entry?;
            if entry.path().is_file() {
                let dst = ctx.incoming_dir.join(entry.file_name());
                std::fs::rename(entry.path(), dst)?;
            }
        }
        info!(site, year, doy, "reprocess: files moved back to incoming");
    }
    Ok(())
}

/// scan `WORKDIR/<site>/<year>/<doy>/force-complete` marker files across
/// the whole tree; for each, delete the marker and run the same logic as
/// the `force complete` admin command.
pub fn forced_completion_scan(ctx: &AdminContext) -> Result<(), EngineError> {
    let Ok(sites) = std::fs::read_dir(ctx.workdir_root) else { return Ok(()) };
    for site_entry in sites.filter_map(|e| e.ok()) {
        let site_path = site_entry.path();
        if !site_path.is_dir() {
            continue;
        }
        let Ok(years) = std::fs::read_dir(&site_path) else { continue };
        for year_entry in years.filter_map(|e| e.ok()) {
            let year_path = year_entry.path();
            let Some(year) = parse_component::<u16>(&year_path) else { continue };
            let Ok(days) = std::fs::read_dir(&year_path) else { continue };
            for day_entry in days.filter_map(|e| e.ok()) {
                let day_path = day_entry.path();
                let Some(doy) = parse_component::<u16>(&day_path) else { continue };
                let marker = day_path.join("force-complete");
                if marker.is_file() {
                    let _ = std::fs::remove_file(&marker);
                    let site = site_entry.file_name().to_string_lossy().to_string();
                    force_complete(&site, year, doy, ctx)?;
                }
            }
        }
    }
    Ok(())
}

fn parse_component<T: std::str::FromStr>(path: &Path) -> Option<T> {
    path.file_name()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reprocess_moves_files_back_to_incoming() {
        let dir = tempfile::tempdir().unwrap();
        let savedir = dir.path().join("savedir");
        let incoming = dir.path().join("incoming");
        let workdir_root = dir.path().join("workdir");
        let src = savedir.join("ABCD00DNK").join("2019").join("152");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("f1.rnx"), b"x").unwrap();

        let jq = JobQueue::new(dir.path().join("jobqueue"));
        let ctx = AdminContext {
            workdir_root: &workdir_root,
            savedir: &savedir,
            incoming_dir: &incoming,
            jobqueue: &jq,
            uploader_pidfile: "/dev/null",
        };

        reprocess("ABCD00DNK", 2019, 152, 152, &ctx).unwrap();
        assert!(incoming.join("f1.rnx").is_file());
        assert!(!src.join("f1.rnx").exists());
    }

    #[test]
    fn force_complete_without_any_rs_file_logs_and_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let workdir_root = dir.path().join("workdir");
        std::fs::create_dir_all(workdir_root.join("ABCD00DNK/2019/152")).unwrap();
        let jq = JobQueue::new(dir.path().join("jobqueue"));
        let ctx = AdminContext {
            workdir_root: &workdir_root,
            savedir: &dir.path().join("savedir"),
            incoming_dir: &dir.path().join("incoming"),
            jobqueue: &jq,
            uploader_pidfile: "/dev/null",
        };
        force_complete("ABCD00DNK", 2019, 152, &ctx).unwrap();
        assert!(jq.entries_older_than(std::time::Duration::ZERO).unwrap().is_empty());
    }
}
