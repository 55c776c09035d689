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

//! Job Descriptor and the file-backed `JOBQUEUE/` spool: emission by the
//! Dispatcher/Aggregator side, drain/read/unlink by the Job Engine side.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use gnss_common::fs::file_age;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::WorkUnitId;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job queue io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid job descriptor: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Ftp,
    Hour2daily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: char,
    pub interval: u16,
    pub kind: JobKind,
    pub rsfile: String,
    #[serde(default)]
    pub force_complete: bool,
}

impl JobDescriptor {
    pub fn id(&self) -> WorkUnitId {
        WorkUnitId::new(self.site.clone(), self.year, self.doy, self.hour)
    }

    /// on invalid, the worker must return `error`.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.site.len() != 9 {
            return Err(JobError::Invalid(format!("site {:?} is not 9 characters", self.site)));
        }
        if !(1..=366).contains(&self.doy) {
            return Err(JobError::Invalid(format!("doy {} out of range", self.doy)));
        }
        if self.hour != '0' && !('a'..='x').contains(&self.hour) {
            return Err(JobError::Invalid(format!("invalid hour letter {:?}", self.hour)));
        }
        Ok(())
    }
}

/// one entry read back out of the spool.
pub enum QueueEntry {
    Job(JobDescriptor),
    Command(String),
}

static SEQ: AtomicU64 = AtomicU64::new(0);

/// `JOBQUEUE/`. Entries whose name ends in `command` carry an admin
/// command as their body; anything else is job JSON.
#[derive(Clone)]
pub struct JobQueue {
    dir: PathBuf,
}

impl JobQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JobQueue { dir: dir.into() }
    }

    fn unique_name(&self, suffix: &str) -> String {
        let pid = std::process::id();
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{nanos}-{pid}-{seq}{suffix}")
    }

    /// write a job descriptor as a new queue file, returning its path.
    pub fn emit(&self, job: &JobDescriptor) -> Result<PathBuf, JobError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", self.unique_name("")));
        let json = serde_json::to_string(job)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// write an admin command file; the name must end in `command`.
    pub fn emit_command(&self, text: &str) -> Result<PathBuf, JobError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}-command", self.unique_name("")));
        fs::write(&path, text)?;
        Ok(path)
    }

    /// entries older than `min_age`, oldest filesystem-reported mtime first.
    /// Used both for the boss loop's normal drain (age >= 2s) and for the
    /// leftover sweep (age >= 15min).
    pub fn entries_older_than(&self, min_age: Duration) -> Result<Vec<PathBuf>, JobError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Ok(age) = file_age(&path) {
                if age >= min_age {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// read and classify a queue file's contents. Does not unlink; callers
    /// unlink explicitly once the content has been handed off, per the
    /// leftover-sweep race note in DESIGN.md.
    pub fn read_entry(&self, path: impl AsRef<Path>) -> Result<QueueEntry, JobError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        if is_command_name(path) {
            Ok(QueueEntry::Command(contents.trim().to_string()))
        } else {
            Ok(QueueEntry::Job(serde_json::from_str(&contents)?))
        }
    }

    pub fn unlink(&self, path: impl AsRef<Path>) -> Result<(), JobError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_command_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("command"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> JobDescriptor {
        JobDescriptor {
            site: "ABCD00DNK".to_string(),
            year: 2019,
            doy: 152,
            hour: 'a',
            interval: 30,
            kind: JobKind::Ftp,
            rsfile: "rs.a.json".to_string(),
            force_complete: false,
        }
    }

    #[test]
    fn emit_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let q = JobQueue::new(dir.path());
        let path = q.emit(&sample_job()).unwrap();
        match q.read_entry(&path).unwrap() {
            QueueEntry::Job(j) => assert_eq!(j.site, "ABCD00DNK"),
            QueueEntry::Command(_) => panic!("expected job entry"),
        }
        q.unlink(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn command_files_are_classified_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let q = JobQueue::new(dir.path());
        let path = q.emit_command("reload ftpuploader").unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("command"));
        match q.read_entry(&path).unwrap() {
            QueueEntry::Command(cmd) => assert_eq!(cmd, "reload ftpuploader"),
            QueueEntry::Job(_) => panic!("expected command entry"),
        }
    }

    #[test]
    fn validate_rejects_bad_site_length() {
        let mut job = sample_job();
        job.site = "ABCD".to_string();
        assert!(job.validate().is_err());
    }

    #[test]
    fn unlink_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let q = JobQueue::new(dir.path());
        q.unlink(dir.path().join("nope.json")).unwrap();
    }
}
