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

//! Per-hour state machine: `none -> queued -> running -> processed`, with
//! the state file itself doubling as the advisory-lock domain so that
//! other processes (operator utilities) observe the same exclusion.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fs2::FileExt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed state file contents: {0:?}")]
    Malformed(String),

    #[error("illegal state transition: found {found:?}, expected one of {expected:?}")]
    IllegalTransition { found: State, expected: Vec<State> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Queued,
    Running,
    Processed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::None => "none",
            State::Queued => "queued",
            State::Running => "running",
            State::Processed => "processed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for State {
    type Err = StateError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(State::None),
            "queued" => Ok(State::Queued),
            "running" => Ok(State::Running),
            "processed" => Ok(State::Processed),
            other => Err(StateError::Malformed(other.to_string())),
        }
    }
}

/// `WORKDIR/<site>/<year>/<doy>/state.<hour>`, addressed by path. Holds an
/// exclusive advisory lock on the open file for the lifetime of a
/// [`StateGuard`] so that read-modify-write is atomic across processes.
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateFile { path: path.into() }
    }

    /// open (creating with `none` if absent) and take the exclusive lock,
    /// non-blocking: a lock already held by another process is treated as
    /// a retryable illegal-state condition.
    pub fn lock(&self) -> Result<StateGuard, StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;

        file.try_lock_exclusive().map_err(|e| StateError::Io(e))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let state = if contents.trim().is_empty() {
            State::None
        } else {
            State::from_str(&contents)?
        };

        Ok(StateGuard { file, state })
    }
}

pub struct StateGuard {
    file: File,
    pub state: State,
}

impl StateGuard {
    /// succeed only if the current state is one of `allowed`.
    pub fn require(&self, allowed: &[State]) -> Result<(), StateError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(StateError::IllegalTransition { found: self.state, expected: allowed.to_vec() })
        }
    }

    /// persist a new state and update the in-memory copy. Caller keeps
    /// holding the lock until the guard is dropped.
    pub fn transition(&mut self, new: State) -> Result<(), StateError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(new.to_string().as_bytes())?;
        self.file.flush()?;
        self.state = new;
        Ok(())
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// read the current state without taking the lock - used for non-authoritative
/// observations (e.g. the day-job exclusivity check before a lock attempt).
pub fn peek_state(path: impl AsRef<Path>) -> Result<State, StateError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(State::None);
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        Ok(State::None)
    } else {
        State::from_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sf = StateFile::new(dir.path().join("state.a"));
        let guard = sf.lock().unwrap();
        assert_eq!(guard.state, State::None);
    }

    #[test]
    fn transition_persists_across_locks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.a");
        {
            let sf = StateFile::new(&path);
            let mut guard = sf.lock().unwrap();
            guard.require(&[State::None, State::Processed]).unwrap();
            guard.transition(State::Queued).unwrap();
        }
        let sf = StateFile::new(&path);
        let guard = sf.lock().unwrap();
        assert_eq!(guard.state, State::Queued);
    }

    #[test]
    fn require_rejects_illegal_state() {
        let dir = tempfile::tempdir().unwrap();
        let sf = StateFile::new(dir.path().join("state.a"));
        let mut guard = sf.lock().unwrap();
        guard.transition(State::Running).unwrap();
        drop(guard);

        let guard = sf.lock().unwrap();
        assert!(guard.require(&[State::None, State::Processed]).is_err());
    }

    #[test]
    fn peek_does_not_require_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.0");
        assert_eq!(peek_state(&path).unwrap(), State::None);
        let sf = StateFile::new(&path);
        let mut guard = sf.lock().unwrap();
        guard.transition(State::Running).unwrap();
        drop(guard);
        assert_eq!(peek_state(&path).unwrap(), State::Running);
    }
}
