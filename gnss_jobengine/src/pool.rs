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

//! Worker pool: a bounded set of independent OS-process workers, each the
//! current binary re-exec'd with a hidden `--run-job` subcommand. A crash
//! or panic in a worker only takes out that child process.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use gnss_core::ident::WorkUnitId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Ok,
    Error(String),
    Fatal(String),
}

pub struct PoolResult {
    pub ident: WorkUnitId,
    pub outcome: JobOutcome,
}

/// bounded pool of `capacity` concurrent child-process workers.
pub struct WorkerPool {
    exe: PathBuf,
    config_path: PathBuf,
    permits: Arc<Semaphore>,
    pids: Arc<Mutex<HashSet<u32>>>,
    result_tx: mpsc::Sender<PoolResult>,
}

impl WorkerPool {
    pub fn new(exe: PathBuf, config_path: PathBuf, capacity: usize) -> (Self, mpsc::Receiver<PoolResult>) {
        let (result_tx, result_rx) = mpsc::channel(256);
        (
            WorkerPool {
                exe,
                config_path,
                permits: Arc::new(Semaphore::new(capacity.max(1))),
                pids: Arc::new(Mutex::new(HashSet::new())),
                result_tx,
            },
            result_rx,
        )
    }

    /// queue a job for execution; returns immediately. Backpressure comes
    /// from the bounded semaphore - submissions beyond `capacity` wait
    /// inside the spawned task rather than blocking the boss loop.
    pub fn submit(&self, ident: WorkUnitId, job_content: String) {
        let exe = self.exe.clone();
        let config_path = self.config_path.clone();
        let permits = Arc::clone(&self.permits);
        let pids = Arc::clone(&self.pids);
        let tx = self.result_tx.clone();

        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.expect("worker pool semaphore closed");
            let outcome = run_child(&exe, &config_path, job_content.as_str(), &pids).await;
            let _ = tx.send(PoolResult { ident, outcome }).await;
        });
    }

    /// best-effort SIGTERM to every in-flight child, used on the fatal
    /// backoff path; does not wait for them to exit.
    pub fn force_shutdown(&self) {
        let pids: Vec<u32> = self.pids.lock().expect("pid set lock poisoned").iter().copied().collect();
        for pid in pids {
            let _ = std::process::Command::new("/bin/kill").arg("-TERM").arg(pid.to_string()).status();
        }
    }
}

async fn run_child(
    exe: &std::path::Path,
    config_path: &std::path::Path,
    job_content: &str,
    pids: &Arc<Mutex<HashSet<u32>>>,
) -> JobOutcome {
    let mut cmd = Command::new(exe);
    cmd.arg("--run-job")
        .arg("-c")
        .arg(config_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return JobOutcome::Fatal(format!("failed to spawn worker: {e}")),
    };

    let pid = child.id();
    if let Some(pid) = pid {
        pids.lock().expect("pid set lock poisoned").insert(pid);
    }

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(job_content.as_bytes()).await {
            warn!(error = %e, "failed writing job content to worker stdin");
        }
    }

    let mut stderr_buf = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut stderr_buf).await;
    }

    let status = child.wait().await;

    if let Some(pid) = pid {
        pids.lock().expect("pid set lock poisoned").remove(&pid);
    }

    match status {
        Ok(status) => match status.code() {
            Some(code) if code == crate::worker::EXIT_OK => JobOutcome::Ok,
            Some(code) if code == crate::worker::EXIT_ERROR => JobOutcome::Error(stderr_buf),
            other => JobOutcome::Fatal(format!("worker exited abnormally (code {other:?}): {stderr_buf}")),
        },
        Err(e) => JobOutcome::Fatal(format!("failed waiting on worker: {e}")),
    }
}
