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

//! Job Engine binary: a boss loop that drains `JOBQUEUE/`, dispatches jobs
//! to a bounded pool of re-exec'd `--run-job` child processes, and handles
//! admin commands. Invoked with `--run-job`, the same binary instead runs
//! a single job read from stdin and exits - that's the worker side of the
//! pool.

mod admin;
mod errors;
mod pool;
mod running;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gnss_config::{load_config, JobEngineConfig};
use gnss_core::command::parse_command;
use gnss_core::job::{JobDescriptor, JobQueue, QueueEntry};
use tokio::io::AsyncReadExt;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use admin::{forced_completion_scan, AdminContext};
use pool::{JobOutcome, WorkerPool};
use running::RunningTable;

/// normal drain age gate: a queue file must sit undisturbed this long
/// before the boss reads it, so a writer mid-`rename()` is never raced.
const DRAIN_AGE: Duration = Duration::from_secs(2);
/// poll period approximating the "blocks up to 1s on the inotify fd" of
/// the original design; here the boss just polls the spool directory.
const POLL_PERIOD: Duration = Duration::from_secs(1);
/// idle ticks (seconds) before running the leftover sweep + forced-
/// completion scan.
const IDLE_SWEEP_TICKS: u64 = 600;
/// leftover sweep age gate: a queue file this old survived normal drain,
/// so it is re-read and processed directly rather than waiting on a
/// filesystem watch to notice it again.
const LEFTOVER_AGE: Duration = Duration::from_secs(15 * 60);
/// fatal-backoff sleep before the pool is restarted.
const BACKOFF_SLEEP: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "gnss_jobengine", about = "GNSS ground-station job engine")]
struct Cli {
    /// path to the job engine's RON config file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// enable debug-level logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// override the configured worker pool size
    #[arg(short = 'i', long = "instances")]
    instances: Option<usize>,

    /// log channel name (kept for operational parity; log output always
    /// goes to the configured tracing subscriber)
    #[arg(short = 'l', long = "log")]
    log_channel: Option<String>,

    /// internal: read a single job from stdin, run it, and exit. Used only
    /// by the worker pool's re-exec'd child processes, never by an operator.
    #[arg(long = "run-job", hide = true)]
    run_job: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();

    if let Some(channel) = &cli.log_channel {
        info!(channel = %channel, "log channel configured");
    }

    let config: JobEngineConfig = load_config(&cli.config)?;

    if cli.run_job {
        run_job_child(&config).await
    } else {
        run_boss(&cli, config).await
    }
}

/// worker side: read one job descriptor off stdin, run it, exit with its
/// status code. Never returns - `process::exit` makes the OS-visible exit
/// code itself the crash-isolation boundary the pool classifies on.
async fn run_job_child(config: &JobEngineConfig) -> anyhow::Result<()> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let desc: JobDescriptor = match serde_json::from_str(&input) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "worker: malformed job descriptor on stdin");
            std::process::exit(worker::EXIT_ERROR);
        }
    };

    let workdir_root = PathBuf::from(&config.paths.workdir);
    let code = worker::run_job(&desc, &workdir_root, &config.programs);
    std::process::exit(code);
}

/// boss side: drains `JOBQUEUE/`, dispatches to the pool, runs admin
/// commands, and restarts the pool after a fatal child exit.
async fn run_boss(cli: &Cli, config: JobEngineConfig) -> anyhow::Result<()> {
    let instances = cli.instances.unwrap_or(config.job_instances).max(1);

    let incoming_dir = PathBuf::from(&config.paths.incoming);
    let savedir = PathBuf::from(&config.paths.savedir);
    let workdir_root = PathBuf::from(&config.paths.workdir);
    let jobqueue_dir = PathBuf::from(&config.paths.jobqueue);

    gnss_common::fs::ensure_dir(&incoming_dir)?;
    gnss_common::fs::ensure_dir(&savedir)?;
    gnss_common::fs::ensure_dir(&workdir_root)?;
    gnss_common::fs::ensure_dir(&jobqueue_dir)?;

    let jobqueue = JobQueue::new(jobqueue_dir);
    let running = Arc::new(RunningTable::new());
    let exe = std::env::current_exe()?;

    let (mut pool, mut results_rx) = WorkerPool::new(exe.clone(), cli.config.clone(), instances);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    // the job engine ignores SIGHUP; only the dispatcher and the
    // ftpuploader subprocess (via the `reload ftpuploader` admin command)
    // react to it.

    let mut poll = tokio::time::interval(POLL_PERIOD);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut idle_ticks: u64 = 0;
    let mut need_restart = false;

    info!(jobqueue = %jobqueue.entries_older_than(Duration::ZERO)?.len(), instances, "job engine started");

    'boss: loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break 'boss;
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                break 'boss;
            }
            Some(result) = results_rx.recv() => {
                handle_result(result, &running, &mut need_restart);
            }
            _ = poll.tick() => {
                let drained = match jobqueue.entries_older_than(DRAIN_AGE) {
                    Ok(entries) => entries,
                    Err(e) => { error!(error = %e, "failed listing job queue"); Vec::new() }
                };

                if drained.is_empty() {
                    idle_ticks += 1;
                } else {
                    idle_ticks = 0;
                }

                for path in drained {
                    process_entry(&path, &jobqueue, &running, &pool, &savedir, &incoming_dir, &workdir_root, &config);
                }

                // drain any results that arrived while we were busy above.
                while let Ok(result) = results_rx.try_recv() {
                    handle_result(result, &running, &mut need_restart);
                }

                if idle_ticks >= IDLE_SWEEP_TICKS {
                    idle_ticks = 0;
                    run_leftover_sweep(&jobqueue, &running, &pool, &savedir, &incoming_dir, &workdir_root, &config);

                    let ctx = AdminContext {
                        workdir_root: &workdir_root,
                        savedir: &savedir,
                        incoming_dir: &incoming_dir,
                        jobqueue: &jobqueue,
                        uploader_pidfile: &config.programs.uploader_pidfile,
                    };
                    if let Err(e) = forced_completion_scan(&ctx) {
                        error!(error = %e, "forced-completion scan failed");
                    }
                }

                if need_restart {
                    warn!("worker pool saw a fatal child exit, restarting after backoff");
                    pool.force_shutdown();
                    tokio::time::sleep(BACKOFF_SLEEP).await;
                    let (new_pool, new_rx) = WorkerPool::new(exe.clone(), cli.config.clone(), instances);
                    pool = new_pool;
                    results_rx = new_rx;
                    need_restart = false;
                    info!("worker pool restarted");
                }
            }
        }
    }

    Ok(())
}

fn handle_result(result: pool::PoolResult, running: &RunningTable, need_restart: &mut bool) {
    running.finish(&result.ident);
    match result.outcome {
        JobOutcome::Ok => info!(ident = %result.ident, "job completed"),
        JobOutcome::Error(detail) => warn!(ident = %result.ident, detail, "job failed"),
        JobOutcome::Fatal(detail) => {
            error!(ident = %result.ident, detail, "worker exited abnormally");
            *need_restart = true;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_entry(
    path: &std::path::Path,
    jobqueue: &JobQueue,
    running: &RunningTable,
    pool: &WorkerPool,
    savedir: &std::path::Path,
    incoming_dir: &std::path::Path,
    workdir_root: &std::path::Path,
    config: &JobEngineConfig,
) {
    let entry = match jobqueue.read_entry(path) {
        Ok(e) => e,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed reading job queue entry");
            let _ = jobqueue.unlink(path);
            return;
        }
    };

    match entry {
        QueueEntry::Command(text) => {
            let _ = jobqueue.unlink(path);
            match parse_command(&text) {
                Ok(cmd) => {
                    let ctx = AdminContext {
                        workdir_root,
                        savedir,
                        incoming_dir,
                        jobqueue,
                        uploader_pidfile: &config.programs.uploader_pidfile,
                    };
                    if let Err(e) = admin::execute(&cmd, &ctx) {
                        error!(command = %text, error = %e, "admin command failed");
                    }
                }
                Err(e) => error!(command = %text, error = %e, "unrecognized admin command"),
            }
        }
        QueueEntry::Job(desc) => {
            let ident = desc.id();
            if !running.try_start(&ident) {
                warn!(ident = %ident, "duplicate job rejected, already running");
                let _ = jobqueue.unlink(path);
                return;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed re-reading job content");
                    running.finish(&ident);
                    let _ = jobqueue.unlink(path);
                    return;
                }
            };

            let _ = jobqueue.unlink(path);
            pool.submit(ident, content);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_leftover_sweep(
    jobqueue: &JobQueue,
    running: &RunningTable,
    pool: &WorkerPool,
    savedir: &std::path::Path,
    incoming_dir: &std::path::Path,
    workdir_root: &std::path::Path,
    config: &JobEngineConfig,
) {
    let leftovers = match jobqueue.entries_older_than(LEFTOVER_AGE) {
        Ok(entries) => entries,
        Err(e) => {
            error!(error = %e, "leftover sweep: failed listing job queue");
            return;
        }
    };
    if leftovers.is_empty() {
        return;
    }
    warn!(count = leftovers.len(), "leftover sweep: re-processing stuck queue entries");
    for path in leftovers {
        process_entry(&path, jobqueue, running, pool, savedir, incoming_dir, workdir_root, config);
    }
}
