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

//! Inbound Dispatcher binary: watches INCOMING, parses and routes each
//! file, unpacks single-file dialects straight through, and forwards
//! multi-file long-RINEX-v3 uploads to the Pending Aggregator.

mod dispatch;
mod errors;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gnss_config::{load_config, CoreConfig};
use gnss_core::catalog::FileSiteCatalog;
use gnss_core::job::JobQueue;
use gnss_core::ledger::FileLedger;
use gnss_core::pending::{PendingAggregator, PendingMessage};
use gnss_core::unpack::{process_request, Decoders, UnpackOutcome, UnpackRequest};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use dispatch::{dispatch_file, DispatchContext, DispatchOutcome};
use watcher::{rescan, rescan_period, spawn_notify_watcher, SeenSet, WatchMessage};

#[derive(Parser, Debug)]
#[command(name = "gnss_dispatcher", about = "GNSS ground-station inbound dispatcher")]
struct Cli {
    /// path to the dispatcher's RON config file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// enable debug-level logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// override the configured Unpack Pool worker count
    #[arg(short = 'i', long = "instances")]
    instances: Option<usize>,

    /// log channel name (kept for operational parity; log output always
    /// goes to the configured tracing subscriber)
    #[arg(short = 'l', long = "log")]
    log_channel: Option<String>,
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

    let config: CoreConfig = load_config(&cli.config)?;
    let unpack_threads = cli.instances.unwrap_or(config.unpack_threads).max(1);

    let incoming_dir = PathBuf::from(&config.paths.incoming);
    let savedir = PathBuf::from(&config.paths.savedir);
    let workdir_root = PathBuf::from(&config.paths.workdir);
    let jobqueue_dir = PathBuf::from(&config.paths.jobqueue);

    gnss_common::fs::ensure_dir(&incoming_dir)?;
    gnss_common::fs::ensure_dir(&savedir)?;
    gnss_common::fs::ensure_dir(&workdir_root)?;

    let catalog = Arc::new(FileSiteCatalog::load(&config.site_catalog)?);
    let ledger = Arc::new(FileLedger::load(&config.ledger)?);
    let decoders = Arc::new(Decoders {
        gunzip: PathBuf::from(&config.decoders.gunzip),
        unzip: PathBuf::from(&config.decoders.unzip),
        crx2rnx: PathBuf::from(&config.decoders.crx2rnx),
        sbf2rin: PathBuf::from(&config.decoders.sbf2rin),
    });

    let jobqueue = JobQueue::new(jobqueue_dir);

    let (pending_tx, pending_rx) = mpsc::channel::<PendingMessage>(256);
    let aggregator = PendingAggregator::new(workdir_root.clone(), incoming_dir.clone(), jobqueue.clone());
    let aggregator_handle = tokio::spawn(aggregator.run(pending_rx));

    let mut unpack_handles = Vec::with_capacity(unpack_threads);
    for worker_id in 0..unpack_threads {
        let decoders = Arc::clone(&decoders);
        let jobqueue = jobqueue.clone();
        let pending_tx = pending_tx.clone();
        let (tx, mut rx) = mpsc::channel::<UnpackRequest>(32);
        unpack_handles.push((tx, tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                match process_request(&req, &decoders, &jobqueue) {
                    Ok(UnpackOutcome::PendingAdd { ident, fname, orig, interval, kind }) => {
                        let _ = pending_tx.send(PendingMessage::Add { ident, fname, orig, interval, kind }).await;
                    }
                    Ok(UnpackOutcome::Queued { ident }) => info!(worker = worker_id, ident = %ident, "unpack queued for job engine"),
                    Ok(UnpackOutcome::Abandoned { ident }) => warn!(worker = worker_id, ident = %ident, "unpack abandoned: day-job exclusivity"),
                    Ok(UnpackOutcome::Failed { ident }) => error!(worker = worker_id, ident = %ident, "unpack decode failed"),
                    Err(e) => error!(worker = worker_id, error = %e, "unpack request failed"),
                }
            }
        })));
    }

    // round-robins requests across the fixed worker pool above.
    let dispatch_senders: Vec<_> = unpack_handles.iter().map(|(tx, _)| tx.clone()).collect();
    let mut next_worker = 0usize;

    let (watch_tx, mut watch_rx) = mpsc::channel::<WatchMessage>(1024);
    let _notify_watcher = spawn_notify_watcher(incoming_dir.clone(), watch_tx.clone())?;

    let mut rescan_timer = tokio::time::interval(rescan_period());
    rescan_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut seen = SeenSet::new();
    info!(incoming = %incoming_dir.display(), workers = unpack_threads, "dispatcher started");

    loop {
        tokio::select! {
            _ = rescan_timer.tick() => {
                for path in rescan(&incoming_dir) {
                    if seen.admit(&path) {
                        let _ = watch_tx.send(WatchMessage::File(path)).await;
                    }
                }
            }
            _ = sighup.recv() => {
                info!("SIGHUP received: reloading site catalog and forcing a rescan");
                if let Err(e) = catalog.reload() {
                    error!(error = %e, "site catalog reload failed");
                }
                for path in rescan(&incoming_dir) {
                    seen.forget(&path);
                    if seen.admit(&path) {
                        let _ = watch_tx.send(WatchMessage::File(path)).await;
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                break;
            }
            msg = watch_rx.recv() => {
                match msg {
                    Some(WatchMessage::File(path)) => {
                        if !seen.admit(&path) {
                            continue;
                        }
                        let ctx = DispatchContext {
                            catalog: catalog.as_ref(),
                            ledger: ledger.as_ref(),
                            savedir: &savedir,
                            workdir_root: &workdir_root,
                        };
                        match dispatch_file(&path, &ctx) {
                            Ok(DispatchOutcome::MovedToStale(p)) => {
                                info!(path = %p.display(), "moved to stale");
                                seen.forget(&path);
                            }
                            Ok(DispatchOutcome::Enqueued(req)) => {
                                if !dispatch_senders.is_empty() {
                                    let worker = next_worker % dispatch_senders.len();
                                    next_worker = next_worker.wrapping_add(1);
                                    let _ = dispatch_senders[worker].send(req).await;
                                }
                                seen.forget(&path);
                            }
                            Err(e) => {
                                error!(path = %path.display(), error = %e, "dispatch failed");
                                seen.forget(&path);
                            }
                        }
                    }
                    Some(WatchMessage::Rescan) | None => {}
                    Some(WatchMessage::Exit) => break,
                }
            }
        }
    }

    drop(dispatch_senders);
    let _ = pending_tx.send(PendingMessage::Exit).await;
    drop(pending_tx);

    for (tx, handle) in unpack_handles {
        drop(tx);
        let _ = handle.await;
    }
    let _ = aggregator_handle.await;

    Ok(())
}
