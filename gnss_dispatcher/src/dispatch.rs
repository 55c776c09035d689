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

//! The per-file dispatch decision: parse, resolve, archive, ledger-gate,
//! enqueue.

use std::path::{Path, PathBuf};

use gnss_common::fs::{atomic_move_into, ensure_dir};
use gnss_core::catalog::SiteCatalog;
use gnss_core::ident::WorkUnitId;
use gnss_core::ledger::Ledger;
use gnss_core::parse::parse;
use gnss_core::unpack::UnpackRequest;
use tracing::warn;

use crate::errors::DispatcherError;

pub struct DispatchContext<'a> {
    pub catalog: &'a dyn SiteCatalog,
    pub ledger: &'a dyn Ledger,
    pub savedir: &'a Path,
    pub workdir_root: &'a Path,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Enqueued(UnpackRequest),
    MovedToStale(PathBuf),
}

pub fn dispatch_file(path: &Path, ctx: &DispatchContext) -> Result<DispatchOutcome, DispatcherError> {
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();

    let parsed = match parse(&basename) {
        Ok(p) => p,
        Err(e) => {
            warn!(file = %basename, error = %e, "unrecognized filename, moving to stale");
            return Ok(DispatchOutcome::MovedToStale(move_to_stale(path, ctx.savedir)?));
        }
    };

    let Some(record) = ctx.catalog.resolve(&parsed.site4) else {
        warn!(file = %basename, site4 = %parsed.site4, "unknown site, moving to stale");
        return Ok(DispatchOutcome::MovedToStale(move_to_stale(path, ctx.savedir)?));
    };

    let site9 = parsed.site9.clone().unwrap_or(record.site9);
    let interval = parsed.interval.unwrap_or(record.interval);

    let savedir = ctx.savedir.join(&site9).join(parsed.year.to_string()).join(parsed.doy.to_string());
    let archived = atomic_move_into(path, &savedir)?;

    let workdir = ctx.workdir_root.join(&site9).join(parsed.year.to_string()).join(parsed.doy.to_string());
    let day = WorkUnitId::day(site9.clone(), parsed.year, parsed.doy);

    if !workdir.is_dir() && ctx.ledger.records(&day) {
        return Err(DispatcherError::AlreadyProcessed { site: site9, year: parsed.year, doy: parsed.doy });
    }

    ensure_dir(&workdir)?;

    Ok(DispatchOutcome::Enqueued(UnpackRequest {
        path: archived,
        parsed,
        site9,
        interval,
        workdir,
    }))
}

fn move_to_stale(path: &Path, savedir: &Path) -> Result<PathBuf, DispatcherError> {
    let stale_dir = savedir.join("stale");
    Ok(atomic_move_into(path, stale_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_core::catalog::SiteRecord;
    use gnss_core::ledger::Ledger;
    use std::collections::HashMap;

    struct NullLedger;
    impl Ledger for NullLedger {
        fn records(&self, _id: &WorkUnitId) -> bool {
            false
        }
    }

    struct AlwaysLedger;
    impl Ledger for AlwaysLedger {
        fn records(&self, _id: &WorkUnitId) -> bool {
            true
        }
    }

    fn catalog() -> HashMap<String, SiteRecord> {
        [("ABCD".to_string(), SiteRecord { site9: "ABCD00DNK".to_string(), interval: 30 })].into_iter().collect()
    }

    #[test]
    fn unrecognized_filename_goes_to_stale() {
        let dir = tempfile::tempdir().unwrap();
        let savedir = dir.path().join("savedir");
        let workdir_root = dir.path().join("workdir");
        std::fs::create_dir_all(&savedir).unwrap();
        let incoming = dir.path().join("garbage.txt");
        std::fs::write(&incoming, "x").unwrap();

        let cat = catalog();
        let ledger = NullLedger;
        let ctx = DispatchContext { catalog: &cat, ledger: &ledger, savedir: &savedir, workdir_root: &workdir_root };

        let outcome = dispatch_file(&incoming, &ctx).unwrap();
        match outcome {
            DispatchOutcome::MovedToStale(p) => assert!(p.starts_with(savedir.join("stale"))),
            _ => panic!("expected stale"),
        }
    }

    #[test]
    fn long_form_enqueues_unpack_request() {
        let dir = tempfile::tempdir().unwrap();
        let savedir = dir.path().join("savedir");
        let workdir_root = dir.path().join("workdir");
        std::fs::create_dir_all(&savedir).unwrap();
        let name = "ABCD00DNK_R_20191520000_01H_30S_MO.rnx.gz";
        let incoming = dir.path().join(name);
        std::fs::write(&incoming, "x").unwrap();

        let cat = catalog();
        let ledger = NullLedger;
        let ctx = DispatchContext { catalog: &cat, ledger: &ledger, savedir: &savedir, workdir_root: &workdir_root };

        let outcome = dispatch_file(&incoming, &ctx).unwrap();
        match outcome {
            DispatchOutcome::Enqueued(req) => {
                assert_eq!(req.site9, "ABCD00DNK");
                assert_eq!(req.interval, 30);
                assert!(req.path.starts_with(savedir.join("ABCD00DNK").join("2019").join("152")));
            }
            _ => panic!("expected enqueued"),
        }
    }

    #[test]
    fn already_processed_day_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let savedir = dir.path().join("savedir");
        let workdir_root = dir.path().join("workdir");
        std::fs::create_dir_all(&savedir).unwrap();
        let name = "ABCD00DNK_R_20191520000_01H_30S_MO.rnx.gz";
        let incoming = dir.path().join(name);
        std::fs::write(&incoming, "x").unwrap();

        let cat = catalog();
        let ledger = AlwaysLedger;
        let ctx = DispatchContext { catalog: &cat, ledger: &ledger, savedir: &savedir, workdir_root: &workdir_root };

        let err = dispatch_file(&incoming, &ctx).unwrap_err();
        assert!(matches!(err, DispatcherError::AlreadyProcessed { .. }));
    }
}
