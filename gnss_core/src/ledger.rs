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

//! Read-only daily-summary ledger: the `gpssums(site, year, doy, hour)`
//! table. A row with `hour='0'` blocks new work for that day until the
//! operator runs `forget`.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use thiserror::Error;

use crate::ident::WorkUnitId;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger file not found: {0}")]
    NotFound(String),

    #[error("ledger parse error: {0}")]
    Parse(String),

    #[error("ledger io error: {0}")]
    Io(String),
}

pub trait Ledger: Send + Sync {
    fn records(&self, id: &WorkUnitId) -> bool;
}

#[derive(Debug, Deserialize)]
struct LedgerFile {
    gpssums: Vec<LedgerRow>,
}

#[derive(Debug, Deserialize)]
struct LedgerRow {
    site: String,
    year: u16,
    doy: u16,
    hour: char,
}

pub struct FileLedger {
    path: PathBuf,
    rows: RwLock<HashSet<WorkUnitId>>,
}

impl FileLedger {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let rows = read_ledger_file(&path)?;
        Ok(FileLedger { path, rows: RwLock::new(rows) })
    }

    pub fn reload(&self) -> Result<(), LedgerError> {
        let fresh = read_ledger_file(&self.path)?;
        let mut guard = self.rows.write().expect("ledger lock poisoned");
        *guard = fresh;
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn records(&self, id: &WorkUnitId) -> bool {
        let guard = self.rows.read().expect("ledger lock poisoned");
        guard.contains(id)
    }
}

fn read_ledger_file(path: &Path) -> Result<HashSet<WorkUnitId>, LedgerError> {
    if !path.is_file() {
        return Err(LedgerError::NotFound(path.display().to_string()));
    }
    let mut file = File::open(path).map_err(|e| LedgerError::Io(e.to_string()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|e| LedgerError::Io(e.to_string()))?;

    let parsed: LedgerFile = ron::from_str(&contents).map_err(|e| LedgerError::Parse(format!("{path:?}: {e}")))?;

    Ok(parsed
        .gpssums
        .into_iter()
        .map(|r| WorkUnitId::new(r.site, r.year, r.doy, r.hour))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_job_row_blocks_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.ron");
        std::fs::write(&path, r#"(gpssums: [(site: "ABCD00DNK", year: 2019, doy: 152, hour: '0')])"#).unwrap();
        let ledger = FileLedger::load(&path).unwrap();

        assert!(ledger.records(&WorkUnitId::day("ABCD00DNK", 2019, 152)));
        assert!(!ledger.records(&WorkUnitId::new("ABCD00DNK", 2019, 152, 'a')));
        assert!(!ledger.records(&WorkUnitId::day("ABCD00DNK", 2019, 153)));
    }
}
