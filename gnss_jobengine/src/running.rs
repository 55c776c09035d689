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

//! Boss-side `Running` table: the duplicate-ident guard that keeps the same
//! work unit from being submitted to the pool twice while a job for it is
//! already in flight.

use std::collections::HashSet;
use std::sync::Mutex;

use gnss_core::ident::WorkUnitId;

#[derive(Default)]
pub struct RunningTable {
    idents: Mutex<HashSet<WorkUnitId>>,
}

impl RunningTable {
    pub fn new() -> Self {
        RunningTable::default()
    }

    /// `true` and records `ident` iff it was not already present.
    pub fn try_start(&self, ident: &WorkUnitId) -> bool {
        let mut guard = self.idents.lock().expect("running table lock poisoned");
        guard.insert(ident.clone())
    }

    pub fn finish(&self, ident: &WorkUnitId) {
        let mut guard = self.idents.lock().expect("running table lock poisoned");
        guard.remove(ident);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ident_is_rejected_until_finished() {
        let table = RunningTable::new();
        let ident = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        assert!(table.try_start(&ident));
        assert!(!table.try_start(&ident));
        table.finish(&ident);
        assert!(table.try_start(&ident));
    }
}
