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

//! RINEX Set: the in-memory and on-disk representation of one hour's
//! collected files for a station/day.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gnss_common::datetime::EpochMillis;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::WorkUnitId;
use crate::parse::FileKind;

#[derive(Error, Debug)]
pub enum RinexSetError {
    #[error("rinex set io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rinex set json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RinexSet {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: char,
    pub interval: Option<u16>,

    /// the `MO.<interval>` file name.
    pub mo: Option<String>,
    /// `{G,R,E,C,J,I,S}N` per-constellation navigation file names, keyed by
    /// constellation letter.
    pub nav: BTreeMap<char, String>,
    /// mixed-navigation file name; presence implies completeness.
    pub mn: Option<String>,
    pub zipfile: Option<String>,
    pub origs: Vec<String>,

    pub timecreated: EpochMillis,
    pub timestamp: EpochMillis,
}

impl RinexSet {
    pub fn new(id: &WorkUnitId) -> Self {
        let now = EpochMillis::now();
        RinexSet {
            site: id.site.clone(),
            year: id.year,
            doy: id.doy,
            hour: id.hour,
            interval: None,
            mo: None,
            nav: BTreeMap::new(),
            mn: None,
            zipfile: None,
            origs: Vec::new(),
            timecreated: now,
            timestamp: now,
        }
    }

    pub fn id(&self) -> WorkUnitId {
        WorkUnitId::new(self.site.clone(), self.year, self.doy, self.hour)
    }

    /// canonical filename prefix shared by all files of this set, e.g.
    /// `ABCD00DNK_R_2019152`.
    pub fn prefix(&self) -> String {
        format!("{}_R_{:04}{:03}", self.site, self.year, self.doy)
    }

    /// attach a file by [`FileKind`], recording its canonical name and
    /// bumping `timestamp`. For [`FileKind::Mo`] also records `interval`
    /// when supplied.
    pub fn attach(&mut self, kind: FileKind, fname: impl Into<String>, interval: Option<u16>, orig: impl Into<String>) {
        let fname = fname.into();
        match kind {
            FileKind::Mo => {
                self.mo = Some(fname);
                if interval.is_some() {
                    self.interval = interval;
                }
            }
            FileKind::Nav(c) => {
                self.nav.insert(c, fname);
            }
            FileKind::Mn => {
                self.mn = Some(fname);
            }
        }
        self.origs.push(orig.into());
        self.timestamp = EpochMillis::now();
    }

    /// at least one MO file and at least one NAV file.
    pub fn is_submittable(&self) -> bool {
        self.mo.is_some() && !self.nav.is_empty()
    }

    /// presence of the mixed-navigation file disables further waiting.
    pub fn is_complete(&self) -> bool {
        self.mn.is_some()
    }

    pub fn canonical_name(&self, kind: FileKind) -> String {
        let period = if self.hour == '0' { "01D".to_string() } else { "01H".to_string() };
        match kind {
            FileKind::Mo => {
                let interval = self.interval.unwrap_or(30);
                format!("{}{:02}00_{period}_{interval:02}S_MO.rnx", self.prefix(), hour_hhmm(self.hour))
            }
            _ => format!("{}{:02}00_{period}_{}.rnx", self.prefix(), hour_hhmm(self.hour), kind.code()),
        }
    }

    pub fn to_json_path(&self, path: impl AsRef<Path>) -> Result<(), RinexSetError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, RinexSetError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn hour_hhmm(hour: char) -> u8 {
    crate::ident::hh_from_hour_letter(hour).filter(|hh| *hh < 24).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submittable_requires_mo_and_nav() {
        let id = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        let mut rs = RinexSet::new(&id);
        assert!(!rs.is_submittable());
        rs.attach(FileKind::Mo, "ABCD00DNK_R_20191520000_01H_30S_MO.rnx", Some(30), "orig1");
        assert!(!rs.is_submittable());
        rs.attach(FileKind::Nav('G'), "ABCD00DNK_R_20191520000_01H_GN.rnx", None, "orig2");
        assert!(rs.is_submittable());
        assert!(!rs.is_complete());
    }

    #[test]
    fn mn_marks_complete() {
        let id = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        let mut rs = RinexSet::new(&id);
        rs.attach(FileKind::Mn, "ABCD00DNK_R_20191520000_01H_MN.rnx", None, "orig");
        assert!(rs.is_complete());
    }

    #[test]
    fn json_roundtrip() {
        let id = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        let mut rs = RinexSet::new(&id);
        rs.attach(FileKind::Mo, "mo.rnx", Some(30), "o1");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rs.a.json");
        rs.to_json_path(&path).unwrap();
        let loaded = RinexSet::from_json_path(&path).unwrap();
        assert_eq!(loaded.site, "ABCD00DNK");
        assert_eq!(loaded.mo, rs.mo);
        assert_eq!(loaded.interval, Some(30));
    }
}
