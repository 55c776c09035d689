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

//! Filename Parser: recognizes the four inbound filename dialects and
//! yields a structured descriptor, or a not-recognized signal.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::ident::year_from_2digit;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("filename not recognized: {0}")]
    NotRecognized(String),

    #[error("unsupported non-zero minute offset in {0}")]
    NonZeroMinute(String),
}

/// which external decoder path a recognized name feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SeptentrioRnx3,
    SeptentrioRaw,
    TrinzicZip,
    LeicaZip,
}

/// the RINEX v3 file category encoded in a long-form or legacy-short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// mixed observation file (`MO`)
    Mo,
    /// per-constellation navigation file, letter is one of G R E C J I S
    Nav(char),
    /// mixed navigation file (presence implies completeness)
    Mn,
}

impl FileKind {
    /// the 2-character RINEX v3 type code (`MO`, `GN`, ..., `MN`).
    pub fn code(&self) -> String {
        match self {
            FileKind::Mo => "MO".to_string(),
            FileKind::Nav(c) => format!("{c}N"),
            FileKind::Mn => "MN".to_string(),
        }
    }
}

/// legacy short-code to long RINEX v3 type-letter map.
pub fn legacy_suffix_to_kind(suffix: char) -> Option<FileKind> {
    match suffix.to_ascii_lowercase() {
        'o' => Some(FileKind::Mo),
        'n' => Some(FileKind::Nav('G')),
        'g' => Some(FileKind::Nav('R')),
        'l' => Some(FileKind::Nav('E')),
        'f' => Some(FileKind::Nav('C')),
        'q' => Some(FileKind::Nav('J')),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub source: SourceKind,
    /// present only when the long-form dialect gave us the full 9-char
    /// name directly; otherwise resolution against the Site Catalog is
    /// required to fill this in.
    pub site9: Option<String>,
    pub site4: String,
    pub year: u16,
    pub doy: u16,
    pub hour: char,
    /// only set for single-file RINEX v3/legacy names, not archive names.
    pub ftyp: Option<FileKind>,
    /// only encoded in the long-form MO filename.
    pub interval: Option<u16>,
}

lazy_static! {
    // SSSSSSSSS_R_YYYYDDDHHMM_NNH_NNS_MO.rnx(.gz)? or ..._NNH_xN.rnx(.gz)?
    static ref RNX3_LONG: Regex = Regex::new(
        r"(?i)^([A-Z0-9]{9})_R_(\d{4})(\d{3})(\d{2})(\d{2})_(\d{2})([HD])_(?:(\d{2})S_)?([A-Z]{2})\.rnx(\.gz)?$"
    ).unwrap();

    // SSSSDDDH.YY?  ? in {o n g l f q}
    static ref LEGACY_SHORT: Regex = Regex::new(
        r"(?i)^([A-Z0-9]{4})(\d{3})([a-x0])\.(\d{2})([onglfq])$"
    ).unwrap();

    // SSSSYYYYMMDDHHMMB.zip
    static ref TRIMBLE_ZIP: Regex = Regex::new(
        r"(?i)^([A-Z0-9]{4})(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})[A-Z]\.zip$"
    ).unwrap();

    // SSSSDDDH[MM]?.YY[a-z].zip
    static ref LEICA_ZIP: Regex = Regex::new(
        r"(?i)^([A-Z0-9]{4})(\d{3})([a-x0])(\d{2})?\.(\d{2})[a-z]\.zip$"
    ).unwrap();
}

/// parse a bare filename (no directory component) into a [`ParsedName`].
pub fn parse(name: &str) -> Result<ParsedName, ParseError> {
    if let Some(caps) = RNX3_LONG.captures(name) {
        let site9 = caps[1].to_ascii_uppercase();
        let year: u16 = caps[2].parse().unwrap();
        let doy: u16 = caps[3].parse().unwrap();
        let hh: u8 = caps[4].parse().unwrap();
        let mi: u8 = caps[5].parse().unwrap();
        if mi != 0 {
            return Err(ParseError::NonZeroMinute(name.to_string()));
        }
        let period_unit = caps[7].chars().next().unwrap().to_ascii_uppercase();
        let hour = if period_unit == 'D' {
            '0'
        } else {
            crate::ident::hour_letter_from_hh(hh).ok_or_else(|| ParseError::NotRecognized(name.to_string()))?
        };
        let interval: Option<u16> = caps.get(8).map(|m| m.as_str().parse().unwrap());
        let ftyp_code = caps[9].to_ascii_uppercase();
        let ftyp = if ftyp_code == "MO" {
            FileKind::Mo
        } else if ftyp_code == "MN" {
            FileKind::Mn
        } else if ftyp_code.ends_with('N') {
            FileKind::Nav(ftyp_code.chars().next().unwrap())
        } else {
            return Err(ParseError::NotRecognized(name.to_string()));
        };

        return Ok(ParsedName {
            source: SourceKind::SeptentrioRnx3,
            site9: Some(site9.clone()),
            site4: site9[..4].to_string(),
            year,
            doy,
            hour,
            ftyp: Some(ftyp),
            interval,
        });
    }

    if let Some(caps) = LEGACY_SHORT.captures(name) {
        let site4 = caps[1].to_ascii_uppercase();
        let doy: u16 = caps[2].parse().unwrap();
        let hour = caps[3].chars().next().unwrap().to_ascii_lowercase();
        let yy: u16 = caps[4].parse().unwrap();
        let year = year_from_2digit(yy);
        let suffix = caps[5].chars().next().unwrap();
        let ftyp = legacy_suffix_to_kind(suffix).ok_or_else(|| ParseError::NotRecognized(name.to_string()))?;

        return Ok(ParsedName {
            source: SourceKind::SeptentrioRaw,
            site9: None,
            site4,
            year,
            doy,
            hour,
            ftyp: Some(ftyp),
            interval: None,
        });
    }

    if let Some(caps) = TRIMBLE_ZIP.captures(name) {
        let site4 = caps[1].to_ascii_uppercase();
        let year: u16 = caps[2].parse().unwrap();
        let month: u32 = caps[3].parse().unwrap();
        let day: u32 = caps[4].parse().unwrap();
        let hh: u8 = caps[5].parse().unwrap();
        let mi: u8 = caps[6].parse().unwrap();
        if mi != 0 {
            return Err(ParseError::NonZeroMinute(name.to_string()));
        }
        let doy = day_of_year(year, month, day).ok_or_else(|| ParseError::NotRecognized(name.to_string()))?;
        let hour = crate::ident::hour_letter_from_hh(hh).ok_or_else(|| ParseError::NotRecognized(name.to_string()))?;

        return Ok(ParsedName {
            source: SourceKind::TrinzicZip,
            site9: None,
            site4,
            year,
            doy,
            hour,
            ftyp: None,
            interval: None,
        });
    }

    if let Some(caps) = LEICA_ZIP.captures(name) {
        let site4 = caps[1].to_ascii_uppercase();
        let doy: u16 = caps[2].parse().unwrap();
        let hour = caps[3].chars().next().unwrap().to_ascii_lowercase();
        if let Some(mm) = caps.get(4) {
            let mi: u8 = mm.as_str().parse().unwrap();
            if mi != 0 {
                return Err(ParseError::NonZeroMinute(name.to_string()));
            }
        }
        let yy: u16 = caps[5].parse().unwrap();
        let year = year_from_2digit(yy);

        return Ok(ParsedName {
            source: SourceKind::LeicaZip,
            site9: None,
            site4,
            year,
            doy,
            hour,
            ftyp: None,
            interval: None,
        });
    }

    Err(ParseError::NotRecognized(name.to_string()))
}

/// day-of-year for a Gregorian `(year, month, day)`, using `chrono`.
fn day_of_year(year: u16, month: u32, day: u32) -> Option<u16> {
    use chrono::{Datelike, NaiveDate};
    NaiveDate::from_ymd_opt(year as i32, month, day).map(|d| d.ordinal() as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_form_obs_and_nav() {
        let obs = parse("ABCD00DNK_R_20191520000_01H_30S_MO.rnx.gz").unwrap();
        assert_eq!(obs.site9.as_deref(), Some("ABCD00DNK"));
        assert_eq!(obs.year, 2019);
        assert_eq!(obs.doy, 152);
        assert_eq!(obs.hour, 'a');
        assert_eq!(obs.interval, Some(30));
        assert_eq!(obs.ftyp, Some(FileKind::Mo));

        let nav = parse("ABCD00DNK_R_20191520000_01H_GN.rnx.gz").unwrap();
        assert_eq!(nav.ftyp, Some(FileKind::Nav('G')));
        assert_eq!(nav.hour, 'a');
        assert_eq!(nav.interval, None);
    }

    #[test]
    fn daily_period_forces_hour_zero() {
        let p = parse("ABCD00DNK_R_20191520000_01D_MN.rnx").unwrap();
        assert_eq!(p.hour, '0');
        assert_eq!(p.ftyp, Some(FileKind::Mn));
    }

    #[test]
    fn nonzero_minute_rejected() {
        let e = parse("ABCD00DNK_R_20191520015_01H_30S_MO.rnx.gz").unwrap_err();
        assert_eq!(e, ParseError::NonZeroMinute("ABCD00DNK_R_20191520015_01H_30S_MO.rnx.gz".to_string()));
    }

    #[test]
    fn legacy_short_suffix_does_not_match_zip_form() {
        let p = parse("abcd152a.19o.zip");
        // legacy zip form uses the ".zip" leica/trimble branches, not the
        // bare legacy-short branch (which has no trailing archive suffix).
        assert!(p.is_err() || matches!(p.unwrap().source, SourceKind::LeicaZip));
    }

    #[test]
    fn legacy_short_single_file() {
        let p = parse("abcd152a.19o").unwrap();
        assert_eq!(p.source, SourceKind::SeptentrioRaw);
        assert_eq!(p.site4, "ABCD");
        assert_eq!(p.doy, 152);
        assert_eq!(p.hour, 'a');
        assert_eq!(p.year, 2019);
        assert_eq!(p.ftyp, Some(FileKind::Mo));
    }

    #[test]
    fn legacy_short_nav_suffix_map() {
        assert_eq!(parse("abcd152a.19n").unwrap().ftyp, Some(FileKind::Nav('G')));
        assert_eq!(parse("abcd152a.19g").unwrap().ftyp, Some(FileKind::Nav('R')));
        assert_eq!(parse("abcd152a.19l").unwrap().ftyp, Some(FileKind::Nav('E')));
        assert_eq!(parse("abcd152a.19f").unwrap().ftyp, Some(FileKind::Nav('C')));
        assert_eq!(parse("abcd152a.19q").unwrap().ftyp, Some(FileKind::Nav('J')));
    }

    #[test]
    fn trimble_zip_recognized() {
        let p = parse("ABCD201906010000B.zip").unwrap();
        assert_eq!(p.source, SourceKind::TrinzicZip);
        assert_eq!(p.site4, "ABCD");
        assert_eq!(p.year, 2019);
        assert_eq!(p.doy, 152); // June 1 2019
        assert_eq!(p.hour, 'a');
    }

    #[test]
    fn leica_zip_recognized() {
        let p = parse("ABCD152a.19x.zip").unwrap();
        assert_eq!(p.source, SourceKind::LeicaZip);
        assert_eq!(p.site4, "ABCD");
        assert_eq!(p.doy, 152);
        assert_eq!(p.hour, 'a');
        assert_eq!(p.year, 2019);
    }

    #[test]
    fn leica_zip_with_minutes_recognized() {
        let p = parse("ABCD152a00.19x.zip").unwrap();
        assert_eq!(p.source, SourceKind::LeicaZip);
    }

    #[test]
    fn garbage_not_recognized() {
        assert!(parse("readme.txt").is_err());
        assert!(parse("").is_err());
    }
}
