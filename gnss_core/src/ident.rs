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

//! Work-unit identity: `(site, year, doy, hour)` and its textual form.

use std::fmt;
use serde::{Deserialize, Serialize};

/// the whole-day aggregation hour.
pub const DAY_HOUR: char = '0';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnitId {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: char,
}

impl WorkUnitId {
    pub fn new(site: impl Into<String>, year: u16, doy: u16, hour: char) -> Self {
        WorkUnitId { site: site.into(), year, doy, hour }
    }

    pub fn day(site: impl Into<String>, year: u16, doy: u16) -> Self {
        WorkUnitId::new(site, year, doy, DAY_HOUR)
    }

    pub fn is_day_job(&self) -> bool {
        self.hour == DAY_HOUR
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.site, self.year, self.doy, self.hour)
    }
}

/// hour letter `'a'..'x'` <-> UTC hour `0..23`; `'0'` <-> 24 (daily convention).
pub fn hour_letter_from_hh(hh: u8) -> Option<char> {
    if hh == 24 {
        Some(DAY_HOUR)
    } else if hh < 24 {
        Some((b'a' + hh) as char)
    } else {
        None
    }
}

/// inverse of [`hour_letter_from_hh`]. Returns the UTC hour, or 24 for the
/// daily sentinel.
pub fn hh_from_hour_letter(c: char) -> Option<u8> {
    if c == DAY_HOUR {
        Some(24)
    } else if ('a'..='x').contains(&c) {
        Some(c as u8 - b'a')
    } else {
        None
    }
}

/// 2-digit year convention: `yy >= 80` is 1900+yy, else 2000+yy.
pub fn year_from_2digit(yy: u16) -> u16 {
    if yy >= 80 { 1900 + yy } else { 2000 + yy }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_display_matches_spec_example() {
        let id = WorkUnitId::new("ABCD00DNK", 2019, 152, 'a');
        assert_eq!(id.to_string(), "ABCD00DNK-2019-152-a");
    }

    #[test]
    fn hour_roundtrip() {
        for hh in 0u8..24 {
            let c = hour_letter_from_hh(hh).unwrap();
            assert_eq!(hh_from_hour_letter(c).unwrap(), hh);
        }
        assert_eq!(hour_letter_from_hh(24), Some('0'));
        assert_eq!(hh_from_hour_letter('0'), Some(24));
    }

    #[test]
    fn two_digit_year_convention() {
        assert_eq!(year_from_2digit(80), 1980);
        assert_eq!(year_from_2digit(79), 2079);
        assert_eq!(year_from_2digit(19), 2019);
    }
}
