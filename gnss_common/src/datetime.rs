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

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// milliseconds since the Unix epoch, used for the timestamps carried in
/// RINEX Set JSON (`timecreated`, `timestamp`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EpochMillis(i64);

impl EpochMillis {
    pub fn now() -> Self {
        EpochMillis(Utc::now().timestamp_millis())
    }

    pub fn new(millis: i64) -> Self {
        EpochMillis(millis)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DateTime::<Utc>::from(*self))
    }
}

impl<Tz> From<DateTime<Tz>> for EpochMillis
where
    Tz: TimeZone,
{
    fn from(date: DateTime<Tz>) -> Self {
        EpochMillis(date.timestamp_millis())
    }
}

impl From<EpochMillis> for DateTime<Utc> {
    fn from(millis: EpochMillis) -> Self {
        DateTime::<Utc>::from_timestamp_millis(millis.0).unwrap()
    }
}

impl PartialOrd for EpochMillis {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_millis() {
        let a = EpochMillis::new(100);
        let b = EpochMillis::new(200);
        assert!(a < b);
    }

    #[test]
    fn roundtrips_through_datetime() {
        let e = EpochMillis::new(1_600_000_000_000);
        let dt: DateTime<Utc> = e.into();
        let back: EpochMillis = dt.into();
        assert_eq!(e, back);
    }
}
