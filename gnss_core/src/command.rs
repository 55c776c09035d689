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

//! Admin command grammar: `reload ftpuploader`, `force complete ...`,
//! `reprocess ...`. Case-sensitive, one command per queue file.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized admin command: {0:?}")]
    NotRecognized(String),

    #[error("malformed admin command {0:?}: {1}")]
    Malformed(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ReloadFtpUploader,
    ForceComplete { site: String, year: u16, doy: u16 },
    /// `doy_end` equals `doy_start` for a single-day form.
    Reprocess { site: String, year: u16, doy_start: u16, doy_end: u16 },
}

pub fn parse_command(text: &str) -> Result<AdminCommand, CommandError> {
    let text = text.trim();
    let words: Vec<&str> = text.split_whitespace().collect();

    match words.as_slice() {
        ["reload", "ftpuploader"] => Ok(AdminCommand::ReloadFtpUploader),

        ["force", "complete", site, year, doy] => {
            let year = parse_u16(year, text)?;
            let doy = parse_u16(doy, text)?;
            Ok(AdminCommand::ForceComplete { site: site.to_string(), year, doy })
        }

        ["reprocess", site, year, range] => {
            let year = parse_u16(year, text)?;
            let (doy_start, doy_end) = parse_doy_range(range, text)?;
            Ok(AdminCommand::Reprocess { site: site.to_string(), year, doy_start, doy_end })
        }

        _ => Err(CommandError::NotRecognized(text.to_string())),
    }
}

fn parse_u16(s: &str, whole: &str) -> Result<u16, CommandError> {
    s.parse().map_err(|_| CommandError::Malformed(whole.to_string(), format!("{s:?} is not a number")))
}

fn parse_doy_range(s: &str, whole: &str) -> Result<(u16, u16), CommandError> {
    match s.split_once('-') {
        Some((a, b)) => {
            let a = parse_u16(a, whole)?;
            let b = parse_u16(b, whole)?;
            if a > b {
                return Err(CommandError::Malformed(whole.to_string(), format!("range {a}-{b} is inverted")));
            }
            Ok((a, b))
        }
        None => {
            let a = parse_u16(s, whole)?;
            Ok((a, a))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_ftpuploader() {
        assert_eq!(parse_command("reload ftpuploader").unwrap(), AdminCommand::ReloadFtpUploader);
    }

    #[test]
    fn force_complete_parses_site_year_doy() {
        let cmd = parse_command("force complete ABCD00DNK 2019 152").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::ForceComplete { site: "ABCD00DNK".to_string(), year: 2019, doy: 152 }
        );
    }

    #[test]
    fn reprocess_single_day() {
        let cmd = parse_command("reprocess ABCD00DNK 2019 152").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Reprocess { site: "ABCD00DNK".to_string(), year: 2019, doy_start: 152, doy_end: 152 }
        );
    }

    #[test]
    fn reprocess_day_range() {
        let cmd = parse_command("reprocess ABCD00DNK 2019 150-152").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Reprocess { site: "ABCD00DNK".to_string(), year: 2019, doy_start: 150, doy_end: 152 }
        );
    }

    #[test]
    fn inverted_range_rejected() {
        assert!(parse_command("reprocess ABCD00DNK 2019 152-150").is_err());
    }

    #[test]
    fn case_sensitive_grammar() {
        assert!(parse_command("Reload Ftpuploader").is_err());
    }

    #[test]
    fn garbage_not_recognized() {
        assert!(parse_command("drop everything").is_err());
    }
}
