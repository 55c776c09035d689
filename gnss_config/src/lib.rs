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
#![allow(unused)]

//! Mandatory config-file lookup for the dispatcher and job-engine binaries.
//!
//! Config is a single RON file per binary, loaded eagerly at startup with
//! [`load_config`] - there is no XDG/embedded-binary lookup here (unlike the
//! teacher's `odin_config`, which supports several deployment modes): this
//! daemon always runs from a known ground-station host with a config file
//! path supplied on the command line via `-c`.

pub mod errors;
use crate::errors::ConfigError;
type Result<T> = std::result::Result<T, ConfigError>;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;

/// load and parse a RON config file of type `C`. Fatal at startup if it is
/// missing or malformed - both are listed as startup-fatal error kinds.
pub fn load_config<C: serde::de::DeserializeOwned>(pathname: impl AsRef<Path>) -> Result<C> {
    let path = pathname.as_ref();
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let mut file = File::open(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut contents = String::with_capacity(len as usize);
    file.read_to_string(&mut contents).map_err(|e| ConfigError::Io(e.to_string()))?;

    ron::from_str::<C>(&contents).map_err(|e| ConfigError::Parse(format!("{path:?}: {e}")))
}

/// the four shared spool directories. All four must reside on the same
/// filesystem so that hand-offs between them can use `rename()`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpoolPaths {
    pub incoming: String,
    pub savedir: String,
    pub workdir: String,
    pub jobqueue: String,
}

/// configuration shared by both the dispatcher and the job engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub paths: SpoolPaths,

    /// size of the Unpack Pool (dispatcher default `-i`)
    #[serde(default = "default_unpack_threads")]
    pub unpack_threads: usize,

    /// size of the Job Engine worker pool (`-i`)
    #[serde(default = "default_job_instances")]
    pub job_instances: usize,

    /// path to the site-catalog snapshot (4->9 char mapping + interval)
    pub site_catalog: String,

    /// path to the read-only daily-summary ledger snapshot
    pub ledger: String,

    /// paths to the external decoder binaries (gunzip, unzip, crx2rnx, sbf2rin)
    #[serde(default)]
    pub decoders: DecoderPaths,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DecoderPaths {
    #[serde(default = "default_gunzip")]
    pub gunzip: String,
    #[serde(default = "default_unzip")]
    pub unzip: String,
    #[serde(default = "default_crx2rnx")]
    pub crx2rnx: String,
    #[serde(default = "default_sbf2rin")]
    pub sbf2rin: String,
}

/// job engine configuration: the shared spool paths plus the opaque
/// external programs invoked from `job.process()` and the uploader's
/// reload mechanism.
#[derive(Debug, Clone, Deserialize)]
pub struct JobEngineConfig {
    pub paths: SpoolPaths,

    #[serde(default = "default_job_instances")]
    pub job_instances: usize,

    #[serde(default)]
    pub programs: JobPrograms,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobPrograms {
    #[serde(default = "default_ftp_uploader")]
    pub ftp_uploader: String,
    #[serde(default = "default_hour2daily")]
    pub hour2daily: String,
    /// PID file of the running FTP/SFTP uploader service; `reload
    /// ftpuploader` sends it `SIGHUP`.
    #[serde(default = "default_uploader_pidfile")]
    pub uploader_pidfile: String,
}

fn default_unpack_threads() -> usize { 4 }
fn default_job_instances() -> usize { 4 }
fn default_gunzip() -> String { "/usr/bin/gunzip".to_string() }
fn default_unzip() -> String { "/usr/bin/unzip".to_string() }
fn default_crx2rnx() -> String { "/usr/local/bin/crx2rnx".to_string() }
fn default_sbf2rin() -> String { "/usr/local/bin/sbf2rin".to_string() }
fn default_ftp_uploader() -> String { "/usr/local/bin/ftpuploader".to_string() }
fn default_hour2daily() -> String { "/usr/local/bin/hour2daily".to_string() }
fn default_uploader_pidfile() -> String { "/var/run/ftpuploader.pid".to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Small { a: i32, b: String }

    #[test]
    fn missing_file_is_not_found() {
        let r: Result<Small> = load_config("/no/such/file.ron");
        assert!(matches!(r, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn loads_well_formed_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.ron");
        std::fs::write(&path, "(a: 3, b: \"hi\")").unwrap();
        let s: Small = load_config(&path).unwrap();
        assert_eq!(s.a, 3);
        assert_eq!(s.b, "hi");
    }

    #[test]
    fn rejects_malformed_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "not ron at all {{{").unwrap();
        let r: Result<Small> = load_config(&path);
        assert!(matches!(r, Err(ConfigError::Parse(_))));
    }
}
