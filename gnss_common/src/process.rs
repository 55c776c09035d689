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


use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

/// run an external decoder (`gunzip`, `unzip`, `crx2rnx`, `sbf2rin`, ...) as a
/// child process with an explicit argument vector and working directory,
/// capturing output. A non-zero exit code is reported as an `io::Error` so
/// callers can treat it uniformly with other decode failures - the paths of
/// these binaries are configuration, never compiled-in constants.
pub fn run_decoder<I, S, P> (program: &Path, args: I, cwd: P) -> io::Result<Output>
    where I: IntoIterator<Item = S>, S: AsRef<OsStr>, P: AsRef<Path>
{
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd.as_ref())
        .output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(crate::io_error!(io::ErrorKind::Other, "{:?} exited with {}: {}", program, code, stderr))
    }
}