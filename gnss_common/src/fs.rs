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

use std::fs;
use std::io;
use io::ErrorKind::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::macros::io_error;

type Result<T> = std::result::Result<T, std::io::Error>;

pub fn ensure_dir(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// age of a file's last modification, used for the "let it settle" gates the
/// dispatcher and job engine apply before acting on a freshly arrived file.
pub fn file_age<P: AsRef<Path>>(path: P) -> Result<Duration> {
    let meta = fs::metadata(path.as_ref())?;
    let modified = meta.modified()?;
    Ok(SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO))
}

/// move `src` into `dst_dir` (same basename), creating `dst_dir` if needed.
/// Relies on `fs::rename` for atomicity - both directories must be on the
/// same filesystem, which is a deployment precondition of this pipeline.
pub fn atomic_move_into<P: AsRef<Path>, D: AsRef<Path>>(src: P, dst_dir: D) -> Result<PathBuf> {
    let src = src.as_ref();
    let dst_dir = dst_dir.as_ref();
    ensure_dir(dst_dir)?;

    let name = src.file_name().ok_or(io_error!(InvalidInput, "not a file path {:?}", src))?;
    let dst = dst_dir.join(name);
    fs::rename(src, &dst)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_creates_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn atomic_move_into_creates_dest_and_preserves_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, b"hi").unwrap();
        let dst_dir = dir.path().join("dest");

        let dst = atomic_move_into(&src, &dst_dir).unwrap();
        assert_eq!(dst, dst_dir.join("src.txt"));
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"hi");
    }

    #[test]
    fn file_age_is_small_for_freshly_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();
        assert!(file_age(&path).unwrap() < Duration::from_secs(5));
    }
}
