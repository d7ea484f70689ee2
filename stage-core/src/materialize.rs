use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::StagedFile;
use crate::error::Result;
use crate::util::sanitize::file_name_component;

/// Turns an in-memory file into something the user can pick up.
pub trait Materializer: Send + Sync {
    fn materialize(&self, file: &StagedFile) -> Result<PathBuf>;
}

/// Saves into a downloads directory under the file's own name.
/// Existing files are never replaced; `app (1).apk`, `app (2).apk`, ... are used instead.
pub struct DirMaterializer {
    dir: PathBuf,
}

impl DirMaterializer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn numbered(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

impl Materializer for DirMaterializer {
    fn materialize(&self, file: &StagedFile) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let name = file_name_component(&file.name);
        let mut n = 0u32;
        loop {
            let candidate = if n == 0 {
                self.dir.join(&name)
            } else {
                self.dir.join(numbered(&name, n))
            };
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut f) => {
                    f.write_all(&file.bytes)?;
                    f.sync_all()?;
                    tracing::info!(path = %candidate.display(), bytes = file.len(), "file materialized");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
