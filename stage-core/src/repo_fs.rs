use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, StageError};
use crate::repo::{Fields, RecordStore, merge_row};
use crate::util::clock::now_rfc3339;

/// Record store keeping one JSON document per id under `dir`.
///
/// Documents are named by the BLAKE3 hash of the id, so any id maps to its
/// own file regardless of separators in it.
///
/// Writes go to a temp file in the same directory and are renamed over the
/// old document, so a crash never leaves a half-written row behind.
/// Upserts are serialized: each read-merge-write sees the previous one's result.
pub struct FsRecordStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FsRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "fs record store opened");
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn row_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", blake3::hash(id.as_bytes()).to_hex()))
    }
}

fn read_row(path: &Path) -> Result<Option<Fields>> {
    match std::fs::read(path) {
        Ok(buf) => {
            let row: Fields = serde_json::from_slice(&buf)
                .map_err(|e| StageError::Store(format!("{}: {e}", path.display())))?;
            Ok(Some(row))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_row(dir: &Path, path: &Path, row: &Fields) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, row)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| StageError::Io(e.error))?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StageError::Store(format!("fs task: {e}")))?
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn upsert(&self, id: &str, fields: Fields) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.row_path(id);
        let id = id.to_string();
        let lock = self.write_lock.clone();
        blocking(move || {
            let _guard = lock
                .lock()
                .map_err(|_| StageError::Store("write lock poisoned".into()))?;
            let merged = merge_row(read_row(&path)?, &id, fields, now_rfc3339());
            write_row(&dir, &path, &merged)
        })
        .await
    }

    async fn select_by_id(&self, id: &str) -> Result<Option<Fields>> {
        let path = self.row_path(id);
        blocking(move || read_row(&path)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.row_path(id);
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}
