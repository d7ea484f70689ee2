use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::repo::RecordStore;
use crate::repo_fs::FsRecordStore;
use crate::repo_mem::MemRecordStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Mem,
    Fs(PathBuf),
}

pub fn open_store(backend: Backend) -> Result<Arc<dyn RecordStore>> {
    match backend {
        Backend::Mem => Ok(Arc::new(MemRecordStore::new())),
        Backend::Fs(dir) => Ok(Arc::new(FsRecordStore::new(dir)?)),
    }
}
