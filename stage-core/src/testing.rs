//! Shared helpers for unit tests inside stage-core.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, StageError};
use crate::notify::{Notice, Notifier};
use crate::repo::{Fields, RecordStore};
use crate::repo_mem::MemRecordStore;

/// Respects `RUST_LOG`, defaults to `debug`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        self.notices().iter().filter(|n| n.is_failure()).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// In-memory store that can be switched offline and counts calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemRecordStore,
    pub offline: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StageError::Store("network unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn upsert(&self, id: &str, fields: Fields) -> Result<()> {
        self.gate()?;
        self.inner.upsert(id, fields).await
    }

    async fn select_by_id(&self, id: &str) -> Result<Option<Fields>> {
        self.gate()?;
        self.inner.select_by_id(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.gate()?;
        self.inner.delete(id).await
    }
}
