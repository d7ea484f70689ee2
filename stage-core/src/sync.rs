use std::sync::Arc;

use crate::codec;
use crate::domain::{ConfigRecord, PACKAGE_CONTENT_TYPE, RecordPatch, StagedFile};
use crate::error::Result;
use crate::notify::{Notice, Notifier};
use crate::repo::RecordStore;
use crate::util::clock::now_rfc3339;

/// What a successful load hands back to the client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadedConfig {
    pub app_icon: Option<String>,
    pub app_name: Option<String>,
    pub package: Option<StagedFile>,
    pub updated_at: Option<String>,
}

/// Result of a remote write (upsert or delete).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Done,
    Failed,
}

impl SyncOutcome {
    pub fn is_done(self) -> bool {
        self == SyncOutcome::Done
    }
}

/// Owns the single configuration record of one scope.
#[derive(Clone)]
pub struct ConfigSyncStore {
    store: Arc<dyn RecordStore>,
    record_id: String,
    notifier: Arc<dyn Notifier>,
}

impl ConfigSyncStore {
    pub fn new(
        store: Arc<dyn RecordStore>,
        record_id: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            record_id: record_id.into(),
            notifier,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// Raw record, errors included. [`load`](Self::load) is the best-effort variant.
    pub async fn fetch(&self) -> Result<Option<ConfigRecord>> {
        match self.store.select_by_id(&self.record_id).await? {
            Some(fields) => Ok(Some(ConfigRecord::from_fields(fields)?)),
            None => Ok(None),
        }
    }

    /// Best-effort load: store and decode failures are logged, never surfaced.
    pub async fn load(&self) -> Option<LoadedConfig> {
        let record = match self.fetch().await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::debug!(record_id = %self.record_id, "no stored config");
                return None;
            }
            Err(e) => {
                tracing::warn!(record_id = %self.record_id, error = %e, "config load failed");
                return None;
            }
        };

        let package = match record.package() {
            Some(p) => {
                match codec::decode_async(p.data, p.name.clone(), PACKAGE_CONTENT_TYPE.into()).await
                {
                    Ok(file) => {
                        tracing::info!(
                            package = %file.name,
                            bytes = file.len(),
                            digest = %file.digest(),
                            "stored package restored"
                        );
                        Some(file)
                    }
                    Err(e) => {
                        tracing::warn!(package = %p.name, error = %e, "stored package undecodable, skipping");
                        None
                    }
                }
            }
            None => {
                if record.package_data.is_some() || record.package_name.is_some() {
                    tracing::warn!(
                        record_id = %self.record_id,
                        "stored package is missing its data or name, skipping"
                    );
                }
                None
            }
        };

        Some(LoadedConfig {
            app_icon: record.app_icon,
            app_name: record.app_name,
            package,
            updated_at: record.updated_at,
        })
    }

    /// Upsert the supplied fields only; `updated_at` is always rewritten.
    pub async fn save(&self, patch: RecordPatch) -> SyncOutcome {
        let columns = patch.columns().join(",");
        let fields = patch.into_fields(now_rfc3339());
        match self.store.upsert(&self.record_id, fields).await {
            Ok(()) => {
                tracing::debug!(record_id = %self.record_id, columns = %columns, "config saved");
                self.notifier
                    .notify(Notice::Success("Configuration saved".into()));
                SyncOutcome::Done
            }
            Err(e) => {
                tracing::warn!(record_id = %self.record_id, columns = %columns, error = %e, "config save failed");
                self.notifier
                    .notify(Notice::Failure(format!("Could not save configuration: {e}")));
                SyncOutcome::Failed
            }
        }
    }

    /// Delete the record.
    pub async fn clear(&self) -> SyncOutcome {
        match self.store.delete(&self.record_id).await {
            Ok(()) => {
                tracing::info!(record_id = %self.record_id, "config cleared");
                self.notifier
                    .notify(Notice::Success("Configuration cleared".into()));
                SyncOutcome::Done
            }
            Err(e) => {
                tracing::warn!(record_id = %self.record_id, error = %e, "config clear failed");
                self.notifier
                    .notify(Notice::Failure(format!("Could not clear configuration: {e}")));
                SyncOutcome::Failed
            }
        }
    }
}
