#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod progress;

pub mod util {
    pub mod clock;
    pub mod sanitize;
}

pub mod codec;

pub mod repo;
pub mod repo_factory;
pub mod repo_fs;
pub mod repo_mem;

pub mod materialize;
pub mod session;
pub mod staging;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports: stable API surface
pub use config::{RecordScope, StageConfig};
pub use domain::{ConfigRecord, PackagePayload, RecordPatch, StagedFile};
pub use materialize::{DirMaterializer, Materializer};
pub use session::SessionIdentity;
pub use staging::{Acceptance, Phase, RejectReason, StagingController};
pub use sync::{ConfigSyncStore, LoadedConfig, SyncOutcome};
