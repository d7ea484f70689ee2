//! Per-device session identity.
//!
//! A token is minted once per device, kept in local key-value storage and
//! handed back unchanged on every later call. When local storage is not
//! usable the token lives only as long as the [`SessionIdentity`] value.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::error::{Result, StageError};
use crate::util::clock::now_millis;

pub const SESSION_KEY: &str = "user_session_id";
const SUFFIX_LEN: usize = 9;
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Device-local string storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryLocalStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self
            .map
            .lock()
            .map_err(|_| StageError::Store("local map lock poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| StageError::Store("local map lock poisoned".into()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A single JSON object on disk, `<dir>/local.json`.
pub struct FileLocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLocalStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("local.json"),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(buf) => Ok(serde_json::from_slice(&buf)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StageError::Store("local file lock poisoned".into()))?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());

        let dir = self
            .path
            .parent()
            .ok_or_else(|| StageError::Format("local store path has no parent".into()))?;
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &map)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| StageError::Io(e.error))?;
        Ok(())
    }
}

pub struct SessionIdentity {
    store: Arc<dyn LocalStore>,
    resolved: Mutex<Option<String>>,
}

impl SessionIdentity {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            resolved: Mutex::new(None),
        }
    }

    /// The device's token, minting and storing one on first use. Never fails.
    ///
    /// Once resolved, the token is fixed for the lifetime of this value, even
    /// if local storage becomes unreadable afterwards.
    pub fn get_or_create_session_id(&self) -> String {
        let mut slot = match self.resolved.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.get_or_insert_with(|| self.resolve()).clone()
    }

    fn resolve(&self) -> String {
        match self.store.get(SESSION_KEY) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "local storage unreadable, using in-memory session id");
                return generate_session_id();
            }
        }

        let id = generate_session_id();
        match self.store.set(SESSION_KEY, &id) {
            Ok(()) => tracing::info!(session_id = %id, "session id created"),
            Err(e) => {
                tracing::warn!(error = %e, "local storage not writable, using in-memory session id")
            }
        }
        id
    }
}

/// `user_<unix millis>_<9 base-36 chars>`.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("user_{}_{}", now_millis(), suffix)
}
