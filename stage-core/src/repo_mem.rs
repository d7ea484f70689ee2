use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, StageError};
use crate::repo::{Fields, RecordStore, merge_row};
use crate::util::clock::now_rfc3339;

/// Process-local record store.
#[derive(Default)]
pub struct MemRecordStore {
    rows: Mutex<HashMap<String, Fields>>,
}

impl MemRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StageError {
    StageError::Store("record map lock poisoned".into())
}

#[async_trait]
impl RecordStore for MemRecordStore {
    async fn upsert(&self, id: &str, fields: Fields) -> Result<()> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let merged = merge_row(rows.remove(id), id, fields, now_rfc3339());
        rows.insert(id.to_string(), merged);
        Ok(())
    }

    async fn select_by_id(&self, id: &str) -> Result<Option<Fields>> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        rows.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        match v {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn upsert_merges_into_one_row() {
        let store = MemRecordStore::new();
        store.upsert("cfg", fields(json!({"app_name": "A"}))).await.unwrap();
        store.upsert("cfg", fields(json!({"app_icon": "I"}))).await.unwrap();
        assert_eq!(store.len(), 1);

        let row = store.select_by_id("cfg").await.unwrap().unwrap();
        assert_eq!(row["id"], "cfg");
        assert_eq!(row["app_name"], "A");
        assert_eq!(row["app_icon"], "I");
        assert!(row.contains_key("created_at"));
    }

    #[tokio::test]
    async fn created_at_survives_later_writes() {
        let store = MemRecordStore::new();
        store.upsert("cfg", fields(json!({"app_name": "A"}))).await.unwrap();
        let first = store.select_by_id("cfg").await.unwrap().unwrap()["created_at"].clone();
        store
            .upsert("cfg", fields(json!({"app_name": "B", "updated_at": "later"})))
            .await
            .unwrap();
        let row = store.select_by_id("cfg").await.unwrap().unwrap();
        assert_eq!(row["created_at"], first);
        assert_eq!(row["updated_at"], "later");
        assert_eq!(row["app_name"], "B");
    }

    #[tokio::test]
    async fn delete_missing_row_is_ok() {
        let store = MemRecordStore::new();
        store.delete("nothing").await.unwrap();
        assert!(store.select_by_id("nothing").await.unwrap().is_none());
    }
}
