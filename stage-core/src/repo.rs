// stage_core/src/repo.rs
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Opaque column map, as the record store sees a row.
pub type Fields = Map<String, Value>;

/// The remote record store: keyed rows with insert-or-merge writes.
///
/// `upsert` merges `fields` into the row named `id`, creating it when absent.
/// Columns not present in `fields` are left untouched.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert(&self, id: &str, fields: Fields) -> Result<()>;

    async fn select_by_id(&self, id: &str) -> Result<Option<Fields>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Merge `fields` over `row` and stamp the bookkeeping columns.
pub(crate) fn merge_row(row: Option<Fields>, id: &str, fields: Fields, now: String) -> Fields {
    let mut row = row.unwrap_or_else(|| {
        let mut fresh = Map::new();
        fresh.insert("created_at".into(), Value::String(now.clone()));
        fresh
    });
    row.insert("id".into(), Value::String(id.to_string()));
    if !fields.contains_key("updated_at") {
        row.insert("updated_at".into(), Value::String(now));
    }
    for (k, v) in fields {
        row.insert(k, v);
    }
    row
}
