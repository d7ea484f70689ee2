// stage_core/src/domain.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PACKAGE_CONTENT_TYPE: &str = "application/vnd.android.package-archive";
pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An in-memory file: what a user selected, or what was reconstructed from the store.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// BLAKE3 of the content, lowercase hex.
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}

impl std::fmt::Debug for StagedFile {
    // Payloads can be tens of megabytes; never dump them.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Encoded package bytes together with the filename needed to rebuild them.
/// The two columns only ever travel as a pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagePayload {
    pub name: String,
    pub data: String,
}

/// The persisted configuration row, in the store's column naming.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: String,
    #[serde(default)]
    pub app_icon: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default, rename = "apk_data")]
    pub package_data: Option<String>,
    #[serde(default, rename = "apk_name")]
    pub package_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ConfigRecord {
    /// The package pair, only when both halves are present.
    pub fn package(&self) -> Option<PackagePayload> {
        match (&self.package_data, &self.package_name) {
            (Some(data), Some(name)) => Some(PackagePayload {
                name: name.clone(),
                data: data.clone(),
            }),
            _ => None,
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> crate::error::Result<Self> {
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// A field-level update. `None` means "leave this column alone".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub app_icon: Option<String>,
    pub app_name: Option<String>,
    pub package: Option<PackagePayload>,
}

impl RecordPatch {
    pub fn icon(icon: impl Into<String>) -> Self {
        Self {
            app_icon: Some(icon.into()),
            ..Default::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            app_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn package(payload: PackagePayload) -> Self {
        Self {
            package: Some(payload),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.app_icon.is_none() && self.app_name.is_none() && self.package.is_none()
    }

    /// Column names the patch touches, for logging.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::new();
        if self.app_icon.is_some() {
            cols.push("app_icon");
        }
        if self.app_name.is_some() {
            cols.push("app_name");
        }
        if self.package.is_some() {
            cols.push("apk_data");
            cols.push("apk_name");
        }
        cols
    }

    /// Render the patch as the opaque field map the store consumes.
    pub fn into_fields(self, updated_at: String) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(icon) = self.app_icon {
            fields.insert("app_icon".into(), Value::String(icon));
        }
        if let Some(name) = self.app_name {
            fields.insert("app_name".into(), Value::String(name));
        }
        if let Some(p) = self.package {
            fields.insert("apk_data".into(), Value::String(p.data));
            fields.insert("apk_name".into(), Value::String(p.name));
        }
        fields.insert("updated_at".into(), Value::String(updated_at));
        fields
    }
}
