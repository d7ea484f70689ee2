use crate::domain::StagedFile;
use crate::error::{Result, StageError};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Base64 = 0,
    DataUri = 1,
}

/// Reversible text encoding of arbitrary bytes.
pub trait TextCodec: Send + Sync {
    fn id(&self) -> CodecId;
    fn encode(&self, src: &[u8]) -> String;
    fn decode(&self, src: &str) -> Result<Vec<u8>>;
}

pub mod b64;
pub mod data_uri;

pub use b64::Base64Codec;
pub use data_uri::DataUriCodec;

/// Encode raw bytes for storage in a text column.
pub fn encode(bytes: &[u8]) -> String {
    let codec = Base64Codec;
    tracing::debug!(codec = ?codec.id(), bytes = bytes.len(), "encoding payload");
    codec.encode(bytes)
}

/// Rebuild a file object from its stored text form.
pub fn decode(text: &str, filename: &str, content_type: &str) -> Result<StagedFile> {
    let codec = Base64Codec;
    tracing::debug!(codec = ?codec.id(), file = %filename, encoded = text.len(), "decoding payload");
    let bytes = codec.decode(text)?;
    Ok(StagedFile::new(filename, content_type, bytes))
}

/// [`encode`] on the blocking pool; payloads can be tens of megabytes.
pub async fn encode_async(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || encode(&bytes))
        .await
        .map_err(|e| StageError::Format(format!("encode task: {e}")))
}

/// [`decode`] on the blocking pool.
pub async fn decode_async(text: String, filename: String, content_type: String) -> Result<StagedFile> {
    tokio::task::spawn_blocking(move || decode(&text, &filename, &content_type))
        .await
        .map_err(|e| StageError::Format(format!("decode task: {e}")))?
}
