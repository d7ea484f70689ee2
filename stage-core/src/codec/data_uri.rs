use super::{CodecId, TextCodec};
use crate::error::{Result, StageError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const PREFIX: &str = "data:";
const MARKER: &str = ";base64,";

/// `data:<mime>;base64,<payload>`; directly renderable by anything that takes an image URL.
pub struct DataUriCodec {
    pub mime: String,
}

impl DataUriCodec {
    pub fn new(mime: impl Into<String>) -> Self {
        Self { mime: mime.into() }
    }

    /// Split a data URI into its mime type and raw bytes.
    pub fn parse(uri: &str) -> Result<(String, Vec<u8>)> {
        let rest = uri
            .strip_prefix(PREFIX)
            .ok_or_else(|| StageError::Format("data uri: missing `data:` prefix".into()))?;
        let (mime, payload) = rest
            .split_once(MARKER)
            .ok_or_else(|| StageError::Format("data uri: not base64-encoded".into()))?;
        Ok((mime.to_string(), STANDARD.decode(payload.trim())?))
    }

    /// Mime type of a data URI without decoding the payload.
    pub fn mime_of(uri: &str) -> Option<&str> {
        uri.strip_prefix(PREFIX)?
            .split_once(MARKER)
            .map(|(mime, _)| mime)
    }
}

impl TextCodec for DataUriCodec {
    fn id(&self) -> CodecId {
        CodecId::DataUri
    }

    fn encode(&self, src: &[u8]) -> String {
        format!("{PREFIX}{}{MARKER}{}", self.mime, STANDARD.encode(src))
    }

    fn decode(&self, src: &str) -> Result<Vec<u8>> {
        let (_, bytes) = Self::parse(src)?;
        Ok(bytes)
    }
}
