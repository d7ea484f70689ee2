use super::{CodecId, TextCodec};
use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Standard alphabet, padded.
pub struct Base64Codec;

impl TextCodec for Base64Codec {
    fn id(&self) -> CodecId {
        CodecId::Base64
    }

    fn encode(&self, src: &[u8]) -> String {
        STANDARD.encode(src)
    }

    fn decode(&self, src: &str) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(src.trim())?)
    }
}
