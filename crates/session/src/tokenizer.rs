//! Adapter over the HuggingFace `tokenizers` runtime.

use std::path::Path;

use gemma_common::{ChatError, Result};

use crate::engine::Tokenizer;

/// Tokenizer backed by a `tokenizer.json` vocabulary.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            ChatError::Config(format!("load tokenizer {}: {e}", path.display()))
        })?;
        Ok(Self { inner })
    }

    /// Token id for a named piece, when the vocabulary defines one.
    pub fn token_id(&self, piece: &str) -> Option<u32> {
        self.inner.token_to_id(piece)
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        // The session core inserts the beginning-of-sequence token itself, so
        // special-token insertion stays off here.
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ChatError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner.decode(ids, false).map_err(|e| ChatError::Decode {
            id: ids.first().copied().unwrap_or_default(),
            reason: e.to_string(),
        })
    }
}
