//! Scripted doubles for exercising the session loop without model weights.

use std::collections::VecDeque;

use gemma_common::tokens::EOS_ID;
use gemma_common::{ChatError, Result};
use rand::rngs::StdRng;
use rand::RngCore;

use crate::engine::{AcceptPolicy, Engine, TokenCallback, Tokenizer};

/// Offset separating byte tokens from the reserved control-token ids.
const BYTE_BASE: u32 = 0x100;

/// Byte-level tokenizer: every UTF-8 byte becomes one token id.
///
/// Stateless and lossless, which keeps framing assertions in tests exact.
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.bytes().map(|b| BYTE_BASE + b as u32).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut bytes = Vec::with_capacity(ids.len());
        for &id in ids {
            let byte = id
                .checked_sub(BYTE_BASE)
                .and_then(|b| u8::try_from(b).ok())
                .ok_or(ChatError::Decode {
                    id,
                    reason: "not a byte token".into(),
                })?;
            bytes.push(byte);
        }
        String::from_utf8(bytes).map_err(|e| ChatError::Decode {
            id: ids.first().copied().unwrap_or_default(),
            reason: e.to_string(),
        })
    }
}

/// Tokenizer double with a fixed id ↔ text table.
///
/// `decode` of an unknown id fails, giving tests a decode-failure path;
/// `encode` maps whitespace-separated words through the table and fails on
/// unknown words, giving tests an encode-failure path.
pub struct TableTokenizer {
    entries: Vec<(u32, &'static str)>,
}

impl TableTokenizer {
    pub fn new(entries: &[(u32, &'static str)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }
}

impl Tokenizer for TableTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        text.split_whitespace()
            .map(|word| {
                self.entries
                    .iter()
                    .find(|(_, t)| *t == word)
                    .map(|(id, _)| *id)
                    .ok_or_else(|| ChatError::Encode(format!("unknown word `{word}`")))
            })
            .collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut text = String::new();
        for &id in ids {
            let piece = self
                .entries
                .iter()
                .find(|(i, _)| *i == id)
                .map(|(_, t)| *t)
                .ok_or(ChatError::Decode {
                    id,
                    reason: "id not in table".into(),
                })?;
            text.push_str(piece);
        }
        Ok(text)
    }
}

/// What a [`ScriptedEngine`] saw on one `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: Vec<u32>,
    pub start_pos: usize,
    /// One value drawn from the session RNG, for determinism assertions.
    pub rng_draw: u64,
}

/// Engine double that replays a scripted token stream per `generate` call.
///
/// With `echo_prompt` set it first streams every prompt token through the
/// callback (replay), matching the real engine's contract; the scripted
/// tokens then land at positions `prompt_size + 1` onwards.
pub struct ScriptedEngine {
    scripts: VecDeque<Vec<u32>>,
    pub echo_prompt: bool,
    pub calls: Vec<RecordedCall>,
}

impl ScriptedEngine {
    pub fn new(scripts: Vec<Vec<u32>>) -> Self {
        Self {
            scripts: scripts.into(),
            echo_prompt: true,
            calls: Vec::new(),
        }
    }

    /// A script that ends the turn immediately: the engine emits only EOS.
    pub fn eos_only() -> Self {
        let mut engine = Self::new(vec![vec![EOS_ID]]);
        engine.echo_prompt = false;
        engine
    }
}

impl Engine for ScriptedEngine {
    fn generate(
        &mut self,
        prompt: &[u32],
        start_pos: usize,
        rng: &mut StdRng,
        on_token: TokenCallback<'_>,
        accept: &mut dyn AcceptPolicy,
    ) -> Result<()> {
        self.calls.push(RecordedCall {
            prompt: prompt.to_vec(),
            start_pos,
            rng_draw: rng.next_u64(),
        });

        if self.echo_prompt {
            for &tok in prompt {
                if !on_token(tok, 0.0)? {
                    return Ok(());
                }
            }
        }

        let script = self.scripts.pop_front().unwrap_or_default();
        for tok in script {
            if !accept.accept(tok) {
                return Ok(());
            }
            let keep_going = on_token(tok, 0.0)?;
            if tok == EOS_ID || !keep_going {
                return Ok(());
            }
        }
        Ok(())
    }
}
