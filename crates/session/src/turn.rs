//! Turn construction: raw user text → framed prompt → token ids.

use gemma_common::tokens::{BOS_ID, END_OF_TURN, START_OF_TURN};
use gemma_common::{ConversationMode, Result};

use crate::engine::Tokenizer;

/// One user utterance, framed and encoded for submission to the engine.
///
/// Ephemeral: created fresh per input line and discarded after generation
/// finishes.
#[derive(Debug, Clone)]
pub struct Turn {
    raw: String,
    framed: String,
    tokens: Vec<u32>,
}

impl Turn {
    /// Build the exact token sequence for one utterance.
    ///
    /// Instruction-tuned checkpoints get the user/model turn framing; when
    /// `absolute_position > 0` a closing marker is prepended first, signalling
    /// continuation of a multi-turn dialogue. A fresh context
    /// (`absolute_position == 0`) gets the beginning-of-sequence token
    /// prepended regardless of mode.
    pub fn build<T: Tokenizer + ?Sized>(
        raw: &str,
        mode: ConversationMode,
        absolute_position: usize,
        tokenizer: &T,
    ) -> Result<Self> {
        let framed = match mode {
            ConversationMode::Raw => raw.to_string(),
            ConversationMode::InstructionTuned => {
                let mut text =
                    format!("{START_OF_TURN}user\n{raw}{END_OF_TURN}\n{START_OF_TURN}model\n");
                if absolute_position > 0 {
                    text = format!("{END_OF_TURN}\n{text}");
                }
                text
            }
        };

        let mut tokens = tokenizer.encode(&framed)?;
        if absolute_position == 0 {
            tokens.insert(0, BOS_ID);
        }

        Ok(Self {
            raw: raw.to_string(),
            framed,
            tokens,
        })
    }

    /// The user's text as typed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The fully framed prompt text.
    pub fn framed(&self) -> &str {
        &self.framed
    }

    /// The token-id sequence to submit.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// Number of prompt tokens; the sink uses this to tell prompt replay from
    /// generated content.
    pub fn prompt_size(&self) -> usize {
        self.tokens.len()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
