//! Error kinds for the session core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Top-level error type for session operations.
///
/// `Encode` and `Decode` are unrecoverable for the whole session, not just the
/// turn: a tokenizer failure means the model/vocabulary pairing is broken and
/// later turns cannot be trusted either.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The tokenizer rejected the framed prompt text.
    #[error("tokenizer rejected input: {0}")]
    Encode(String),

    /// The tokenizer could not render a token id back to text.
    #[error("tokenizer could not render token {id}: {reason}")]
    Decode { id: u32, reason: String },

    /// Invalid combination of session parameters, caught before the loop starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The generation engine failed mid-turn.
    #[error("generation engine failure: {0}")]
    Engine(String),

    /// I/O failure on the input or output streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
