//! # gemma-common — Shared Primitives
//!
//! Types shared across every crate in the workspace:
//!
//! * **[`GenerationConfig`]** — immutable per-session parameters (serialised as JSON).
//! * **[`ConversationMode`]** / **[`ModelKind`]** — raw vs. instruction-tuned checkpoints.
//! * **[`ChatError`]** — the error kinds of the session core.
//! * **[`tokens`]** — fixed control-token ids and framing strings.

pub mod config;
pub mod error;
pub mod tokens;

pub use config::{ConversationMode, GenerationConfig, ModelFamily, ModelKind};
pub use error::{ChatError, Result};
