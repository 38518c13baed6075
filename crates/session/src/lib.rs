//! # gemma-session — Session/Turn State Machine
//!
//! The control loop that turns user-typed lines into streamed model output:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`engine`] | `Tokenizer`, `Engine`, `AcceptPolicy` collaborator traits |
//! | [`turn`] | `Turn` — raw text → framed prompt → token ids |
//! | [`stream`] | `StreamSink` — the per-token callback |
//! | [`session`] | `ChatSession` — the REPL state machine |
//! | [`tokenizer`] | `HfTokenizer` — adapter over the HuggingFace runtime |
//! | [`mock`] | scripted doubles for driving the loop without weights |
//!
//! ## Design notes
//!
//! 1. **Synchronous callbacks.** The engine calls back into the sink on the
//!    thread of the single `generate` call; invocations for one turn arrive
//!    in strict generation order, matching output order exactly.
//! 2. **No global state.** The sink is a small mutable context struct passed
//!    by reference into the generation call.
//! 3. **Increment before branch.** Position counters advance before any
//!    branching, so the first-generated-token check compares against
//!    `prompt_size + 1`.

pub mod engine;
pub mod mock;
pub mod session;
pub mod stream;
pub mod tokenizer;
pub mod turn;

pub use engine::{AcceptAll, AcceptPolicy, Engine, TokenCallback, Tokenizer};
pub use session::{ChatSession, Position};
pub use stream::StreamSink;
pub use tokenizer::HfTokenizer;
pub use turn::Turn;
