//! Fixed control-token ids and framing strings for Gemma-family vocabularies.

/// Beginning-of-sequence token id, prepended once per fresh context.
pub const BOS_ID: u32 = 2;

/// End-of-sequence token id; the model emits it when its response is complete.
pub const EOS_ID: u32 = 1;

/// Opening turn-boundary marker understood by instruction-tuned checkpoints.
pub const START_OF_TURN: &str = "<start_of_turn>";

/// Closing turn-boundary marker.
pub const END_OF_TURN: &str = "<end_of_turn>";

/// Fixed seed applied whenever a deterministic session resets its context.
pub const DETERMINISTIC_SEED: u64 = 42;
