//! Collaborator interfaces consumed by the session loop.
//!
//! The session core has no wire protocol of its own; tokenisation and the
//! forward pass live behind these narrow traits so backends can be swapped
//! without touching the state machine.

use gemma_common::Result;
use rand::rngs::StdRng;

/// Encodes text to token ids and renders ids back to text. Fallible both ways.
pub trait Tokenizer {
    /// Encode a string to token ids. Expected to succeed for well-formed
    /// UTF-8; failure is fatal to the session.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Render token ids back to text. Failure is fatal to the session.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Per-token callback driven by the engine.
///
/// Receives the token id and a score. Returning `Ok(false)` requests an
/// engine-level early stop; the streaming sink itself never does, since early
/// termination is the accept policy's responsibility. Errors propagate out of
/// [`Engine::generate`] unchanged.
pub type TokenCallback<'a> = &'a mut dyn FnMut(u32, f32) -> Result<bool>;

/// External predicate allowed to veto tokens, forcing early termination.
pub trait AcceptPolicy {
    fn accept(&mut self, token: u32) -> bool;
}

/// Default policy: accept every token.
pub struct AcceptAll;

impl AcceptPolicy for AcceptAll {
    fn accept(&mut self, _token: u32) -> bool {
        true
    }
}

impl<A: AcceptPolicy + ?Sized> AcceptPolicy for &mut A {
    fn accept(&mut self, token: u32) -> bool {
        (**self).accept(token)
    }
}

/// A synchronous generation engine.
///
/// Contract: `generate` blocks until the turn completes. The callback is
/// invoked once per prompt token (replay, in order) and once per generated
/// token, in strict sequential order on the caller's thread. Generation ends
/// on end-of-sequence, a `false` continuation signal, an accept-policy
/// rejection, or the engine's per-turn bound. At most one generation call is
/// in flight at any time; cancellation mid-turn is not supported.
pub trait Engine {
    fn generate(
        &mut self,
        prompt: &[u32],
        start_pos: usize,
        rng: &mut StdRng,
        on_token: TokenCallback<'_>,
        accept: &mut dyn AcceptPolicy,
    ) -> Result<()>;
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn generate(
        &mut self,
        prompt: &[u32],
        start_pos: usize,
        rng: &mut StdRng,
        on_token: TokenCallback<'_>,
        accept: &mut dyn AcceptPolicy,
    ) -> Result<()> {
        (**self).generate(prompt, start_pos, rng, on_token, accept)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self).decode(ids)
    }
}
