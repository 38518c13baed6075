//! # gemma-engine — Candle-Backed Generation Engine
//!
//! A concrete [`gemma_session::Engine`] over `candle-transformers`' Gemma
//! model families:
//!
//! * **[`GemmaRuntime`]** — weight loading and the prefill/decode loop.
//! * **[`Sampler`]** — temperature, top-k, top-p, repetition penalty; draws
//!   from the session-owned RNG so deterministic sessions reproduce exactly.
//!
//! The numeric kernel itself (attention, matmul, quantised decode) lives in
//! candle; this crate only drives it.

pub mod runtime;
pub mod sampler;

pub use runtime::GemmaRuntime;
pub use sampler::{Sampler, SamplerConfig};
