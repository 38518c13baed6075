//! Gemma generation engine: load weights, prefill, decode with KV cache.
//!
//! The prompt is processed in a single prefill pass, then tokens decode one
//! at a time against the model's KV cache. When the session continues a
//! multi-turn dialogue (`start_pos > 0`) the cache is retained, so the new
//! turn only pays for its own tokens.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::{gemma, gemma2};
use rand::rngs::StdRng;

use gemma_common::tokens::EOS_ID;
use gemma_common::{ChatError, GenerationConfig, ModelFamily, Result};
use gemma_session::{AcceptPolicy, Engine, TokenCallback};

use crate::sampler::{Sampler, SamplerConfig};

enum GemmaModel {
    V1(gemma::Model),
    V2(gemma2::Model),
}

impl GemmaModel {
    fn forward(&mut self, input: &Tensor, pos: usize) -> candle_core::Result<Tensor> {
        match self {
            Self::V1(m) => m.forward(input, pos),
            Self::V2(m) => m.forward(input, pos),
        }
    }

    fn clear_kv_cache(&mut self) {
        match self {
            Self::V1(m) => m.clear_kv_cache(),
            Self::V2(m) => m.clear_kv_cache(),
        }
    }
}

/// High-level generation engine over a Gemma checkpoint directory
/// (`config.json` + `model.safetensors`).
pub struct GemmaRuntime {
    model: GemmaModel,
    sampler: Sampler,
    device: Device,
    max_generated_tokens: usize,
}

impl GemmaRuntime {
    pub fn load(
        model_dir: &Path,
        family: ModelFamily,
        config: &GenerationConfig,
        device: Device,
    ) -> anyhow::Result<Self> {
        let weights = model_dir.join("model.safetensors");
        let model_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        tracing::info!("loading weights from {}", weights.display());

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = match family {
            ModelFamily::Gemma => {
                let cfg: gemma::Config = serde_json::from_str(&model_config)?;
                GemmaModel::V1(gemma::Model::new(false, &cfg, vb)?)
            }
            ModelFamily::Gemma2 => {
                let cfg: gemma2::Config = serde_json::from_str(&model_config)?;
                GemmaModel::V2(gemma2::Model::new(false, &cfg, vb)?)
            }
        };

        let sampler = Sampler::new(SamplerConfig {
            temperature: config.temperature,
            ..Default::default()
        });

        Ok(Self {
            model,
            sampler,
            device,
            max_generated_tokens: config.max_generated_tokens,
        })
    }

    /// Logits for the final position as a 1-D f32 tensor.
    fn flatten_logits(&self, logits: Tensor) -> Result<Tensor> {
        logits
            .squeeze(0)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_dtype(DType::F32))
            .map_err(engine_err)
    }
}

impl Engine for GemmaRuntime {
    fn generate(
        &mut self,
        prompt: &[u32],
        start_pos: usize,
        rng: &mut StdRng,
        on_token: TokenCallback<'_>,
        accept: &mut dyn AcceptPolicy,
    ) -> Result<()> {
        if prompt.is_empty() {
            return Ok(());
        }
        if start_pos == 0 {
            self.model.clear_kv_cache();
            self.sampler.reset();
        }

        // Prompt replay: every token but the last is pure consumption
        // progress for the sink.
        for &tok in &prompt[..prompt.len() - 1] {
            if !on_token(tok, 0.0)? {
                return Ok(());
            }
        }

        let input = Tensor::new(prompt, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(engine_err)?;
        let mut logits = self
            .model
            .forward(&input, start_pos)
            .map_err(engine_err)?;

        // The final prompt token flows through the same callback path as
        // generated tokens; it carries the framing whitespace the sink's
        // first-token trim removes.
        if !on_token(prompt[prompt.len() - 1], 0.0)? {
            return Ok(());
        }

        let mut pos = start_pos + prompt.len();
        for _ in 0..self.max_generated_tokens {
            let flat = self.flatten_logits(logits)?;
            let (token, score) = self.sampler.sample(&flat, rng)?;
            if !accept.accept(token) {
                return Ok(());
            }
            let keep_going = on_token(token, score)?;
            if token == EOS_ID || !keep_going {
                return Ok(());
            }

            let input = Tensor::new(&[token], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(engine_err)?;
            logits = self.model.forward(&input, pos).map_err(engine_err)?;
            pos += 1;
        }
        Ok(())
    }
}

fn engine_err(e: candle_core::Error) -> ChatError {
    ChatError::Engine(e.to_string())
}
