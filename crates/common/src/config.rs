//! Session configuration.
//!
//! Serialised as JSON so a session setup can be saved and replayed. Every
//! field has a default, so a minimal `{}` JSON produces a working config.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Whether turn-framing control tokens are injected into prompts.
///
/// Fixed for the session lifetime; selected at model-load time from the
/// checkpoint name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Pre-trained checkpoint: prompts are submitted verbatim.
    Raw,
    /// Instruction-tuned checkpoint: prompts are wrapped in turn markers.
    InstructionTuned,
}

/// Model architecture family, selecting the concrete backend graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Gemma,
    Gemma2,
}

/// Model selector parsed from the `--model` flag, e.g. `2b-it` or `27b-pt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelKind {
    pub family: ModelFamily,
    pub mode: ConversationMode,
}

impl ModelKind {
    /// Parse a `<size>-<training>` selector. Sizes `2b`/`7b` map to the v1
    /// family, `9b`/`27b` to v2; training is `it` or `pt`.
    pub fn parse(name: &str) -> Result<Self> {
        let (size, training) = name
            .rsplit_once('-')
            .ok_or_else(|| ChatError::Config(format!("malformed model selector `{name}`")))?;
        let family = match size {
            "2b" | "7b" => ModelFamily::Gemma,
            "9b" | "27b" => ModelFamily::Gemma2,
            other => {
                return Err(ChatError::Config(format!(
                    "unknown model size `{other}` (expected 2b, 7b, 9b, or 27b)"
                )))
            }
        };
        let mode = match training {
            "it" => ConversationMode::InstructionTuned,
            "pt" => ConversationMode::Raw,
            other => {
                return Err(ChatError::Config(format!(
                    "unknown model training `{other}` (expected it or pt)"
                )))
            }
        };
        Ok(Self { family, mode })
    }
}

/// Immutable per-session generation parameters.
///
/// Loaded once before the loop starts; validation failures are fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Session token budget across all turns (prompt replay included).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Per-turn cap on generated tokens.
    #[serde(default = "default_max_generated_tokens")]
    pub max_generated_tokens: usize,
    /// Sampling temperature (0 = greedy).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Keep the absolute position (and model context) across turns instead of
    /// resetting after each end-of-sequence token.
    #[serde(default)]
    pub multiturn: bool,
    /// Seed the sampler with a fixed value for reproducible sessions.
    #[serde(default)]
    pub deterministic: bool,
    /// 0 = silent, 1 = prompts and responses, 2 = timing and end markers.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

fn default_max_tokens() -> usize {
    3072
}
fn default_max_generated_tokens() -> usize {
    2048
}
fn default_temperature() -> f64 {
    1.0
}
fn default_verbosity() -> u8 {
    1
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 3072,
            max_generated_tokens: 2048,
            temperature: 1.0,
            multiturn: false,
            deterministic: false,
            verbosity: 1,
        }
    }
}

impl GenerationConfig {
    /// Reject invalid parameter combinations before the loop starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be positive".into()));
        }
        if self.max_generated_tokens == 0 {
            return Err(ChatError::Config(
                "max_generated_tokens must be positive".into(),
            ));
        }
        if self.max_generated_tokens > self.max_tokens {
            return Err(ChatError::Config(format!(
                "max_generated_tokens ({}) must not exceed max_tokens ({})",
                self.max_generated_tokens, self.max_tokens
            )));
        }
        if self.temperature.is_nan() || self.temperature < 0.0 {
            return Err(ChatError::Config(format!(
                "temperature must be non-negative, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Save config to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_json_round_trip() {
        let config = GenerationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: GenerationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.max_tokens, loaded.max_tokens);
        assert_eq!(config.max_generated_tokens, loaded.max_generated_tokens);
        assert!(!loaded.multiturn);
        assert_eq!(loaded.verbosity, 1);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let loaded: GenerationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(loaded.max_tokens, 3072);
        assert_eq!(loaded.max_generated_tokens, 2048);
        assert_eq!(loaded.temperature, 1.0);
        assert!(!loaded.deterministic);
    }

    #[test]
    fn validate_rejects_inverted_budgets() {
        let config = GenerationConfig {
            max_tokens: 100,
            max_generated_tokens: 200,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let config = GenerationConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn model_kind_parses_families_and_training() {
        let kind = ModelKind::parse("2b-it").unwrap();
        assert_eq!(kind.family, ModelFamily::Gemma);
        assert_eq!(kind.mode, ConversationMode::InstructionTuned);

        let kind = ModelKind::parse("27b-pt").unwrap();
        assert_eq!(kind.family, ModelFamily::Gemma2);
        assert_eq!(kind.mode, ConversationMode::Raw);
    }

    #[test]
    fn model_kind_rejects_garbage() {
        assert!(ModelKind::parse("2b").is_err());
        assert!(ModelKind::parse("3b-it").is_err());
        assert!(ModelKind::parse("2b-chat").is_err());
    }
}
