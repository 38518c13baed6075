//! Streaming sink: the per-token callback that drives incremental output.

use std::io::Write;

use gemma_common::tokens::EOS_ID;
use gemma_common::{GenerationConfig, Result};

use crate::engine::Tokenizer;
use crate::session::Position;

/// Mutable per-turn context handed (by reference) into the generation call.
///
/// Tracks the position counters, performs incremental decode-and-print,
/// detects end-of-sequence, and decides whether conversational state resets.
/// Borrowed for the duration of one turn only.
pub struct StreamSink<'a, T: Tokenizer + ?Sized> {
    tokenizer: &'a T,
    config: &'a GenerationConfig,
    pos: &'a mut Position,
    prompt_size: usize,
    out: &'a mut dyn Write,
    diag: &'a mut dyn Write,
    reseed: bool,
}

impl<'a, T: Tokenizer + ?Sized> StreamSink<'a, T> {
    pub fn new(
        tokenizer: &'a T,
        config: &'a GenerationConfig,
        pos: &'a mut Position,
        prompt_size: usize,
        out: &'a mut dyn Write,
        diag: &'a mut dyn Write,
    ) -> Self {
        Self {
            tokenizer,
            config,
            pos,
            prompt_size,
            out,
            diag,
            reseed: false,
        }
    }

    /// Handle one streamed token and return the continuation signal.
    ///
    /// Counters advance before any branching, so the first-generated-token
    /// check compares `in_turn` against `prompt_size + 1`. The off-by-one
    /// here is load-bearing; see the tests below.
    pub fn on_token(&mut self, token: u32, _score: f32) -> Result<bool> {
        self.pos.absolute += 1;
        self.pos.in_turn += 1;

        if self.pos.in_turn < self.prompt_size {
            // Still inside prompt replay: show consumption progress.
            write!(self.diag, ".")?;
            self.diag.flush()?;
        } else if token == EOS_ID {
            if !self.config.multiturn {
                self.pos.absolute = 0;
                if self.config.deterministic {
                    // The engine holds the RNG while generating; the session
                    // loop applies the fixed seed once the call returns.
                    self.reseed = true;
                }
            }
            if self.config.verbosity >= 2 {
                writeln!(self.out, "\n[ End ]")?;
            }
        } else {
            let text = self.tokenizer.decode(&[token])?;
            if self.pos.in_turn == self.prompt_size + 1 {
                // First generated token of the turn: strip leading whitespace
                // left over from the framing tokens.
                if self.config.verbosity >= 1 {
                    writeln!(self.out)?;
                    writeln!(self.out)?;
                }
                write!(self.out, "{}", text.trim_start_matches([' ', '\t', '\n']))?;
            } else {
                write!(self.out, "{text}")?;
            }
            self.out.flush()?;
        }

        Ok(true)
    }

    /// True when the non-multiturn end-of-sequence path asked for the fixed
    /// reseed. Read by the session loop after `generate` returns.
    pub fn reseed_requested(&self) -> bool {
        self.reseed
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TableTokenizer;

    fn quiet() -> GenerationConfig {
        GenerationConfig {
            verbosity: 0,
            ..Default::default()
        }
    }

    fn drive(
        config: &GenerationConfig,
        prompt_size: usize,
        tokens: &[u32],
        tokenizer: &TableTokenizer,
    ) -> (Position, Vec<u8>, Vec<u8>, bool) {
        let mut pos = Position::default();
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let reseed = {
            let mut sink =
                StreamSink::new(tokenizer, config, &mut pos, prompt_size, &mut out, &mut diag);
            for &t in tokens {
                assert!(sink.on_token(t, 0.0).unwrap());
            }
            sink.reseed_requested()
        };
        (pos, out, diag, reseed)
    }

    #[test]
    fn prompt_replay_emits_progress_dots() {
        let tok = TableTokenizer::new(&[(30, "a"), (31, "b")]);
        let (pos, out, diag, _) = drive(&quiet(), 3, &[10, 11, 30], &tok);
        // Two replay positions below prompt_size, then the final prompt token
        // flows through the ordinary decode path.
        assert_eq!(diag, b"..");
        assert_eq!(out, b"a");
        assert_eq!(pos.absolute, 3);
        assert_eq!(pos.in_turn, 3);
    }

    #[test]
    fn first_generated_token_is_trimmed_second_is_verbatim() {
        let tok = TableTokenizer::new(&[(5, "\n"), (10, "  \nhello"), (11, " world")]);
        let (_, out, _, _) = drive(&quiet(), 1, &[5, 10, 11], &tok);
        // Token 5 sits at index prompt_size (framing artifact, printed as-is),
        // token 10 is the first generated token and loses its leading
        // whitespace, token 11 is untouched.
        assert_eq!(String::from_utf8(out).unwrap(), "\nhello world");
    }

    #[test]
    fn eos_resets_absolute_position_when_single_turn() {
        let config = GenerationConfig {
            multiturn: false,
            verbosity: 0,
            ..Default::default()
        };
        let tok = TableTokenizer::new(&[(30, "x")]);
        let (pos, out, _, reseed) = drive(&config, 1, &[30, EOS_ID], &tok);
        assert_eq!(pos.absolute, 0);
        assert_eq!(pos.in_turn, 2);
        assert_eq!(out, b"x");
        // Determinism was not requested, so no reseed.
        assert!(!reseed);
    }

    #[test]
    fn eos_requests_reseed_when_deterministic() {
        let config = GenerationConfig {
            multiturn: false,
            deterministic: true,
            verbosity: 0,
            ..Default::default()
        };
        let tok = TableTokenizer::new(&[]);
        let (pos, _, _, reseed) = drive(&config, 0, &[EOS_ID], &tok);
        assert_eq!(pos.absolute, 0);
        assert!(reseed);
    }

    #[test]
    fn eos_keeps_absolute_position_when_multiturn() {
        let config = GenerationConfig {
            multiturn: true,
            deterministic: true,
            verbosity: 0,
            ..Default::default()
        };
        let tok = TableTokenizer::new(&[]);
        let (pos, _, _, reseed) = drive(&config, 0, &[EOS_ID], &tok);
        assert_eq!(pos.absolute, 1);
        assert!(!reseed);
    }

    #[test]
    fn end_marker_printed_at_verbosity_two() {
        let config = GenerationConfig {
            verbosity: 2,
            ..Default::default()
        };
        let tok = TableTokenizer::new(&[]);
        let (_, out, _, _) = drive(&config, 0, &[EOS_ID], &tok);
        assert_eq!(String::from_utf8(out).unwrap(), "\n[ End ]\n");
    }

    #[test]
    fn decode_failure_aborts_the_turn() {
        let tok = TableTokenizer::new(&[]);
        let config = quiet();
        let mut pos = Position::default();
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let mut sink = StreamSink::new(&tok, &config, &mut pos, 0, &mut out, &mut diag);
        assert!(sink.on_token(999, 0.0).is_err());
    }

    #[test]
    fn counters_cover_replay_and_generation_without_double_counting() {
        let tok = TableTokenizer::new(&[(30, "x"), (31, "y"), (32, "z")]);
        // 4 prompt tokens replayed, 2 generated, then EOS.
        let (pos, _, diag, _) = drive(
            &GenerationConfig {
                multiturn: true,
                verbosity: 0,
                ..Default::default()
            },
            4,
            &[10, 11, 12, 30, 31, 32, EOS_ID],
            &tok,
        );
        assert_eq!(pos.in_turn, 7);
        assert_eq!(pos.absolute, 7);
        assert_eq!(diag, b"...");
    }
}
