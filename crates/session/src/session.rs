//! Session loop: the REPL state machine driving turn building and generation.

use std::io::{BufRead, Write};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use gemma_common::tokens::DETERMINISTIC_SEED;
use gemma_common::{ConversationMode, GenerationConfig, Result};

use crate::engine::{AcceptPolicy, Engine, Tokenizer};
use crate::stream::StreamSink;
use crate::turn::Turn;

/// The two token counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Monotonic count of tokens consumed across the whole session; never
    /// decreases except on explicit reset.
    pub absolute: usize,
    /// Count of tokens consumed within the current turn; zeroed at the start
    /// of every turn.
    pub in_turn: usize,
}

impl Position {
    /// Explicit context reset (clear sentinel, or end-of-turn without
    /// multiturn).
    pub fn reset(&mut self) {
        self.absolute = 0;
    }

    pub fn start_turn(&mut self) {
        self.in_turn = 0;
    }
}

/// Interactive session: reads one line at a time, builds a turn, streams the
/// generation, and decides when the whole session terminates.
///
/// Owns the random state and the position counters for the session lifetime;
/// the turn builder and streaming sink borrow them for one turn at a time.
pub struct ChatSession<T, E, A> {
    tokenizer: T,
    engine: E,
    accept: A,
    config: GenerationConfig,
    mode: ConversationMode,
    rng: StdRng,
    pos: Position,
}

impl<T: Tokenizer, E: Engine, A: AcceptPolicy> ChatSession<T, E, A> {
    pub fn new(
        tokenizer: T,
        engine: E,
        accept: A,
        config: GenerationConfig,
        mode: ConversationMode,
    ) -> Result<Self> {
        config.validate()?;
        let rng = if config.deterministic {
            StdRng::seed_from_u64(DETERMINISTIC_SEED)
        } else {
            StdRng::from_entropy()
        };
        Ok(Self {
            tokenizer,
            engine,
            accept,
            config,
            mode,
            rng,
            pos: Position::default(),
        })
    }

    /// Current counters, mostly of interest to tests and diagnostics.
    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the loop until quit, end of input, or an exhausted token budget.
    ///
    /// End of input is normal termination, not an error. Encode and decode
    /// failures abort the whole session.
    pub fn run<R: BufRead>(
        &mut self,
        mut input: R,
        out: &mut dyn Write,
        diag: &mut dyn Write,
    ) -> Result<()> {
        while self.pos.absolute < self.config.max_tokens {
            if self.config.verbosity >= 1 {
                write!(out, "> ")?;
                out.flush()?;
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end_matches(['\r', '\n']);

            if line.eq_ignore_ascii_case("%q") {
                return Ok(());
            }
            if line.eq_ignore_ascii_case("%c") {
                tracing::debug!("clear sentinel: resetting context");
                self.pos.reset();
                continue;
            }

            self.run_turn(line, out, diag)?;
        }

        writeln!(
            out,
            "max_tokens ({}) exceeded. Use a larger value if desired using the \
             --max-tokens command line flag.",
            self.config.max_tokens
        )?;
        Ok(())
    }

    fn run_turn(&mut self, line: &str, out: &mut dyn Write, diag: &mut dyn Write) -> Result<()> {
        let turn = Turn::build(line, self.mode, self.pos.absolute, &self.tokenizer)?;
        self.pos.start_turn();
        let start_pos = self.pos.absolute;

        writeln!(diag)?;
        write!(diag, "[ Reading prompt ] ")?;
        diag.flush()?;

        let started = Instant::now();
        let reseed = {
            let Self {
                tokenizer,
                engine,
                accept,
                config,
                pos,
                rng,
                ..
            } = self;
            let mut sink = StreamSink::new(
                &*tokenizer,
                config,
                pos,
                turn.prompt_size(),
                &mut *out,
                &mut *diag,
            );
            engine.generate(
                turn.tokens(),
                start_pos,
                rng,
                &mut |token, score| sink.on_token(token, score),
                accept,
            )?;
            sink.reseed_requested()
        };
        let elapsed = started.elapsed().as_secs_f64();

        if reseed {
            self.rng = StdRng::seed_from_u64(DETERMINISTIC_SEED);
        }

        if self.config.verbosity >= 2 {
            let tok_sec = if elapsed > 0.0 {
                self.pos.in_turn as f64 / elapsed
            } else {
                0.0
            };
            writeln!(
                out,
                "{} tokens ({} total tokens)",
                self.pos.in_turn, self.pos.absolute
            )?;
            writeln!(out, "{tok_sec:.2} tokens / sec")?;
        }
        writeln!(out)?;
        writeln!(out)?;
        Ok(())
    }
}
