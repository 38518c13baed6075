use std::io;
use std::path::PathBuf;

use anyhow::Result;
use candle_core::Device;
use clap::Parser;

use gemma_common::{GenerationConfig, ModelKind};
use gemma_engine::GemmaRuntime;
use gemma_session::{AcceptAll, ChatSession, HfTokenizer};

#[derive(Parser, Debug)]
#[command(name = "gemma-repl", about = "Interactive command-line driver for local Gemma inference")]
struct Args {
    /// Path to tokenizer.json.
    #[arg(long)]
    tokenizer: PathBuf,
    /// Directory holding config.json and model.safetensors.
    #[arg(long)]
    weights: PathBuf,
    /// Model selector: size plus training suffix (2b-it, 2b-pt, 7b-it,
    /// 7b-pt, 9b-it, 9b-pt, 27b-it, 27b-pt).
    #[arg(long, default_value = "2b-it")]
    model: String,
    /// Session token budget across all turns.
    #[arg(long, default_value_t = 3072)]
    max_tokens: usize,
    /// Per-turn cap on generated tokens.
    #[arg(long, default_value_t = 2048)]
    max_generated_tokens: usize,
    /// Sampling temperature (0 = greedy).
    #[arg(long, default_value_t = 1.0)]
    temperature: f64,
    /// Keep context across turns instead of resetting it at each end of turn.
    #[arg(long)]
    multiturn: bool,
    /// Seed the sampler with a fixed value for reproducible sessions.
    #[arg(long)]
    deterministic: bool,
    /// 0 = silent, 1 = prompts and responses, 2 = timing and end markers.
    #[arg(long, default_value_t = 1)]
    verbosity: u8,
    /// Worker threads for the forward pass (0 = library default).
    #[arg(long, default_value_t = 0)]
    num_threads: usize,
}

const BANNER: &str = r"
  __ _  ___ _ __ ___  _ __ ___   __ _
 / _` |/ _ \ '_ ` _ \| '_ ` _ \ / _` |
| (_| |  __/ | | | | | | | | | | (_| |
 \__, |\___|_| |_| |_|_| |_| |_|\__,_|
  __/ |
 |___/                      gemma-repl";

const INSTRUCTIONS: &str = "\
*Usage*
  Enter an instruction and press enter (%Q quits, %C clears the context).

*Examples*
  - Write an email to grandma thanking her for the cookies.
  - What are some historical attractions to visit around Massachusetts?
  - Compute the nth fibonacci number in javascript.
  - Write a standup comedy bit about GPU programming.";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let kind = ModelKind::parse(&args.model)?;
    let config = GenerationConfig {
        max_tokens: args.max_tokens,
        max_generated_tokens: args.max_generated_tokens,
        temperature: args.temperature,
        multiturn: args.multiturn,
        deterministic: args.deterministic,
        verbosity: args.verbosity,
    };
    config.validate()?;

    if args.num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.num_threads)
            .build_global()?;
    }

    let device = Device::cuda_if_available(0)?;
    let tokenizer = HfTokenizer::from_file(&args.tokenizer)?;
    eprintln!("Loading model from {} ...", args.weights.display());
    let runtime = GemmaRuntime::load(&args.weights, kind.family, &config, device)?;

    if config.verbosity >= 1 {
        show_banner(&args, &config);
    }

    let mut session = ChatSession::new(tokenizer, runtime, AcceptAll, config, kind.mode)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    session.run(stdin.lock(), &mut stdout, &mut stderr)?;
    Ok(())
}

fn show_banner(args: &Args, config: &GenerationConfig) {
    // Clear the screen and home the cursor.
    print!("\x1b[2J\x1b[1;1H");
    println!("{BANNER}\n");
    show_config(args, config);
    println!("\n{INSTRUCTIONS}\n");
}

fn show_config(args: &Args, config: &GenerationConfig) {
    println!("Model                         : {}", args.model);
    println!("Weights                       : {}", args.weights.display());
    println!("Tokenizer                     : {}", args.tokenizer.display());
    println!("Max tokens                    : {}", config.max_tokens);
    println!("Max generated tokens          : {}", config.max_generated_tokens);
    println!("Temperature                   : {}", config.temperature);
    println!("Multiturn                     : {}", config.multiturn);
    println!("Deterministic                 : {}", config.deterministic);
    if config.verbosity >= 2 {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        println!("Hardware concurrency          : {threads}");
        println!("Worker threads                : {}", args.num_threads);
    }
}
