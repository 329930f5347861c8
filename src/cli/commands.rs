//! CLI command definitions for vimgolf-bench.
//!
//! Runs the challenge set against a model, or exercises the scorer,
//! extractor, and keystroke counter on their own.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::challenge::{
    builtin_problems, find_problem, load_problems, ChallengeOrchestrator, ChallengeSummary,
    OrchestratorConfig, Problem,
};
use crate::engine::{NeovimConfig, NeovimLauncher};
use crate::error::LlmError;
use crate::extraction::{ExtractionRule, SolutionExtractor};
use crate::keys::count_keystrokes;
use crate::llm::{Completer, CompletionParams, LiteLlmClient, LlmProvider, DEFAULT_MODEL};
use crate::scoring::{Evaluation, EvaluationScorer, ScorerConfig};

/// Default per-evaluation time bound in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// VimGolf evaluation harness for LLMs.
#[derive(Parser)]
#[command(name = "vimgolf-bench")]
#[command(about = "Score LLM-written Vim keystroke solutions in a real editor")]
#[command(version)]
#[command(
    long_about = "vimgolf-bench asks a model to solve VimGolf challenges, extracts the keystroke sequence from its answer, replays it in a headless Neovim, and scores the result.\n\nExample usage:\n  vimgolf-bench solve --model gpt-4 --max-concurrent 4\n  vimgolf-bench score --start 'hello there' --end 'world there' --candidate ':%s/hello/world/<CR>'"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Solve every problem with a model and score the answers.
    Solve(SolveArgs),

    /// Score one keystroke sequence against a problem.
    Score(ScoreArgs),

    /// Extract a keystroke sequence from free text.
    Extract(ExtractArgs),

    /// Count the keystrokes in a sequence.
    Count(CountArgs),
}

/// Which OpenAI-compatible endpoint to talk to.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Openai,
    Openrouter,
    /// A LiteLLM proxy configured through `LITELLM_*` variables.
    Litellm,
}

/// Editor engine settings shared by commands that score.
#[derive(clap::Args, Debug)]
pub struct EngineArgs {
    /// Neovim binary to launch.
    #[arg(long, env = "NVIM_BIN", default_value = "nvim")]
    pub nvim_bin: PathBuf,

    /// Per-evaluation time bound in seconds.
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl EngineArgs {
    fn scorer(&self) -> EvaluationScorer {
        let launcher = NeovimLauncher::new(NeovimConfig::new(self.nvim_bin.clone()));
        EvaluationScorer::new(
            Arc::new(launcher),
            ScorerConfig::default().with_timeout(Duration::from_secs(self.timeout)),
        )
    }
}

/// Arguments for the solve command.
#[derive(clap::Args, Debug)]
pub struct SolveArgs {
    /// Problem set file (YAML or JSON). Defaults to the built-in set.
    #[arg(short = 'p', long)]
    pub problems: Option<PathBuf>,

    /// Only run these problem ids.
    #[arg(long = "only", value_delimiter = ',')]
    pub only: Vec<String>,

    /// Model to ask.
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Endpoint to use.
    #[arg(long, value_enum, default_value_t = ProviderKind::Openai)]
    pub provider: ProviderKind,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.1)]
    pub temperature: f64,

    /// Maximum tokens per answer.
    #[arg(long, default_value_t = 1000)]
    pub max_tokens: u32,

    /// Problems in flight at once (0 for no limit).
    #[arg(short = 'c', long, default_value_t = 0)]
    pub max_concurrent: usize,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the score command.
#[derive(clap::Args, Debug)]
pub struct ScoreArgs {
    /// Keystroke sequence to evaluate.
    #[arg(long, allow_hyphen_values = true)]
    pub candidate: String,

    /// Problem to score against.
    #[arg(long, conflicts_with_all = ["start", "end"], required_unless_present = "start")]
    pub problem_id: Option<String>,

    /// Problem set file used with --problem-id. Defaults to the built-in set.
    #[arg(short = 'p', long, requires = "problem_id")]
    pub problems: Option<PathBuf>,

    /// Start text, used with --end.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Expected end text, used with --start.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the extract command.
#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Read text from this file instead of stdin.
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the count command.
#[derive(clap::Args, Debug)]
pub struct CountArgs {
    /// Keystroke sequence, e.g. `:%s/a/b/<CR>`.
    #[arg(allow_hyphen_values = true)]
    pub sequence: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Solve(args) => run_solve_command(args).await,
        Commands::Score(args) => run_score_command(args).await,
        Commands::Extract(args) => run_extract_command(args),
        Commands::Count(args) => {
            println!("{}", count_keystrokes(&args.sequence));
            Ok(())
        }
    }
}

// ============================================================================
// Solve
// ============================================================================

fn load_problem_set(path: Option<&Path>) -> anyhow::Result<Vec<Problem>> {
    match path {
        Some(path) => load_problems(path)
            .with_context(|| format!("Failed to load problems from {}", path.display())),
        None => Ok(builtin_problems()),
    }
}

fn build_llm_client(args: &SolveArgs) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let client = match args.provider {
        ProviderKind::Openai => {
            let key = args.openai_api_key.clone().ok_or(LlmError::MissingApiKey)?;
            LiteLlmClient::openai(key, &args.model)
        }
        ProviderKind::Openrouter => {
            let key = args
                .openrouter_api_key
                .clone()
                .ok_or(LlmError::MissingApiKey)?;
            LiteLlmClient::openrouter(key, &args.model)
        }
        ProviderKind::Litellm => LiteLlmClient::from_env()
            .context("Failed to initialize LiteLLM client from environment")?,
    };

    info!(
        api_base = %client.api_base(),
        api_key = %client.api_key_masked(),
        model = %args.model,
        "Using LLM endpoint"
    );
    Ok(Arc::new(client))
}

async fn run_solve_command(args: SolveArgs) -> anyhow::Result<()> {
    let mut problems = load_problem_set(args.problems.as_deref())?;
    if !args.only.is_empty() {
        problems.retain(|p| args.only.contains(&p.id));
        anyhow::ensure!(!problems.is_empty(), "No problems match --only");
    }

    let params = CompletionParams::new(&args.model)
        .with_temperature(args.temperature)
        .with_max_tokens(args.max_tokens);
    let completer = Completer::new(build_llm_client(&args)?, params);

    let orchestrator = ChallengeOrchestrator::new(completer, args.engine.scorer())
        .with_config(OrchestratorConfig::default().with_max_concurrent(args.max_concurrent));

    let summary = orchestrator.run(&problems).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&args.model, &problems, &summary);
    }
    Ok(())
}

fn print_summary(model: &str, problems: &[Problem], summary: &ChallengeSummary) {
    let best: HashMap<&str, Option<u32>> = problems
        .iter()
        .map(|p| (p.id.as_str(), p.best_score))
        .collect();

    println!("\n=== VimGolf Results ===");
    println!("Model:            {}", model);
    println!("Attempted:        {}", summary.attempted);
    println!("Successful:       {}", summary.successful);
    println!("Correct:          {}", summary.correct);
    println!("Timeouts:         {}", summary.timeouts);
    println!("Avg keystrokes:   {:.1}", summary.average_keystrokes);
    println!("Avg (correct):    {:.1}", summary.average_correct_keystrokes);
    println!();

    for result in &summary.results {
        let mark = if result.is_correct() { "✓" } else { "✗" };
        let best = match best.get(result.problem_id.as_str()).copied().flatten() {
            Some(best) => format!(" (best {})", best),
            None => String::new(),
        };
        println!(
            "  {} {:<16} {:>4} keys{}  {}",
            mark, result.problem_id, result.keystrokes, best, result.title
        );
        if let Some(err) = &result.error {
            println!("    error: {err}");
        } else if let Some(outcome) = &result.outcome {
            println!("    {}: {}", outcome, result.candidate);
        }
    }
}

// ============================================================================
// Score
// ============================================================================

#[derive(Serialize)]
struct ScoreOutput<'a> {
    candidate: &'a str,
    keystrokes: usize,
    #[serde(flatten)]
    evaluation: &'a Evaluation,
}

async fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let scorer = args.engine.scorer();

    let evaluation = match (&args.problem_id, &args.start, &args.end) {
        (Some(id), _, _) => {
            let problems = load_problem_set(args.problems.as_deref())?;
            let problem = find_problem(&problems, id)?;
            scorer.evaluate(problem, &args.candidate).await
        }
        (None, Some(start), Some(end)) => scorer.evaluate_texts(start, end, &args.candidate).await,
        _ => anyhow::bail!("Provide --problem-id or both --start and --end"),
    };

    let keystrokes = count_keystrokes(&args.candidate);
    if args.json {
        let output = ScoreOutput {
            candidate: &args.candidate,
            keystrokes,
            evaluation: &evaluation,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Score:      {}", evaluation.score);
        println!("Outcome:    {}", evaluation.outcome);
        println!("Keystrokes: {}", keystrokes);
        println!("Duration:   {:.2}s", evaluation.duration.as_secs_f64());
        if let Some(content) = &evaluation.final_content {
            println!("Final buffer:");
            for line in content {
                println!("  {}", line);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Extract
// ============================================================================

#[derive(Serialize)]
struct ExtractOutput {
    candidate: String,
    rule: Option<ExtractionRule>,
    keystrokes: usize,
}

fn run_extract_command(args: ExtractArgs) -> anyhow::Result<()> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let output = match SolutionExtractor::new().extract(&text) {
        Some(extraction) => ExtractOutput {
            keystrokes: count_keystrokes(&extraction.candidate),
            candidate: extraction.candidate,
            rule: Some(extraction.rule),
        },
        None => ExtractOutput {
            candidate: String::new(),
            rule: None,
            keystrokes: 0,
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match output.rule {
            Some(rule) => {
                println!("{}", output.candidate);
                println!("Keystrokes: {} ({})", output.keystrokes, rule);
            }
            None => println!("No keystroke sequence found"),
        }
    }
    Ok(())
}
