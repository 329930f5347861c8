//! Challenge problems and the run that solves and scores them.

mod orchestrator;
pub mod problem;
pub mod prompt;

pub use orchestrator::{
    summarize, ChallengeOrchestrator, ChallengeResult, ChallengeSummary, ChallengeTiming,
    OrchestratorConfig,
};
pub use problem::{
    builtin_problems, find_problem, load_problems, parse_problems, validate_problems, Problem,
};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
