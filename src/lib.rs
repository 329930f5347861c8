//! vimgolf-bench: score LLM-written Vim keystroke solutions in a real editor.
//!
//! A model is asked to turn a start text into an end text, the keystroke
//! sequence is pulled out of its answer, replayed in a fresh headless Neovim
//! seeded with the start text, and scored on whether the buffer ends up
//! equal to the end text.
//!
//! - [`session`] and [`agent`] drive a single editor instance.
//! - [`extraction`] and [`keys`] find and count keystrokes in model output.
//! - [`scoring`] evaluates a candidate under a time bound.
//! - [`challenge`] runs a whole problem set concurrently.

pub mod agent;
pub mod challenge;
pub mod cli;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod keys;
pub mod llm;
pub mod scoring;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use agent::EditingAgent;
pub use challenge::{ChallengeOrchestrator, ChallengeResult, ChallengeSummary, Problem};
pub use error::{EngineError, LlmError, ProblemError};
pub use extraction::{extract_solution, SolutionExtractor};
pub use keys::count_keystrokes;
pub use scoring::{Evaluation, EvaluationOutcome, EvaluationScorer};
pub use session::EditingSession;
