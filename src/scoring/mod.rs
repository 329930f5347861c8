//! Evaluation scoring.
//!
//! A candidate gets a fresh engine seeded with the problem's start text, runs
//! to completion (followed by one escape key), and passes if the resulting
//! buffer equals the expected text under either comparison:
//!
//! - exact: identical after stripping trailing empty lines
//! - content: identical after stripping all empty lines

mod scorer;

pub use scorer::{
    compare, content_match, exact_match, split_lines, Evaluation, EvaluationOutcome,
    EvaluationScorer, MatchKind, ScorerConfig,
};
