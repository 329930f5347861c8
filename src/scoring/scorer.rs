//! Binary scoring of a candidate against a problem in a disposable session.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::challenge::Problem;
use crate::engine::{EngineLauncher, LaunchOptions};
use crate::error::EngineError;
use crate::keys::ESCAPE_KEY;
use crate::session::EditingSession;

/// Configuration for [`EvaluationScorer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Wall-clock bound for one evaluation, session startup included.
    pub timeout: Duration,
    /// Keystroke sent after the candidate to leave any pending mode.
    pub neutral_key: String,
}

impl ScorerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_neutral_key(mut self, key: impl Into<String>) -> Self {
        self.neutral_key = key.into();
        self
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            neutral_key: ESCAPE_KEY.to_string(),
        }
    }
}

/// Which comparison accepted the final content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Equal after dropping trailing empty lines.
    Exact,
    /// Equal after dropping every empty line.
    Content,
}

/// Why an evaluation scored what it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Passed(MatchKind),
    /// The engine ran but produced different text.
    Mismatch,
    /// Nothing to run; no session was opened.
    EmptyCandidate,
    /// The evaluation exceeded its time bound.
    Timeout,
    /// The engine could not be started or queried.
    EngineFailure(String),
}

impl EvaluationOutcome {
    pub fn score(&self) -> u8 {
        match self {
            EvaluationOutcome::Passed(_) => 1,
            _ => 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EvaluationOutcome::Timeout)
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationOutcome::Passed(MatchKind::Exact) => write!(f, "passed (exact)"),
            EvaluationOutcome::Passed(MatchKind::Content) => write!(f, "passed (content)"),
            EvaluationOutcome::Mismatch => write!(f, "mismatch"),
            EvaluationOutcome::EmptyCandidate => write!(f, "empty candidate"),
            EvaluationOutcome::Timeout => write!(f, "timeout"),
            EvaluationOutcome::EngineFailure(e) => write!(f, "engine failure: {}", e),
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// 1 if the final content matched, else 0.
    pub score: u8,
    pub outcome: EvaluationOutcome,
    pub duration: Duration,
    /// Buffer content after the candidate ran, when it could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_content: Option<Vec<String>>,
}

impl Evaluation {
    fn new(
        outcome: EvaluationOutcome,
        started: Instant,
        final_content: Option<Vec<String>>,
    ) -> Self {
        Self {
            score: outcome.score(),
            outcome,
            duration: started.elapsed(),
            final_content,
        }
    }
}

/// Splits text into lines the way the buffer holds them.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

fn without_trailing_empty(lines: &[String]) -> &[String] {
    let end = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(0, |idx| idx + 1);
    &lines[..end]
}

/// Equal element-for-element once trailing empty lines are dropped from both sides.
pub fn exact_match(actual: &[String], expected: &[String]) -> bool {
    without_trailing_empty(actual) == without_trailing_empty(expected)
}

/// Equal once every empty line is dropped from both sides.
pub fn content_match(actual: &[String], expected: &[String]) -> bool {
    actual
        .iter()
        .filter(|line| !line.is_empty())
        .eq(expected.iter().filter(|line| !line.is_empty()))
}

/// Exact comparison first, then the content comparison.
pub fn compare(actual: &[String], expected: &[String]) -> Option<MatchKind> {
    if exact_match(actual, expected) {
        Some(MatchKind::Exact)
    } else if content_match(actual, expected) {
        Some(MatchKind::Content)
    } else {
        None
    }
}

/// Runs candidates in fresh sessions and scores the result.
///
/// Never fails: engine trouble, hangs, and empty candidates all become a 0
/// score with a distinguishing [`EvaluationOutcome`].
#[derive(Clone)]
pub struct EvaluationScorer {
    launcher: Arc<dyn EngineLauncher>,
    config: ScorerConfig,
}

impl EvaluationScorer {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: ScorerConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Scores `candidate` against `problem`: 1 on match, else 0.
    pub async fn score(&self, problem: &Problem, candidate: &str) -> u8 {
        self.evaluate(problem, candidate).await.score
    }

    pub async fn evaluate(&self, problem: &Problem, candidate: &str) -> Evaluation {
        self.evaluate_texts(&problem.start_text, &problem.end_text, candidate)
            .await
    }

    /// Scores `candidate` turning `start_text` into `end_text`.
    pub async fn evaluate_texts(
        &self,
        start_text: &str,
        end_text: &str,
        candidate: &str,
    ) -> Evaluation {
        let started = Instant::now();

        if candidate.trim().is_empty() {
            debug!("Empty candidate, skipping evaluation");
            return Evaluation::new(EvaluationOutcome::EmptyCandidate, started, None);
        }

        let expected = split_lines(end_text);
        let run = self.run_candidate(split_lines(start_text), candidate);

        // Dropping `run` on timeout drops the session, which kills the engine.
        match tokio::time::timeout(self.config.timeout, run).await {
            Ok(Ok(content)) => {
                let outcome = match compare(&content, &expected) {
                    Some(kind) => EvaluationOutcome::Passed(kind),
                    None => EvaluationOutcome::Mismatch,
                };
                debug!(outcome = %outcome, "Evaluation finished");
                Evaluation::new(outcome, started, Some(content))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Evaluation engine failure");
                let outcome = EvaluationOutcome::EngineFailure(e.to_string());
                Evaluation::new(outcome, started, None)
            }
            Err(_) => {
                info!(timeout = ?self.config.timeout, "Evaluation timed out");
                Evaluation::new(EvaluationOutcome::Timeout, started, None)
            }
        }
    }

    async fn run_candidate(
        &self,
        start_lines: Vec<String>,
        candidate: &str,
    ) -> Result<Vec<String>, EngineError> {
        let options = LaunchOptions::new(start_lines).quiet();
        let launcher = self.launcher.as_ref();
        let mut session = EditingSession::open_with(launcher, &options).await?;

        let content = self.drive(&mut session, candidate).await;

        if let Err(e) = session.close().await {
            warn!(session = %session.id(), error = %e, "Failed to close evaluation session");
        }
        content
    }

    async fn drive(
        &self,
        session: &mut EditingSession,
        candidate: &str,
    ) -> Result<Vec<String>, EngineError> {
        if let Err(e) = session.inject(candidate).await {
            debug!(error = %e, "Candidate injection failed, scoring resulting state");
        }
        if let Err(e) = session.inject(&self.config.neutral_key).await {
            debug!(error = %e, "Neutral key injection failed");
        }
        session.content().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLauncher;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn scorer(launcher: &ScriptedLauncher) -> EvaluationScorer {
        EvaluationScorer::new(
            Arc::new(launcher.clone()),
            ScorerConfig::default().with_timeout(Duration::from_millis(200)),
        )
    }

    #[test]
    fn test_exact_match_ignores_trailing_empty_lines() {
        assert!(exact_match(&lines(&["a", "b", ""]), &lines(&["a", "b"])));
        assert!(exact_match(&lines(&[""]), &lines(&[])));
        assert!(!exact_match(&lines(&["a", "", "b"]), &lines(&["a", "b"])));
        assert!(!exact_match(&lines(&["a "]), &lines(&["a"])));
    }

    #[test]
    fn test_content_match_ignores_all_empty_lines() {
        assert!(content_match(&lines(&["", "a", "", "b", ""]), &lines(&["a", "b"])));
        assert!(!content_match(&lines(&["a", "c"]), &lines(&["a", "b"])));
        assert!(!content_match(&lines(&["a", " "]), &lines(&["a"])));
    }

    #[test]
    fn test_compare_prefers_exact() {
        assert_eq!(
            compare(&lines(&["a"]), &lines(&["a", ""])),
            Some(MatchKind::Exact)
        );
        assert_eq!(
            compare(&lines(&["a", "", "b"]), &lines(&["a", "b"])),
            Some(MatchKind::Content)
        );
        assert_eq!(compare(&lines(&["b"]), &lines(&["a"])), None);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb"), lines(&["a", "b"]));
        assert_eq!(split_lines("a\r\nb\n"), lines(&["a", "b"]));
        assert!(split_lines("").is_empty());
    }

    #[tokio::test]
    async fn test_empty_candidate_opens_no_session() {
        let launcher = ScriptedLauncher::new();
        let scorer = scorer(&launcher);

        for candidate in ["", "   ", "\n\t"] {
            let evaluation = scorer.evaluate_texts("a", "a", candidate).await;
            assert_eq!(evaluation.score, 0);
            assert_eq!(evaluation.outcome, EvaluationOutcome::EmptyCandidate);
        }
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_correct_candidate_scores_one() {
        let launcher = ScriptedLauncher::replacing();
        let scorer = scorer(&launcher);

        let evaluation = scorer
            .evaluate_texts("hello there", "world there", ":%s/hello/world/<CR>")
            .await;
        assert_eq!(evaluation.score, 1);
        assert_eq!(
            evaluation.outcome,
            EvaluationOutcome::Passed(MatchKind::Exact)
        );
        assert_eq!(evaluation.final_content, Some(lines(&["world there"])));
        assert_eq!(launcher.fed_keys(), vec![":%s/hello/world/<CR>", "<Esc>"]);
        assert_eq!(launcher.live(), 0);
    }

    #[tokio::test]
    async fn test_prose_candidate_scores_zero() {
        let launcher = ScriptedLauncher::replacing();
        let scorer = scorer(&launcher);

        let evaluation = scorer
            .evaluate_texts("hello there", "world there", "not a vim command at all")
            .await;
        assert_eq!(evaluation.score, 0);
        assert_eq!(evaluation.outcome, EvaluationOutcome::Mismatch);
    }

    #[tokio::test]
    async fn test_content_match_accepts_stray_blank_lines() {
        let launcher = ScriptedLauncher::new().with_transform(|lines, _| {
            let mut out = lines.to_vec();
            out.insert(1, String::new());
            out
        });
        let scorer = scorer(&launcher);

        let evaluation = scorer.evaluate_texts("a\nb", "a\nb", "o<Esc>").await;
        assert_eq!(evaluation.score, 1);
        assert_eq!(
            evaluation.outcome,
            EvaluationOutcome::Passed(MatchKind::Content)
        );
    }

    #[tokio::test]
    async fn test_timeout_scores_zero_and_releases_engine() {
        let launcher = ScriptedLauncher::new().hanging_on("HANG");
        let scorer = scorer(&launcher);

        let evaluation = scorer.evaluate_texts("a", "a", "HANG").await;
        assert_eq!(evaluation.score, 0);
        assert!(evaluation.outcome.is_timeout());
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.live(), 0);
    }

    #[tokio::test]
    async fn test_injection_error_is_swallowed() {
        let launcher = ScriptedLauncher::new().failing_injection_on("BAD");
        let scorer = scorer(&launcher);

        let evaluation = scorer.evaluate_texts("x", "x", "BAD").await;
        assert_eq!(evaluation.score, 1);
        assert_eq!(launcher.fed_keys(), vec!["BAD", "<Esc>"]);
    }

    #[tokio::test]
    async fn test_launch_failure_is_engine_failure() {
        let launcher = ScriptedLauncher::new().failing_launch();
        let scorer = scorer(&launcher);

        let evaluation = scorer.evaluate_texts("x", "y", "dd").await;
        assert_eq!(evaluation.score, 0);
        assert!(matches!(evaluation.outcome, EvaluationOutcome::EngineFailure(_)));
    }

    #[tokio::test]
    async fn test_evaluate_problem() {
        let launcher = ScriptedLauncher::replacing();
        let scorer = scorer(&launcher);
        let problem = Problem::new("p1", "Swap", "hello there", "world there");

        assert_eq!(scorer.score(&problem, ":s/hello/world/<CR>").await, 1);
        assert_eq!(scorer.score(&problem, "").await, 0);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = EvaluationOutcome::Passed(MatchKind::Content);
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"passed","detail":"content"}"#);
        let json = serde_json::to_string(&EvaluationOutcome::Timeout).unwrap();
        assert_eq!(json, r#"{"status":"timeout"}"#);
    }
}
