//! Concurrent solve-and-score runs over a problem set.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::problem::Problem;
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::extraction::{ExtractionRule, SolutionExtractor};
use crate::keys::count_keystrokes;
use crate::llm::Completer;
use crate::scoring::{EvaluationOutcome, EvaluationScorer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum problems in flight at once. 0 means unbounded.
    pub max_concurrent: usize,
}

impl OrchestratorConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }
}

/// Latency breakdown for one problem, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTiming {
    pub completion_secs: f64,
    pub evaluation_secs: f64,
    pub total_secs: f64,
}

/// Outcome for one problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub problem_id: String,
    pub title: String,
    /// False when the model could not be reached or the run crashed.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub candidate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_rule: Option<ExtractionRule>,
    pub keystrokes: usize,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EvaluationOutcome>,
    pub timing: ChallengeTiming,
}

impl ChallengeResult {
    fn failed(problem: &Problem, error: impl Into<String>, timing: ChallengeTiming) -> Self {
        Self {
            problem_id: problem.id.clone(),
            title: problem.title.clone(),
            success: false,
            error: Some(error.into()),
            response: None,
            candidate: String::new(),
            extraction_rule: None,
            keystrokes: 0,
            score: 0,
            outcome: None,
            timing,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.score == 1
    }

    pub fn timed_out(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(EvaluationOutcome::is_timeout)
    }
}

/// Aggregate counts over a run.
///
/// Keystroke totals and averages cover successful results; the `correct_*`
/// fields cover correct ones only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub attempted: usize,
    pub successful: usize,
    pub correct: usize,
    pub timeouts: usize,
    pub total_keystrokes: usize,
    pub average_keystrokes: f64,
    pub correct_keystrokes: usize,
    pub average_correct_keystrokes: f64,
    pub results: Vec<ChallengeResult>,
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Aggregates per-problem results.
pub fn summarize(results: Vec<ChallengeResult>) -> ChallengeSummary {
    let successful: Vec<&ChallengeResult> = results.iter().filter(|r| r.success).collect();
    let correct: Vec<&ChallengeResult> = successful
        .iter()
        .copied()
        .filter(|r| r.is_correct())
        .collect();

    let total_keystrokes = successful.iter().map(|r| r.keystrokes).sum();
    let correct_keystrokes = correct.iter().map(|r| r.keystrokes).sum();

    ChallengeSummary {
        attempted: results.len(),
        successful: successful.len(),
        correct: correct.len(),
        timeouts: results.iter().filter(|r| r.timed_out()).count(),
        total_keystrokes,
        average_keystrokes: average(total_keystrokes, successful.len()),
        correct_keystrokes,
        average_correct_keystrokes: average(correct_keystrokes, correct.len()),
        results,
    }
}

/// Asks the model for each problem, extracts a candidate, and scores it.
///
/// Problems are independent: one failing, hanging, or panicking never
/// affects another's result, and every input problem gets exactly one result.
#[derive(Clone)]
pub struct ChallengeOrchestrator {
    completer: Completer,
    scorer: EvaluationScorer,
    extractor: SolutionExtractor,
    config: OrchestratorConfig,
}

impl ChallengeOrchestrator {
    pub fn new(completer: Completer, scorer: EvaluationScorer) -> Self {
        Self {
            completer,
            scorer,
            extractor: SolutionExtractor::default(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: SolutionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Solves and scores a single problem.
    pub async fn run_one(&self, problem: &Problem) -> ChallengeResult {
        let started = Instant::now();
        let prompt = build_prompt(problem);

        let response = match self.completer.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = started.elapsed().as_secs_f64();
                warn!(problem_id = %problem.id, error = %e, "Completion failed");
                return ChallengeResult::failed(
                    problem,
                    e.to_string(),
                    ChallengeTiming {
                        completion_secs: elapsed,
                        evaluation_secs: 0.0,
                        total_secs: elapsed,
                    },
                );
            }
        };
        let completion_secs = started.elapsed().as_secs_f64();

        let extraction = self.extractor.extract(&response);
        let candidate = extraction
            .as_ref()
            .map(|e| e.candidate.clone())
            .unwrap_or_default();
        let keystrokes = count_keystrokes(&candidate);

        let evaluation_started = Instant::now();
        let evaluation = self.scorer.evaluate(problem, &candidate).await;
        let evaluation_secs = evaluation_started.elapsed().as_secs_f64();

        info!(
            problem_id = %problem.id,
            score = evaluation.score,
            keystrokes = keystrokes,
            outcome = %evaluation.outcome,
            "Challenge evaluated"
        );

        ChallengeResult {
            problem_id: problem.id.clone(),
            title: problem.title.clone(),
            success: true,
            error: None,
            response: Some(response),
            candidate,
            extraction_rule: extraction.map(|e| e.rule),
            keystrokes,
            score: evaluation.score,
            outcome: Some(evaluation.outcome),
            timing: ChallengeTiming {
                completion_secs,
                evaluation_secs,
                total_secs: started.elapsed().as_secs_f64(),
            },
        }
    }

    /// Runs every problem concurrently. Results come back in input order.
    pub async fn run_all(&self, problems: &[Problem]) -> Vec<ChallengeResult> {
        let semaphore = (self.config.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrent)));

        info!(
            problems = problems.len(),
            max_concurrent = self.config.max_concurrent,
            "Running challenges"
        );

        let handles: Vec<_> = problems
            .iter()
            .map(|problem| {
                let this = self.clone();
                let problem = problem.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = match semaphore {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    this.run_one(&problem).await
                })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        problems
            .iter()
            .zip(joined)
            .map(|(problem, outcome)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!(problem_id = %problem.id, error = %e, "Challenge task panicked");
                    ChallengeResult::failed(
                        problem,
                        format!("task failed: {}", e),
                        ChallengeTiming::default(),
                    )
                }
            })
            .collect()
    }

    /// Runs every problem and aggregates the results.
    pub async fn run(&self, problems: &[Problem]) -> ChallengeSummary {
        summarize(self.run_all(problems).await)
    }
}
