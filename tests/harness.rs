//! End-to-end harness runs against in-process fakes.
//!
//! No editor or network is needed: engines come from `ScriptedLauncher` and
//! model answers from `ScriptedProvider`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use vimgolf_bench::agent::EditingAgent;
use vimgolf_bench::challenge::{ChallengeOrchestrator, OrchestratorConfig, Problem};
use vimgolf_bench::engine::Mode;
use vimgolf_bench::error::LlmError;
use vimgolf_bench::llm::{Completer, CompletionParams};
use vimgolf_bench::scoring::{EvaluationOutcome, EvaluationScorer, ScorerConfig};
use vimgolf_bench::testing::{ScriptedLauncher, ScriptedProvider};

fn orchestrator(
    provider: ScriptedProvider,
    launcher: &ScriptedLauncher,
    timeout: Duration,
) -> ChallengeOrchestrator {
    let completer = Completer::new(Arc::new(provider), CompletionParams::default());
    let scorer = EvaluationScorer::new(
        Arc::new(launcher.clone()),
        ScorerConfig::default().with_timeout(timeout),
    );
    ChallengeOrchestrator::new(completer, scorer)
}

fn substitution_problems() -> Vec<Problem> {
    (1..=5)
        .map(|i| {
            Problem::new(
                format!("p{i}"),
                format!("Problem {i}"),
                format!("foo {i}"),
                format!("bar {i}"),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_hanging_candidate_is_isolated() {
    let mut provider = ScriptedProvider::new();
    for i in 1..=5 {
        let answer = if i == 3 {
            "Solution: :%s/foo/bar/<CR>HANG".to_string()
        } else {
            "Solution: :%s/foo/bar/<CR>".to_string()
        };
        provider = provider.respond(format!("PROBLEM ID: p{i}\n"), answer);
    }
    let launcher = ScriptedLauncher::replacing().hanging_on("HANG");
    let orchestrator = orchestrator(provider, &launcher, Duration::from_millis(300));

    let started = Instant::now();
    let summary = orchestrator.run(&substitution_problems()).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.successful, 5);
    assert_eq!(summary.correct, 4);
    assert_eq!(summary.timeouts, 1);

    let ids: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.problem_id.as_str())
        .collect();
    assert_eq!(ids, vec!["p1", "p2", "p3", "p4", "p5"]);
    assert_eq!(summary.results[2].outcome, Some(EvaluationOutcome::Timeout));
    assert_eq!(summary.results[2].score, 0);

    assert_eq!(launcher.launches(), 5);
    assert_eq!(launcher.live(), 0);
}

#[tokio::test]
async fn test_bounded_concurrency_still_runs_everything() {
    let provider = ScriptedProvider::new()
        .respond("PROBLEM ID:", "Solution: :%s/foo/bar/<CR>")
        .with_delay(Duration::from_millis(10));
    let launcher = ScriptedLauncher::replacing();
    let orchestrator = orchestrator(provider.clone(), &launcher, Duration::from_secs(2))
        .with_config(OrchestratorConfig::default().with_max_concurrent(2));

    let summary = orchestrator.run(&substitution_problems()).await;
    assert_eq!(summary.correct, 5);
    assert_eq!(provider.calls(), 5);
    assert_eq!(summary.total_keystrokes, 5 * 13);
    assert_eq!(summary.average_correct_keystrokes, 13.0);
    assert_eq!(launcher.live(), 0);
}

#[tokio::test]
async fn test_prose_only_answer_never_launches_engine() {
    let provider = ScriptedProvider::new().respond("PROBLEM ID:", "42\n\n99");
    let launcher = ScriptedLauncher::replacing();
    let orchestrator = orchestrator(provider, &launcher, Duration::from_secs(2));

    let summary = orchestrator.run(&substitution_problems()[..2]).await;
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.correct, 0);
    for result in &summary.results {
        assert_eq!(result.outcome, Some(EvaluationOutcome::EmptyCandidate));
        assert_eq!(result.keystrokes, 0);
    }
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_llm_failure_and_panic_are_isolated() {
    let rate_limited = || LlmError::RateLimited("slow down".to_string());
    let provider = ScriptedProvider::new()
        .fail("PROBLEM ID: p1\n", rate_limited)
        .panic_on("PROBLEM ID: p2\n")
        .respond("PROBLEM ID:", "```vim\n:%s/foo/bar/<CR>\n```");
    let launcher = ScriptedLauncher::replacing();
    let orchestrator = orchestrator(provider, &launcher, Duration::from_secs(2));

    let summary = orchestrator.run(&substitution_problems()).await;
    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.correct, 3);

    assert!(!summary.results[0].success);
    assert!(summary.results[0].error.is_some());
    assert!(!summary.results[1].success);
    assert!(summary.results[2..].iter().all(|r| r.is_correct()));
    assert_eq!(launcher.launches(), 3);
    assert_eq!(launcher.live(), 0);
}

#[tokio::test]
async fn test_engine_start_failure_scores_zero() {
    let provider = ScriptedProvider::new().respond("PROBLEM ID:", "Solution: dd");
    let launcher = ScriptedLauncher::new().failing_launch();
    let orchestrator = orchestrator(provider, &launcher, Duration::from_secs(2));

    let summary = orchestrator.run(&substitution_problems()[..1]).await;
    let result = &summary.results[0];
    assert!(result.success);
    assert_eq!(result.score, 0);
    assert!(matches!(result.outcome, Some(EvaluationOutcome::EngineFailure(_))));
}

#[tokio::test]
async fn test_agent_walkthrough() {
    let launcher = ScriptedLauncher::replacing();
    let mut agent = EditingAgent::open(&launcher, Some(vec!["foo".to_string(), "baz".to_string()]))
        .await
        .unwrap();

    let results = agent
        .execute_batch([":%s/foo/bar/<CR>", "j", "A!<Esc>"])
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));

    let state = agent.current_state().await.unwrap();
    assert_eq!(state.content[0], "bar");
    assert_eq!(state.cursor.row, 2);
    assert_eq!(state.mode, Mode::Normal);

    assert_eq!(agent.command_history().len(), 3);
    assert_eq!(agent.state_history().len(), 4);

    let rendered = agent.render_state(true).await.unwrap();
    assert!(rendered.contains("=== VIM EDITOR STATE ==="));
    assert!(rendered.contains("=== SUGGESTED ACTIONS ==="));

    agent.close().await.unwrap();
    assert!(agent.execute("x", "after close").await.is_err());
    assert_eq!(launcher.live(), 0);
}
