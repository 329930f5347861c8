//! Tests against a real headless Neovim.
//!
//! Run with: cargo test --test neovim_session -- --ignored
//! Set NVIM_BIN to use a binary other than `nvim` on PATH.

use std::sync::Arc;
use std::time::Duration;

use vimgolf_bench::agent::EditingAgent;
use vimgolf_bench::engine::{Cursor, Mode, NeovimConfig, NeovimLauncher};
use vimgolf_bench::error::EngineError;
use vimgolf_bench::scoring::{EvaluationOutcome, EvaluationScorer, MatchKind, ScorerConfig};
use vimgolf_bench::session::EditingSession;

fn launcher() -> NeovimLauncher {
    let binary = std::env::var("NVIM_BIN").unwrap_or_else(|_| "nvim".to_string());
    NeovimLauncher::new(NeovimConfig::new(binary))
}

fn lines(text: &[&str]) -> Option<Vec<String>> {
    Some(text.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
#[ignore] // Requires nvim
async fn test_session_round_trip() {
    let launcher = launcher();
    let mut session = EditingSession::open(&launcher, lines(&["hello", "world"]))
        .await
        .expect("session should open");

    assert_eq!(session.content().await.unwrap(), vec!["hello", "world"]);
    assert_eq!(session.cursor().await.unwrap(), Cursor { row: 1, col: 0 });
    assert_eq!(session.mode().await.unwrap(), Mode::Normal);

    session.inject("A there<Esc>").await.unwrap();
    assert_eq!(session.line(1).await.unwrap(), "hello there");
    assert_eq!(session.mode().await.unwrap(), Mode::Normal);

    session.inject("jo").await.unwrap();
    assert_eq!(session.mode().await.unwrap(), Mode::Insert);
    assert_eq!(session.cursor().await.unwrap().row, 3);

    let err = session.line(9).await.unwrap_err();
    assert!(matches!(err, EngineError::LineOutOfRange { line: 9, .. }));

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(matches!(session.content().await, Err(EngineError::InactiveSession)));
}

#[tokio::test]
#[ignore]
async fn test_fresh_session_is_single_empty_line() {
    let launcher = launcher();
    let mut session = EditingSession::open(&launcher, None).await.unwrap();
    assert_eq!(session.content().await.unwrap(), vec![String::new()]);
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_scorer_on_real_editor() {
    let scorer = EvaluationScorer::new(
        Arc::new(launcher()),
        ScorerConfig::default().with_timeout(Duration::from_secs(10)),
    );

    let pass = scorer
        .evaluate_texts("hello there", "world there", ":%s/hello/world/<CR>")
        .await;
    assert_eq!(pass.outcome, EvaluationOutcome::Passed(MatchKind::Exact));
    assert_eq!(pass.score, 1);

    // Candidate left in insert mode; the trailing escape still lets it pass
    let insert = scorer.evaluate_texts("b", "ab", "ia").await;
    assert_eq!(insert.score, 1);

    let miss = scorer
        .evaluate_texts("hello there", "world there", "dd")
        .await;
    assert_eq!(miss.outcome, EvaluationOutcome::Mismatch);
    assert_eq!(miss.final_content, Some(vec![String::new()]));

    // Same candidate, same result
    let again = scorer
        .evaluate_texts("hello there", "world there", ":%s/hello/world/<CR>")
        .await;
    assert_eq!(again.score, pass.score);
}

#[tokio::test]
#[ignore]
async fn test_agent_render_on_real_editor() {
    let launcher = launcher();
    let mut agent = EditingAgent::open(&launcher, lines(&["one", "two", "three"]))
        .await
        .unwrap();

    let result = agent.execute("jdd", "delete second line").await.unwrap();
    assert!(result.success);
    assert_eq!(result.state.content, vec!["one", "three"]);

    let rendered = agent.render_state(true).await.unwrap();
    assert!(rendered.contains("Mode: normal"));
    assert!(rendered.contains("Total Lines: 2"));

    agent.close().await.unwrap();
}
