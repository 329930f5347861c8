//! Integration tests for the LLM client and the solve pipeline.
//!
//! These tests make real API calls to OpenAI, and the last one also needs
//! `nvim` on PATH.
//! Run with: OPENAI_API_KEY=your_key cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use vimgolf_bench::challenge::{builtin_problems, find_problem, ChallengeOrchestrator};
use vimgolf_bench::engine::{NeovimConfig, NeovimLauncher};
use vimgolf_bench::llm::{
    Completer, CompletionParams, GenerationRequest, LiteLlmClient, LlmProvider, Message,
};
use vimgolf_bench::scoring::{EvaluationScorer, ScorerConfig};

const TEST_MODEL: &str = "gpt-4o-mini";

fn get_test_api_key() -> String {
    std::env::var("OPENAI_API_KEY")
        .expect("OPENAI_API_KEY environment variable must be set for integration tests")
}

fn create_test_client() -> LiteLlmClient {
    LiteLlmClient::openai(get_test_api_key(), TEST_MODEL)
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        TEST_MODEL,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );

    assert!(response.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_completer_answers_in_solution_format() {
    let completer = Completer::new(
        Arc::new(create_test_client()),
        CompletionParams::new(TEST_MODEL),
    );

    let text = completer
        .complete(
            "You are a Vim expert.",
            "Give the Vim keystrokes that delete the current line. Reply as 'Solution: <keys>'.",
        )
        .await
        .expect("Completion should succeed");

    let candidate = vimgolf_bench::extract_solution(&text);
    assert!(!candidate.is_empty(), "No candidate in: {}", text);
}

#[tokio::test]
async fn test_invalid_api_key() {
    let client = LiteLlmClient::openai("invalid-key".to_string(), TEST_MODEL).with_max_retries(1);

    let request =
        GenerationRequest::new(TEST_MODEL, vec![Message::user("test")]).with_max_tokens(5);

    let response = client.generate(request).await;
    assert!(response.is_err(), "Should fail with invalid API key");
}

#[tokio::test]
#[ignore]
async fn test_default_model_used() {
    let client = create_test_client();

    // Empty model falls back to the client default
    let request = GenerationRequest::new("", vec![Message::user("Say 'test' and nothing else.")])
        .with_max_tokens(10);

    let response = client.generate(request).await;
    assert!(
        response.is_ok(),
        "Generation with default model failed: {:?}",
        response.err()
    );
}

#[tokio::test]
#[ignore] // Also needs nvim
async fn test_solve_one_builtin_problem() {
    let completer = Completer::new(
        Arc::new(create_test_client()),
        CompletionParams::new(TEST_MODEL),
    );
    let scorer = EvaluationScorer::new(
        Arc::new(NeovimLauncher::new(NeovimConfig::default())),
        ScorerConfig::default(),
    );
    let orchestrator = ChallengeOrchestrator::new(completer, scorer);

    let problems = builtin_problems();
    let problem = find_problem(&problems, "9v0066d89856").expect("builtin problem");
    let result = orchestrator.run_one(problem).await;

    assert!(result.success, "Run failed: {:?}", result.error);
    assert!(result.response.is_some());
    assert!(result.outcome.is_some());
}
