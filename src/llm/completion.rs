//! Single-shot `complete(system_prompt, user_prompt) -> text` over any provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::litellm::{GenerationRequest, LlmProvider, Message, DEFAULT_MODEL};
use crate::error::LlmError;

/// Sampling configuration for completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// Turns a system prompt and a user prompt into the model's reply text.
#[derive(Clone)]
pub struct Completer {
    provider: Arc<dyn LlmProvider>,
    params: CompletionParams,
}

impl Completer {
    pub fn new(provider: Arc<dyn LlmProvider>, params: CompletionParams) -> Self {
        Self { provider, params }
    }

    pub fn params(&self) -> &CompletionParams {
        &self.params
    }

    /// Returns the first choice's text.
    ///
    /// # Errors
    ///
    /// Provider failures pass through; a reply with no choices is
    /// `LlmError::EmptyResponse`.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        let request = GenerationRequest::new(
            self.params.model.clone(),
            vec![Message::system(system_prompt), Message::user(user_prompt)],
        )
        .with_temperature(self.params.temperature)
        .with_max_tokens(self.params.max_tokens);

        let response = self.provider.generate(request).await?;
        debug!(
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Completion received"
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_default_params() {
        let params = CompletionParams::default();
        assert_eq!(params.model, "gpt-4");
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.max_tokens, 1000);

        let params = CompletionParams::new("openai/gpt-4o").with_max_tokens(256);
        assert_eq!(params.model, "openai/gpt-4o");
        assert_eq!(params.max_tokens, 256);
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let provider = Arc::new(ScriptedProvider::new().respond("hello", "Solution: dd"));
        let completer = Completer::new(provider.clone(), CompletionParams::default());

        let text = completer.complete("system", "say hello").await.unwrap();
        assert_eq!(text, "Solution: dd");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_complete_propagates_provider_error() {
        let unauthorized = || LlmError::ApiError {
            code: 401,
            message: "bad key".to_string(),
        };
        let provider = Arc::new(ScriptedProvider::new().fail("boom", unauthorized));
        let completer = Completer::new(provider, CompletionParams::default());

        let err = completer.complete("system", "boom").await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { code: 401, .. }));
    }

    #[tokio::test]
    async fn test_complete_with_no_choices_is_empty_response() {
        let provider = Arc::new(ScriptedProvider::new().respond_without_choices("nothing"));
        let completer = Completer::new(provider, CompletionParams::default());

        let err = completer.complete("system", "nothing").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
