//! LLM collaborator.
//!
//! The harness only needs one operation from a model: turn a system prompt
//! and a user prompt into text. [`Completer`] provides that on top of any
//! [`LlmProvider`]; [`LiteLlmClient`] is the HTTP provider for OpenAI,
//! OpenRouter, and LiteLLM proxies.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vimgolf_bench::llm::{Completer, CompletionParams, LiteLlmClient};
//!
//! let client = LiteLlmClient::openai(api_key, "gpt-4");
//! let completer = Completer::new(Arc::new(client), CompletionParams::default());
//! let text = completer.complete(SYSTEM_PROMPT, &prompt).await?;
//! ```

pub mod completion;
pub mod litellm;

pub use completion::{Completer, CompletionParams};
pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL, OPENAI_BASE_URL, OPENROUTER_BASE_URL,
};
