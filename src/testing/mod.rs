//! In-process fakes for the engine and the LLM.
//!
//! [`ScriptedLauncher`] stands in for a real editor: its engines keep a line
//! buffer, track mode with a rough model of Vim's normal/insert/visual
//! switching, and rewrite content through a caller-supplied transform. It
//! counts launches and live engines, so tests can assert that no engine was
//! started or that none leaked.
//!
//! [`ScriptedProvider`] answers completion requests from a table keyed by a
//! substring of the prompt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::engine::{Cursor, EditorEngine, EngineLauncher, EngineSnapshot, LaunchOptions};
use crate::error::{EngineError, LlmError};
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

/// Content rewrite applied on every `feed_keys`: `(lines, keys) -> lines`.
pub type Transform = Arc<dyn Fn(&[String], &str) -> Vec<String> + Send + Sync>;

/// An [`EngineLauncher`] whose engines run entirely in memory.
#[derive(Clone)]
pub struct ScriptedLauncher {
    transform: Transform,
    hang_marker: Option<String>,
    injection_failure_marker: Option<String>,
    query_failure_marker: Option<String>,
    fail_launch: bool,
    launches: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    fed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLauncher {
    /// Engines that never change their content.
    pub fn new() -> Self {
        Self {
            transform: Arc::new(|lines: &[String], _keys: &str| lines.to_vec()),
            hang_marker: None,
            injection_failure_marker: None,
            query_failure_marker: None,
            fail_launch: false,
            launches: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            fed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Engines that understand `:s/old/new/` and `:%s/old/new/g` followed by `<CR>`.
    pub fn replacing() -> Self {
        Self::new().with_transform(apply_substitutions)
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&[String], &str) -> Vec<String> + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    /// After keys containing `marker` are fed, queries never return.
    pub fn hanging_on(mut self, marker: impl Into<String>) -> Self {
        self.hang_marker = Some(marker.into());
        self
    }

    /// Feeding keys that contain `marker` fails with an injection error.
    pub fn failing_injection_on(mut self, marker: impl Into<String>) -> Self {
        self.injection_failure_marker = Some(marker.into());
        self
    }

    /// After keys containing `marker` are fed, queries fail.
    pub fn failing_queries_after(mut self, marker: impl Into<String>) -> Self {
        self.query_failure_marker = Some(marker.into());
        self
    }

    /// Every launch fails with a start error.
    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Number of launch attempts so far.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Number of engines launched and not yet terminated or dropped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Every keystroke string fed to any engine, in order.
    pub fn fed_keys(&self) -> Vec<String> {
        self.fed.lock().map(|fed| fed.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn EditorEngine>, EngineError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(EngineError::Start("scripted launch failure".to_string()));
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            lines: options.seed_lines(),
            mode: "n".to_string(),
            cursor: Cursor::default(),
            hung: false,
            queries_broken: false,
            terminated: false,
            launcher: self.clone(),
        }))
    }
}

struct ScriptedEngine {
    lines: Vec<String>,
    mode: String,
    cursor: Cursor,
    hung: bool,
    queries_broken: bool,
    terminated: bool,
    launcher: ScriptedLauncher,
}

impl ScriptedEngine {
    fn release(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.launcher.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn contains_marker(keys: &str, marker: &Option<String>) -> bool {
    marker.as_deref().is_some_and(|m| keys.contains(m))
}

#[async_trait]
impl EditorEngine for ScriptedEngine {
    async fn feed_keys(&mut self, keys: &str) -> Result<(), EngineError> {
        if self.terminated {
            return Err(EngineError::Injection("engine terminated".to_string()));
        }
        if let Ok(mut fed) = self.launcher.fed.lock() {
            fed.push(keys.to_string());
        }
        if contains_marker(keys, &self.launcher.injection_failure_marker) {
            return Err(EngineError::Injection("scripted injection failure".to_string()));
        }

        self.hung |= contains_marker(keys, &self.launcher.hang_marker);
        self.queries_broken |= contains_marker(keys, &self.launcher.query_failure_marker);

        self.lines = (self.launcher.transform)(&self.lines, keys);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        let (mode, cursor) = track_keys(&self.mode, self.cursor, self.lines.len(), keys);
        self.mode = mode;
        self.cursor = cursor;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<EngineSnapshot, EngineError> {
        if self.hung {
            std::future::pending::<()>().await;
        }
        if self.terminated || self.queries_broken {
            return Err(EngineError::Query("scripted query failure".to_string()));
        }
        Ok(EngineSnapshot {
            mode: self.mode.clone(),
            cursor: self.cursor,
            lines: self.lines.clone(),
        })
    }

    async fn terminate(&mut self) -> Result<(), EngineError> {
        self.release();
        Ok(())
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Splits a keystroke string into single characters and `<...>` names.
fn tokens(keys: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = keys;
    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(end) = rest.find('>') {
                let candidate = &rest[..=end];
                if crate::keys::is_special_key(candidate) {
                    out.push(candidate.to_string());
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        out.push(ch.to_string());
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Rough Vim mode and vertical-motion model for fakes.
fn track_keys(mode: &str, cursor: Cursor, line_count: usize, keys: &str) -> (String, Cursor) {
    let mut mode = mode.to_string();
    let mut row = cursor.row.clamp(1, line_count.max(1));
    let mut col = cursor.col;
    let mut takes_argument = false;
    let mut pending_g = false;

    for token in tokens(keys) {
        let is_escape = ["<Esc>", "<Escape>"]
            .iter()
            .any(|t| token.eq_ignore_ascii_case(t));
        let is_enter = ["<CR>", "<Enter>", "<Return>"]
            .iter()
            .any(|t| token.eq_ignore_ascii_case(t));

        let current = mode.clone();
        match current.as_str() {
            "i" | "R" => {
                if is_escape {
                    mode = "n".to_string();
                    col = col.saturating_sub(1);
                } else if !token.starts_with('<') || token.len() == 1 {
                    col += 1;
                }
            }
            "c" => {
                if is_escape || is_enter {
                    mode = "n".to_string();
                }
            }
            "v" | "V" => match token.as_str() {
                "d" | "x" | "y" | "J" | ">" | "<" => mode = "n".to_string(),
                "c" | "s" => mode = "i".to_string(),
                ":" => mode = "c".to_string(),
                _ if is_escape => mode = "n".to_string(),
                "j" => row = (row + 1).min(line_count),
                "k" => row = row.saturating_sub(1).max(1),
                _ => {}
            },
            _ => {
                if takes_argument {
                    takes_argument = false;
                    continue;
                }
                if pending_g {
                    pending_g = false;
                    if token == "g" {
                        row = 1;
                        continue;
                    }
                }
                match token.as_str() {
                    "i" | "a" | "I" | "A" | "s" | "S" | "C" => mode = "i".to_string(),
                    "o" => {
                        mode = "i".to_string();
                        row += 1;
                        col = 0;
                    }
                    "O" => {
                        mode = "i".to_string();
                        col = 0;
                    }
                    "R" => mode = "R".to_string(),
                    "v" => mode = "v".to_string(),
                    "V" => mode = "V".to_string(),
                    ":" | "/" | "?" => mode = "c".to_string(),
                    "r" | "f" | "F" | "t" | "T" | "m" | "'" | "`" | "\"" | "q" | "@" => {
                        takes_argument = true
                    }
                    "g" => pending_g = true,
                    "G" => row = line_count,
                    "j" => row = (row + 1).min(line_count),
                    "k" => row = row.saturating_sub(1).max(1),
                    "0" | "^" => col = 0,
                    _ => {}
                }
            }
        }
    }

    let mode = if mode == "c" { "n".to_string() } else { mode };
    (mode, Cursor::new(row.clamp(1, line_count.max(1)), col))
}

fn substitution_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i):(%)?s/([^/]*)/([^/]*)/(g?)<CR>").expect("substitution pattern is valid")
    })
}

/// Applies literal `:s` and `:%s` substitutions found in `keys`.
///
/// Without `%` only the first line is touched.
pub fn apply_substitutions(lines: &[String], keys: &str) -> Vec<String> {
    let mut lines = lines.to_vec();
    for caps in substitution_regex().captures_iter(keys) {
        let whole_buffer = caps.get(1).is_some();
        let from = &caps[2];
        let to = &caps[3];
        let global = !caps[4].is_empty();
        if from.is_empty() {
            continue;
        }

        let range = if whole_buffer {
            lines.len()
        } else {
            1.min(lines.len())
        };
        for line in lines.iter_mut().take(range) {
            *line = if global {
                line.replace(from, to)
            } else {
                line.replacen(from, to, 1)
            };
        }
    }
    lines
}

type ErrorFactory = Arc<dyn Fn() -> LlmError + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Text(String),
    NoChoices,
    Fail(ErrorFactory),
    Panic,
}

/// An [`LlmProvider`] that answers from a script.
///
/// Each entry is matched against the concatenated request messages; the first
/// entry whose key is a substring wins. Unmatched requests fail.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Vec<(String, Reply)>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.replies.push((key.into(), Reply::Text(text.into())));
        self
    }

    pub fn respond_without_choices(mut self, key: impl Into<String>) -> Self {
        self.replies.push((key.into(), Reply::NoChoices));
        self
    }

    pub fn fail<F>(mut self, key: impl Into<String>, error: F) -> Self
    where
        F: Fn() -> LlmError + Send + Sync + 'static,
    {
        let reply = Reply::Fail(Arc::new(error));
        self.replies.push((key.into(), reply));
        self
    }

    /// Panics while handling a matching request.
    pub fn panic_on(mut self, key: impl Into<String>) -> Self {
        self.replies.push((key.into(), Reply::Panic));
        self
    }

    /// Waits this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let prompt: String = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let reply = self
            .replies
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, reply)| reply.clone());

        let choices = match reply {
            Some(Reply::Text(text)) => vec![Choice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: "stop".to_string(),
            }],
            Some(Reply::NoChoices) => Vec::new(),
            Some(Reply::Fail(error)) => return Err(error()),
            Some(Reply::Panic) => panic!("scripted provider panic"),
            None => return Err(LlmError::RequestFailed("no scripted reply".into())),
        };

        Ok(GenerationResponse {
            id: "scripted".to_string(),
            model: request.model,
            choices,
            usage: Usage::default(),
        })
    }
}
