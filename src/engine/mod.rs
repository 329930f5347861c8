//! External editing engine interface.
//!
//! The harness talks to the editor through four operations only: start an
//! isolated instance, feed it keystrokes, query its state, and terminate it.
//! [`EngineLauncher`] covers the first, [`EditorEngine`] the other three.
//!
//! ```text
//! EngineLauncher::launch ──► Box<dyn EditorEngine>
//!                              ├─ feed_keys("iHello<Esc>")
//!                              ├─ snapshot() ─► { mode, cursor, lines }
//!                              └─ terminate()
//! ```
//!
//! The production implementation is [`NeovimLauncher`], which drives a
//! headless `nvim` over its RPC socket.

pub mod neovim;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use neovim::{NeovimConfig, NeovimEngine, NeovimLauncher};

/// Editing mode reported by the engine.
///
/// Only normal, insert and visual mode get special treatment in the harness.
/// Sub-modes such as insert completion (`ic`) or visual from select (`vs`)
/// fold into their main mode; codes with no main mode are carried through as
/// [`Mode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Mode {
    Normal,
    /// A pending operator such as `d` or `c` waiting for its motion.
    OperatorPending,
    Insert,
    Visual,
    Replace,
    CommandLine,
    Other(String),
}

impl Mode {
    /// Parses the engine's raw mode code (`n`, `no`, `i`, `ic`, `v`, `Rv`, `c`, ...).
    pub fn from_code(code: &str) -> Self {
        if code.starts_with("no") {
            return Mode::OperatorPending;
        }
        match code.chars().next() {
            Some('n') => Mode::Normal,
            Some('i') => Mode::Insert,
            Some('v' | 'V' | '\u{16}') => Mode::Visual,
            Some('R') => Mode::Replace,
            Some('c') => Mode::CommandLine,
            _ => Mode::Other(code.to_string()),
        }
    }

    /// The engine's code for this mode's main form.
    pub fn code(&self) -> &str {
        match self {
            Mode::Normal => "n",
            Mode::OperatorPending => "no",
            Mode::Insert => "i",
            Mode::Visual => "v",
            Mode::Replace => "R",
            Mode::CommandLine => "c",
            Mode::Other(code) => code,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::OperatorPending => write!(f, "operator-pending"),
            Mode::Insert => write!(f, "insert"),
            Mode::Visual => write!(f, "visual"),
            Mode::Replace => write!(f, "replace"),
            Mode::CommandLine => write!(f, "command-line"),
            Mode::Other(code) => write!(f, "other({})", code.escape_debug()),
        }
    }
}

/// Cursor position: 1-indexed row, 0-indexed byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

impl Cursor {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self { row: 1, col: 0 }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Raw engine state as returned by a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Raw mode code; see [`Mode::from_code`].
    pub mode: String,
    pub cursor: Cursor,
    pub lines: Vec<String>,
}

/// How a fresh engine instance should be prepared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Initial buffer lines. Empty means a single empty line.
    pub initial_lines: Vec<String>,
    /// Suppress prompts, bells, and message noise for unattended runs.
    pub quiet: bool,
}

impl LaunchOptions {
    pub fn new(initial_lines: Vec<String>) -> Self {
        Self {
            initial_lines,
            quiet: false,
        }
    }

    /// Enables quiet, deterministic operation.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// The lines the buffer should hold after launch.
    pub fn seed_lines(&self) -> Vec<String> {
        if self.initial_lines.is_empty() {
            vec![String::new()]
        } else {
            self.initial_lines.clone()
        }
    }
}

/// A running, exclusively owned editing engine instance.
#[async_trait]
pub trait EditorEngine: Send {
    /// Queues keystrokes (in `<...>` notation) for the engine.
    ///
    /// Returns once the engine has accepted them, not once it has finished
    /// processing them.
    async fn feed_keys(&mut self, keys: &str) -> Result<(), EngineError>;

    /// Reads mode, cursor, and buffer contents.
    ///
    /// Must reflect every keystroke fed before the call.
    async fn snapshot(&mut self) -> Result<EngineSnapshot, EngineError>;

    /// Stops the engine and releases its transport. Safe to call repeatedly.
    async fn terminate(&mut self) -> Result<(), EngineError>;
}

/// Starts isolated engine instances.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn EditorEngine>, EngineError>;
}
