use std::fmt::Write as _;

use chrono::Utc;
use tracing::{debug, warn};

use super::types::{
    BatchCommand, BufferSummary, CommandRecord, ContextWindow, ExecutionResult, SessionSummary,
    StateSnapshot,
};
use crate::engine::{EngineLauncher, Mode};
use crate::error::EngineError;
use crate::session::EditingSession;

const NORMAL_MODE_HINTS: &[&str] = &[
    "i - Enter insert mode at cursor",
    "A - Enter insert mode at end of line",
    "o - Open new line below and enter insert mode",
    "O - Open new line above and enter insert mode",
    "dd - Delete current line",
    "yy - Yank (copy) current line",
    "p - Paste below cursor",
    "gg - Go to first line",
    "G - Go to last line",
    "/text - Search for 'text'",
    ":%s/old/new/g - Replace all 'old' with 'new'",
];

const INSERT_MODE_HINTS: &[&str] = &[
    "<Esc> - Return to normal mode",
    "Type text to insert at cursor",
    "<Enter> - Create new line",
    "<BS> - Backspace",
    "<C-w> - Delete word backwards",
];

const VISUAL_MODE_HINTS: &[&str] = &[
    "d - Delete selection",
    "y - Yank (copy) selection",
    "<Esc> - Return to normal mode",
    "c - Change (delete and enter insert mode)",
];

/// Maximum number of hints shown by [`EditingAgent::render_state`].
const RENDERED_HINTS: usize = 5;

/// Static hints for `mode`. Modes other than normal, insert and visual get none.
pub fn suggested_actions(mode: &Mode) -> &'static [&'static str] {
    match mode {
        Mode::Normal => NORMAL_MODE_HINTS,
        Mode::Insert => INSERT_MODE_HINTS,
        Mode::Visual => VISUAL_MODE_HINTS,
        _ => &[],
    }
}

/// Drives one [`EditingSession`] and keeps its command and state histories.
///
/// Both histories are append-only. The state history starts with the state
/// at construction and gains exactly one entry per [`execute`](Self::execute)
/// call, so `state_history().len() == command_history().len() + 1`.
pub struct EditingAgent {
    session: EditingSession,
    commands: Vec<CommandRecord>,
    states: Vec<StateSnapshot>,
}

impl EditingAgent {
    /// Wraps an open session and records its initial state.
    pub async fn new(mut session: EditingSession) -> Result<Self, EngineError> {
        let initial = StateSnapshot::capture(session.state().await?);
        Ok(Self {
            session,
            commands: Vec::new(),
            states: vec![initial],
        })
    }

    /// Opens a fresh session and wraps it.
    pub async fn open(
        launcher: &dyn EngineLauncher,
        initial_lines: Option<Vec<String>>,
    ) -> Result<Self, EngineError> {
        let session = EditingSession::open(launcher, initial_lines).await?;
        Self::new(session).await
    }

    pub fn is_active(&self) -> bool {
        !self.session.is_closed()
    }

    fn ensure_active(&self) -> Result<(), EngineError> {
        if self.session.is_closed() {
            return Err(EngineError::InactiveSession);
        }
        Ok(())
    }

    pub fn command_history(&self) -> &[CommandRecord] {
        &self.commands
    }

    pub fn state_history(&self) -> &[StateSnapshot] {
        &self.states
    }

    /// Queries the current state without recording it.
    pub async fn current_state(&mut self) -> Result<StateSnapshot, EngineError> {
        self.ensure_active()?;
        Ok(StateSnapshot::capture(self.session.state().await?))
    }

    /// Injects `keystrokes`, then records the command and the resulting state.
    ///
    /// Transport failures produce an unsuccessful [`ExecutionResult`] rather
    /// than an error. Only a closed agent returns `Err`.
    pub async fn execute(
        &mut self,
        keystrokes: &str,
        description: &str,
    ) -> Result<ExecutionResult, EngineError> {
        self.ensure_active()?;

        let command = CommandRecord::new(keystrokes, description);
        self.commands.push(command.clone());

        let injected = self.session.inject(keystrokes).await;
        let (state, query_error) = match self.session.state().await {
            Ok(state) => (StateSnapshot::capture(state), None),
            Err(e) => {
                warn!(error = %e, "State query failed after command, recording last known state");
                (self.last_state().restamp_stale(), Some(e))
            }
        };
        self.states.push(state.clone());

        let error = injected.err().or(query_error);
        let result = match error {
            None => ExecutionResult {
                success: true,
                message: format!("Executed: {}", command.label()),
                command,
                state,
                error: None,
            },
            Some(e) => ExecutionResult {
                success: false,
                message: format!("Failed to execute: {}", command.label()),
                command,
                state,
                error: Some(e.to_string()),
            },
        };

        debug!(
            keystrokes = keystrokes,
            success = result.success,
            mode = %result.state.mode,
            "Command executed"
        );
        Ok(result)
    }

    /// Executes commands in order, stopping after the first failure.
    pub async fn execute_batch<I, C>(
        &mut self,
        commands: I,
    ) -> Result<Vec<ExecutionResult>, EngineError>
    where
        I: IntoIterator<Item = C>,
        C: Into<BatchCommand>,
    {
        self.ensure_active()?;

        let mut results = Vec::new();
        for command in commands {
            let command: BatchCommand = command.into();
            let result = self
                .execute(&command.keystrokes, &command.description)
                .await?;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        Ok(results)
    }

    fn last_state(&self) -> &StateSnapshot {
        // Seeded at construction; never empty.
        &self.states[self.states.len() - 1]
    }

    /// Lines around the cursor; see [`ContextWindow::around`].
    pub async fn context_window(
        &mut self,
        before: usize,
        after: usize,
    ) -> Result<ContextWindow, EngineError> {
        let state = self.current_state().await?;
        Ok(ContextWindow::around(&state, before, after))
    }

    /// Hints for the current mode.
    pub async fn suggested_actions(&mut self) -> Result<&'static [&'static str], EngineError> {
        let state = self.current_state().await?;
        Ok(suggested_actions(&state.mode))
    }

    pub async fn buffer_summary(&mut self) -> Result<BufferSummary, EngineError> {
        let state = self.current_state().await?;
        Ok(BufferSummary::from(&state))
    }

    pub async fn session_summary(&mut self) -> Result<SessionSummary, EngineError> {
        let current_state = self.current_state().await?;
        let started = self.states[0].timestamp;
        let duration_secs = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;

        Ok(SessionSummary {
            total_commands: self.commands.len(),
            state_changes: self.states.len(),
            duration_secs,
            current_state,
            command_history: self.commands.clone(),
        })
    }

    /// Renders the current state as text for a person or a model.
    pub async fn render_state(&mut self, include_suggestions: bool) -> Result<String, EngineError> {
        let state = self.current_state().await?;
        let summary = BufferSummary::from(&state);
        let window = ContextWindow::around(&state, 3, 3);

        let mut out = String::new();
        let _ = writeln!(out, "=== VIM EDITOR STATE ===");
        let _ = writeln!(out, "Mode: {}", summary.mode);
        let _ = writeln!(
            out,
            "Cursor: Line {}, Column {}",
            summary.cursor.row, summary.cursor.col
        );
        let _ = writeln!(out, "Total Lines: {}", summary.line_count);
        let _ = writeln!(out, "Total Characters: {}", summary.total_characters);
        let _ = writeln!(out);
        let _ = write!(out, "=== BUFFER CONTEXT ===");

        for line in &window.lines {
            let marker = if line.is_cursor_line { " ► " } else { "   " };
            let content = match line.cursor_column {
                Some(col) => with_cursor_marker(&line.content, col),
                None => line.content.clone(),
            };
            let _ = write!(out, "\n{}{:3}: {}", marker, line.line_number, content);
        }

        if include_suggestions {
            let _ = write!(out, "\n\n=== SUGGESTED ACTIONS ===");
            for hint in suggested_actions(&state.mode).iter().take(RENDERED_HINTS) {
                let _ = write!(out, "\n  • {}", hint);
            }
        }

        Ok(out)
    }

    /// Closes the underlying session. Idempotent.
    pub async fn close(&mut self) -> Result<(), EngineError> {
        self.session.close().await
    }
}

/// Inserts `│` before byte column `col`, or appends it past the end.
fn with_cursor_marker(content: &str, col: usize) -> String {
    let mut at = col.min(content.len());
    while !content.is_char_boundary(at) {
        at += 1;
    }
    format!("{}│{}", &content[..at], &content[at..])
}
