//! Records produced by the editing agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{Cursor, Mode};
use crate::session::SessionState;

/// One `execute` call, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub keystrokes: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl CommandRecord {
    pub fn new(keystrokes: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            keystrokes: keystrokes.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// The description, or the keystrokes when no description was given.
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.keystrokes
        } else {
            &self.description
        }
    }
}

/// Session state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub content: Vec<String>,
    pub cursor: Cursor,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    /// Set when the engine could not be queried and this repeats the last
    /// known state.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl StateSnapshot {
    pub fn capture(state: SessionState) -> Self {
        Self {
            content: state.content,
            cursor: state.cursor,
            mode: state.mode,
            timestamp: Utc::now(),
            stale: false,
        }
    }

    /// A re-stamped copy marked stale.
    pub fn restamp_stale(&self) -> Self {
        Self {
            timestamp: Utc::now(),
            stale: true,
            ..self.clone()
        }
    }

    pub fn line_count(&self) -> usize {
        self.content.len()
    }

    /// Text of the cursor line, or empty if the cursor is off the buffer.
    pub fn current_line(&self) -> &str {
        self.cursor
            .row
            .checked_sub(1)
            .and_then(|idx| self.content.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub command: CommandRecord,
    /// State recorded after the command; stale if the engine could not be queried.
    pub state: StateSnapshot,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A command for [`execute_batch`](super::EditingAgent::execute_batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCommand {
    pub keystrokes: String,
    #[serde(default)]
    pub description: String,
}

impl BatchCommand {
    pub fn new(keystrokes: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            keystrokes: keystrokes.into(),
            description: description.into(),
        }
    }
}

impl From<&str> for BatchCommand {
    fn from(keystrokes: &str) -> Self {
        Self::new(keystrokes, "")
    }
}

impl From<String> for BatchCommand {
    fn from(keystrokes: String) -> Self {
        Self::new(keystrokes, "")
    }
}

/// One line of a [`ContextWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    pub line_number: usize,
    pub content: String,
    pub is_cursor_line: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_column: Option<usize>,
}

/// Lines around the cursor, with inclusive 1-indexed bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub cursor: Cursor,
    pub mode: Mode,
    pub lines: Vec<ContextLine>,
    pub window_start: usize,
    pub window_end: usize,
    pub total_lines: usize,
}

impl ContextWindow {
    /// Builds the window `before`/`after` lines around the cursor, clamped to the buffer.
    pub fn around(state: &StateSnapshot, before: usize, after: usize) -> Self {
        let total_lines = state.line_count();
        let cursor_row = state.cursor.row.clamp(1, total_lines.max(1));
        let window_start = cursor_row.saturating_sub(before).max(1);
        let window_end = (cursor_row + after).min(total_lines).max(window_start);

        let lines = (window_start..=window_end)
            .map(|line_number| {
                let is_cursor_line = line_number == cursor_row;
                ContextLine {
                    line_number,
                    content: state
                        .content
                        .get(line_number - 1)
                        .cloned()
                        .unwrap_or_default(),
                    is_cursor_line,
                    cursor_column: is_cursor_line.then_some(state.cursor.col),
                }
            })
            .collect();

        Self {
            cursor: state.cursor,
            mode: state.mode.clone(),
            lines,
            window_start,
            window_end,
            total_lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSummary {
    pub line_count: usize,
    pub mode: Mode,
    pub cursor: Cursor,
    pub current_line: String,
    /// True when the buffer holds a single empty line.
    pub is_empty: bool,
    pub total_characters: usize,
}

impl From<&StateSnapshot> for BufferSummary {
    fn from(state: &StateSnapshot) -> Self {
        Self {
            line_count: state.line_count(),
            mode: state.mode.clone(),
            cursor: state.cursor,
            current_line: state.current_line().to_string(),
            is_empty: state.content.len() == 1 && state.content[0].is_empty(),
            total_characters: state.content.iter().map(|l| l.chars().count()).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_commands: usize,
    pub state_changes: usize,
    pub duration_secs: f64,
    pub current_state: StateSnapshot,
    pub command_history: Vec<CommandRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(content: &[&str], row: usize, col: usize) -> StateSnapshot {
        StateSnapshot::capture(SessionState {
            content: content.iter().map(|s| s.to_string()).collect(),
            cursor: Cursor::new(row, col),
            mode: Mode::Normal,
        })
    }

    #[test]
    fn test_command_label() {
        assert_eq!(CommandRecord::new("dd", "").label(), "dd");
        assert_eq!(
            CommandRecord::new("dd", "delete line").label(),
            "delete line"
        );
    }

    #[test]
    fn test_batch_command_from_str() {
        let command: BatchCommand = "ggdG".into();
        assert_eq!(command, BatchCommand::new("ggdG", ""));
    }

    #[test]
    fn test_context_window_clamps_at_top() {
        let state = snapshot(&["a", "b", "c", "d", "e", "f"], 2, 1);
        let window = ContextWindow::around(&state, 3, 3);
        assert_eq!(window.window_start, 1);
        assert_eq!(window.window_end, 5);
        assert_eq!(window.lines.len(), 5);
        assert_eq!(window.lines.iter().filter(|l| l.is_cursor_line).count(), 1);
        assert_eq!(window.lines[1].cursor_column, Some(1));
        assert_eq!(window.lines[0].cursor_column, None);
    }

    #[test]
    fn test_context_window_clamps_at_bottom() {
        let state = snapshot(&["a", "b", "c", "d", "e", "f"], 6, 0);
        let window = ContextWindow::around(&state, 2, 3);
        assert_eq!((window.window_start, window.window_end), (4, 6));
        assert!(window.lines.last().unwrap().is_cursor_line);
    }

    #[test]
    fn test_buffer_summary() {
        let summary = BufferSummary::from(&snapshot(&["héllo", "x"], 1, 0));
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.current_line, "héllo");
        assert_eq!(summary.total_characters, 6);
        assert!(!summary.is_empty);

        assert!(BufferSummary::from(&snapshot(&[""], 1, 0)).is_empty);
    }

    #[test]
    fn test_stale_flag_serialization() {
        let fresh = snapshot(&["a"], 1, 0);
        let json = serde_json::to_string(&fresh).unwrap();
        assert!(!json.contains("stale"));

        let stale = fresh.restamp_stale();
        assert!(stale.stale);
        assert_eq!(stale.content, fresh.content);
        let json = serde_json::to_string(&stale).unwrap();
        assert!(json.contains("\"stale\":true"));
    }
}
