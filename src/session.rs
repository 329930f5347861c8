//! Keystroke-driven editing session over one engine instance.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::{Cursor, EditorEngine, EngineLauncher, EngineSnapshot, LaunchOptions, Mode};
use crate::error::EngineError;

/// Content, cursor, and mode read in a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub content: Vec<String>,
    pub cursor: Cursor,
    pub mode: Mode,
}

impl From<EngineSnapshot> for SessionState {
    fn from(snapshot: EngineSnapshot) -> Self {
        Self {
            mode: Mode::from_code(&snapshot.mode),
            cursor: snapshot.cursor,
            content: snapshot.lines,
        }
    }
}

/// An exclusively owned editing engine instance.
///
/// Keystrokes are queued with [`inject`](Self::inject) and applied by the
/// engine in the background; every query waits for previously injected keys
/// to be processed first.
///
/// Call [`close`](Self::close) when done. A session dropped without closing
/// still kills its engine, but skips the orderly shutdown.
pub struct EditingSession {
    id: Uuid,
    engine: Option<Box<dyn EditorEngine>>,
}

impl EditingSession {
    /// Opens a session seeded with `initial_lines`, or a single empty line.
    pub async fn open(
        launcher: &dyn EngineLauncher,
        initial_lines: Option<Vec<String>>,
    ) -> Result<Self, EngineError> {
        let options = LaunchOptions::new(initial_lines.unwrap_or_default());
        Self::open_with(launcher, &options).await
    }

    /// Opens a session with explicit launch options.
    pub async fn open_with(
        launcher: &dyn EngineLauncher,
        options: &LaunchOptions,
    ) -> Result<Self, EngineError> {
        let id = Uuid::new_v4();
        let engine = launcher.launch(options).await?;
        debug!(session = %id, lines = options.initial_lines.len(), "Editing session opened");
        Ok(Self {
            id,
            engine: Some(engine),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    fn engine(&mut self) -> Result<&mut Box<dyn EditorEngine>, EngineError> {
        self.engine.as_mut().ok_or(EngineError::InactiveSession)
    }

    /// Queues `keystrokes` for the engine without waiting for them to run.
    ///
    /// Fails only if the transport is broken; keys that make no sense in the
    /// current mode simply produce whatever state they produce.
    pub async fn inject(&mut self, keystrokes: &str) -> Result<(), EngineError> {
        let id = self.id;
        let result = self.engine()?.feed_keys(keystrokes).await;
        if let Err(e) = &result {
            warn!(session = %id, error = %e, "Keystroke injection failed");
        }
        result
    }

    /// Reads content, cursor, and mode together.
    pub async fn state(&mut self) -> Result<SessionState, EngineError> {
        let snapshot = self.engine()?.snapshot().await?;
        Ok(snapshot.into())
    }

    pub async fn mode(&mut self) -> Result<Mode, EngineError> {
        Ok(self.state().await?.mode)
    }

    pub async fn cursor(&mut self) -> Result<Cursor, EngineError> {
        Ok(self.state().await?.cursor)
    }

    pub async fn content(&mut self) -> Result<Vec<String>, EngineError> {
        Ok(self.state().await?.content)
    }

    /// Returns line `n` (1-indexed).
    pub async fn line(&mut self, n: usize) -> Result<String, EngineError> {
        let mut content = self.content().await?;
        let line_count = content.len();
        if n == 0 || n > line_count {
            return Err(EngineError::LineOutOfRange {
                line: n,
                line_count,
            });
        }
        Ok(content.swap_remove(n - 1))
    }

    /// Terminates the engine. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<(), EngineError> {
        if let Some(mut engine) = self.engine.take() {
            engine.terminate().await?;
            debug!(session = %self.id, "Editing session closed");
        }
        Ok(())
    }
}

impl Drop for EditingSession {
    fn drop(&mut self) {
        if self.engine.is_some() {
            debug!(session = %self.id, "Editing session dropped while open");
        }
    }
}
