//! Editing agent: an [`EditingSession`](crate::session::EditingSession) plus
//! append-only command and state histories.
//!
//! ```ignore
//! let mut agent = EditingAgent::open(&launcher, Some(vec!["hello".into()])).await?;
//! let result = agent.execute("A world<Esc>", "append").await?;
//! println!("{}", agent.render_state(true).await?);
//! agent.close().await?;
//! ```

mod editing_agent;
pub mod types;

pub use editing_agent::{suggested_actions, EditingAgent};
pub use types::{
    BatchCommand, BufferSummary, CommandRecord, ContextLine, ContextWindow, ExecutionResult,
    SessionSummary, StateSnapshot,
};
