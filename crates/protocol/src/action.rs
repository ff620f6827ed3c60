//! User-initiated actions

use serde::{Deserialize, Serialize};

/// Actions a view can dispatch into a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserAction {
    // Counter
    Increment,
    Decrement,
    ResetCount,

    // Todos
    SetInput { text: String },
    AddTodo,
    RemoveTodo { index: usize },
    RemoveCompleted { index: usize },
    CompleteTodo { index: usize },
    UncompleteTodo { index: usize },

    // Stream controls
    Connect,
    Disconnect,
    ClearRecords,
}

impl UserAction {
    /// Whether the action targets the live stream rather than persisted state.
    pub fn is_stream_control(&self) -> bool {
        matches!(
            self,
            UserAction::Connect | UserAction::Disconnect | UserAction::ClearRecords
        )
    }
}
