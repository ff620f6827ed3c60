//! User actions on the persisted UI state
//!
//! Pure edits of `PersistableState`. Stream controls (connect, disconnect,
//! clear) are routed by the session and leave this state untouched.

use livesync_protocol::{PersistableState, UserAction};

/// What an action did to the state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub changed: bool,
    /// The change must be written to the snapshot sink.
    pub persist: bool,
}

impl Outcome {
    const UNCHANGED: Self = Self {
        changed: false,
        persist: false,
    };

    const SAVED: Self = Self {
        changed: true,
        persist: true,
    };
}

pub fn apply(state: &mut PersistableState, action: &UserAction) -> Outcome {
    match action {
        UserAction::Increment => {
            state.count = state.count.saturating_add(1);
            Outcome::SAVED
        }
        UserAction::Decrement => {
            state.count = state.count.saturating_sub(1);
            Outcome::SAVED
        }
        UserAction::ResetCount => {
            state.count = 0;
            Outcome::SAVED
        }
        UserAction::SetInput { text } => {
            if state.input_text == *text {
                return Outcome::UNCHANGED;
            }
            state.input_text = text.clone();
            Outcome {
                changed: true,
                persist: false,
            }
        }
        UserAction::AddTodo => {
            let text = state.input_text.trim();
            if text.is_empty() {
                return Outcome::UNCHANGED;
            }
            let todo = text.to_string();
            state.todos.push(todo);
            state.input_text.clear();
            Outcome::SAVED
        }
        UserAction::RemoveTodo { index } => remove_at(&mut state.todos, *index),
        UserAction::RemoveCompleted { index } => remove_at(&mut state.completed, *index),
        UserAction::CompleteTodo { index } => {
            move_between(&mut state.todos, &mut state.completed, *index)
        }
        UserAction::UncompleteTodo { index } => {
            move_between(&mut state.completed, &mut state.todos, *index)
        }
        UserAction::Connect | UserAction::Disconnect | UserAction::ClearRecords => {
            Outcome::UNCHANGED
        }
    }
}

fn remove_at(list: &mut Vec<String>, index: usize) -> Outcome {
    if index >= list.len() {
        return Outcome::UNCHANGED;
    }
    list.remove(index);
    Outcome::SAVED
}

fn move_between(from: &mut Vec<String>, to: &mut Vec<String>, index: usize) -> Outcome {
    if index >= from.len() {
        return Outcome::UNCHANGED;
    }
    let item = from.remove(index);
    to.push(item);
    Outcome::SAVED
}
