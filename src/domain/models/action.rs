//! Actions and their step bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named operation (e.g. "Approve") that can be performed on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub circuit_id: i64,
    pub key: String,
    pub title: String,
    pub description: String,
    /// Move the document along a matching step edge once the action is approved.
    pub auto_advance: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAction {
    pub circuit_id: i64,
    pub key: String,
    pub title: String,
    pub description: String,
    pub auto_advance: bool,
}

impl NewAction {
    pub fn new(circuit_id: i64, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            circuit_id,
            key: key.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn auto_advancing(mut self) -> Self {
        self.auto_advance = true;
        self
    }
}

/// Binding of an action to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAction {
    pub step_id: i64,
    pub action_id: i64,
}

/// Performing `action_id` on `step_id` sets the completion flag of `status_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatusEffect {
    pub id: i64,
    pub action_id: i64,
    pub step_id: i64,
    pub status_id: i64,
    pub sets_complete: bool,
}
