//! Document workflow state, completion records and the history ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::circuit::Status;

/// Coarse lifecycle code stored on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentLifecycle {
    Draft = 0,
    InProgress = 1,
    Completed = 2,
    Rejected = 3,
}

impl Default for DocumentLifecycle {
    fn default() -> Self {
        Self::Draft
    }
}

impl DocumentLifecycle {
    pub const fn code(self) -> i64 {
        self as i64
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Draft),
            1 => Some(Self::InProgress),
            2 => Some(Self::Completed),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

/// Workflow-relevant fields of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub circuit_id: Option<i64>,
    pub current_status_id: Option<i64>,
    /// Step the current status is attached to.
    pub current_step_id: Option<i64>,
    pub is_circuit_completed: bool,
    pub status: DocumentLifecycle,
    /// Row version for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Point the document at `status`, updating completion flags.
    pub fn enter_status(&mut self, status: &Status, now: DateTime<Utc>) {
        self.current_status_id = Some(status.id);
        self.current_step_id = status.step_id;
        if status.is_final {
            self.is_circuit_completed = true;
            self.status = DocumentLifecycle::Completed;
        } else {
            self.is_circuit_completed = false;
            self.status = DocumentLifecycle::InProgress;
        }
        self.updated_at = now;
    }
}

/// Per-document completion record of a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub document_id: i64,
    pub status_id: i64,
    pub is_complete: bool,
    pub completed_by_user_id: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DocumentStatus {
    pub fn pending(document_id: i64, status_id: i64) -> Self {
        Self {
            document_id,
            status_id,
            is_complete: false,
            completed_by_user_id: None,
            completed_at: None,
        }
    }

    /// Completion record; attribution is only kept when `is_complete`.
    pub fn marked(
        document_id: i64,
        status_id: i64,
        is_complete: bool,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            document_id,
            status_id,
            is_complete,
            completed_by_user_id: is_complete.then_some(user_id),
            completed_at: is_complete.then_some(now),
        }
    }
}

/// How a completion record is written when a change is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionWrite {
    /// Insert a pending record unless one already exists.
    EnsureExists(i64),
    /// Insert or overwrite the record.
    Upsert(DocumentStatus),
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCircuitHistory {
    pub id: i64,
    pub document_id: i64,
    /// 0 when the event has no associated step.
    pub step_id: i64,
    pub action_id: Option<i64>,
    pub status_id: Option<i64>,
    pub processed_by_user_id: i64,
    pub processed_at: DateTime<Utc>,
    pub comments: String,
    pub is_approved: bool,
}

/// A ledger entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub step_id: i64,
    pub action_id: Option<i64>,
    pub status_id: Option<i64>,
    pub processed_by_user_id: i64,
    pub processed_at: DateTime<Utc>,
    pub comments: String,
    pub is_approved: bool,
}

impl NewHistoryEntry {
    pub fn new(user_id: i64, comments: impl Into<String>) -> Self {
        Self {
            step_id: 0,
            action_id: None,
            status_id: None,
            processed_by_user_id: user_id,
            processed_at: Utc::now(),
            comments: comments.into(),
            is_approved: true,
        }
    }

    pub fn at_step(mut self, step_id: i64) -> Self {
        self.step_id = step_id;
        self
    }

    pub fn with_status(mut self, status_id: i64) -> Self {
        self.status_id = Some(status_id);
        self
    }

    pub fn with_action(mut self, action_id: i64) -> Self {
        self.action_id = Some(action_id);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.is_approved = approved;
        self
    }
}

/// Everything one engine operation writes, committed atomically.
#[derive(Debug, Clone)]
pub struct WorkflowChange {
    /// Document state to persist; `version` is the version it was read at.
    pub document: Document,
    pub completions: Vec<CompletionWrite>,
    pub history: Vec<NewHistoryEntry>,
}

impl WorkflowChange {
    pub fn new(document: Document) -> Self {
        Self { document, completions: Vec::new(), history: Vec::new() }
    }
}

/// A status the document may move to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableTransition {
    pub status_id: i64,
    pub status_key: String,
    pub title: String,
    /// Step declaring the edge; `None` when reachable only through flexibility.
    pub via_step_id: Option<i64>,
    pub is_flexible: bool,
    pub is_final: bool,
}

/// Read view of a document's workflow position.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWorkflowStatus {
    pub document: Document,
    pub circuit_key: Option<String>,
    pub circuit_title: Option<String>,
    pub current_status: Option<Status>,
    pub completions: Vec<DocumentStatus>,
    pub available_transitions: Vec<AvailableTransition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_codes() {
        for code in 0..4 {
            let lifecycle = DocumentLifecycle::from_code(code).unwrap();
            assert_eq!(lifecycle.code(), code);
        }
        assert_eq!(DocumentLifecycle::from_code(9), None);
    }

    #[test]
    fn test_marked_clears_attribution_when_incomplete() {
        let now = Utc::now();
        let done = DocumentStatus::marked(1, 2, true, 7, now);
        assert_eq!(done.completed_by_user_id, Some(7));
        assert_eq!(done.completed_at, Some(now));

        let undone = DocumentStatus::marked(1, 2, false, 7, now);
        assert_eq!(undone.completed_by_user_id, None);
        assert_eq!(undone.completed_at, None);
    }
}
