//! Circuit catalog models.
//!
//! A circuit is a named workflow. It owns its statuses (the states a document
//! can occupy) and its steps (ordered waypoints that may also declare one
//! forward edge `current_status_id -> next_status_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::actor::Role;

/// A named workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    pub id: i64,
    /// Generated key, `CR` followed by the zero-padded counter.
    pub key: String,
    pub title: String,
    pub description: String,
    /// Active circuits accept documents; their steps are frozen.
    pub is_active: bool,
    /// When set, step `prev`/`next` links are maintained from `order_index`.
    pub has_ordered_flow: bool,
    pub allow_backtrack: bool,
    /// Sequence number the key was generated from.
    pub counter: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a circuit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCircuit {
    pub title: String,
    pub description: String,
    pub has_ordered_flow: bool,
    pub allow_backtrack: bool,
}

impl NewCircuit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            has_ordered_flow: true,
            allow_backtrack: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ordered_flow(mut self, ordered: bool) -> Self {
        self.has_ordered_flow = ordered;
        self
    }

    pub fn with_backtrack(mut self, allow: bool) -> Self {
        self.allow_backtrack = allow;
        self
    }
}

/// Mutable circuit attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub has_ordered_flow: Option<bool>,
    pub allow_backtrack: Option<bool>,
}

/// A discrete state a document can occupy within a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub circuit_id: i64,
    /// Step (waypoint) this status is attached to, if any.
    pub step_id: Option<i64>,
    pub key: String,
    pub title: String,
    /// Must be completed before a document may leave it.
    pub is_required: bool,
    /// Template default; per-document completion lives in `DocumentStatus`.
    pub is_complete: bool,
    pub is_initial: bool,
    pub is_final: bool,
    /// Reachable from any other status of the circuit without a declared edge.
    pub is_flexible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStatus {
    pub circuit_id: i64,
    pub step_id: Option<i64>,
    pub key: String,
    pub title: String,
    pub is_required: bool,
    pub is_complete: bool,
    pub is_initial: bool,
    pub is_final: bool,
    pub is_flexible: bool,
}

impl NewStatus {
    pub fn new(circuit_id: i64, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            circuit_id,
            key: key.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn on_step(mut self, step_id: i64) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn final_status(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn flexible(mut self) -> Self {
        self.is_flexible = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

/// Mutable status attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub title: Option<String>,
    pub step_id: Option<Option<i64>>,
    pub is_required: Option<bool>,
    pub is_complete: Option<bool>,
    pub is_initial: Option<bool>,
    pub is_final: Option<bool>,
    pub is_flexible: Option<bool>,
}

impl StatusUpdate {
    pub fn apply(&self, status: &mut Status) {
        if let Some(title) = &self.title {
            status.title.clone_from(title);
        }
        if let Some(step_id) = self.step_id {
            status.step_id = step_id;
        }
        if let Some(v) = self.is_required {
            status.is_required = v;
        }
        if let Some(v) = self.is_complete {
            status.is_complete = v;
        }
        if let Some(v) = self.is_initial {
            status.is_initial = v;
        }
        if let Some(v) = self.is_final {
            status.is_final = v;
        }
        if let Some(v) = self.is_flexible {
            status.is_flexible = v;
        }
        status.updated_at = Utc::now();
    }
}

/// An ordered waypoint of a circuit, optionally declaring a forward edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub circuit_id: i64,
    /// `STP-{circuit key}-{8 random chars}`.
    pub key: String,
    pub title: String,
    pub description: String,
    /// 1-based position within the circuit.
    pub order_index: i64,
    pub prev_step_id: Option<i64>,
    pub next_step_id: Option<i64>,
    pub is_final_step: bool,
    pub current_status_id: Option<i64>,
    pub next_status_id: Option<i64>,
    pub responsible_role: Option<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Step {
    /// The forward edge this step declares, if both endpoints are set.
    pub fn edge(&self) -> Option<(i64, i64)> {
        match (self.current_status_id, self.next_status_id) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }
}

/// Input for appending a step to a circuit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStep {
    pub circuit_id: i64,
    pub title: String,
    pub description: String,
    pub current_status_id: Option<i64>,
    pub next_status_id: Option<i64>,
    pub responsible_role: Option<Role>,
}

impl NewStep {
    pub fn new(circuit_id: i64, title: impl Into<String>) -> Self {
        Self {
            circuit_id,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_edge(mut self, from: i64, to: i64) -> Self {
        self.current_status_id = Some(from);
        self.next_status_id = Some(to);
        self
    }

    pub fn with_responsible_role(mut self, role: Role) -> Self {
        self.responsible_role = Some(role);
        self
    }
}

/// Mutable step attributes. Ordering goes through the step linker instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub current_status_id: Option<Option<i64>>,
    pub next_status_id: Option<Option<i64>>,
    pub responsible_role: Option<Option<Role>>,
}

impl StepUpdate {
    pub fn apply(&self, step: &mut Step) {
        if let Some(title) = &self.title {
            step.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            step.description.clone_from(description);
        }
        if let Some(v) = self.current_status_id {
            step.current_status_id = v;
        }
        if let Some(v) = self.next_status_id {
            step.next_status_id = v;
        }
        if let Some(v) = self.responsible_role {
            step.responsible_role = v;
        }
        step.updated_at = Utc::now();
    }
}

/// One entry of a bulk reorder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOrder {
    pub step_id: i64,
    pub order_index: i64,
}

/// Per-step result of a structure check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStructure {
    pub step_id: i64,
    pub title: String,
    pub status_count: usize,
    pub has_statuses: bool,
}

/// Result of validating a circuit's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStructureReport {
    pub circuit_id: i64,
    pub steps: Vec<StepStructure>,
    /// At least one step, and every step has at least one status.
    pub is_valid: bool,
}

impl CircuitStructureReport {
    pub fn build(circuit_id: i64, steps: &[Step], statuses: &[Status]) -> Self {
        let steps: Vec<StepStructure> = steps
            .iter()
            .map(|step| {
                let status_count = statuses
                    .iter()
                    .filter(|s| s.step_id == Some(step.id))
                    .count();
                StepStructure {
                    step_id: step.id,
                    title: step.title.clone(),
                    status_count,
                    has_statuses: status_count > 0,
                }
            })
            .collect();
        let is_valid = !steps.is_empty() && steps.iter().all(|s| s.has_statuses);
        Self { circuit_id, steps, is_valid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: i64, step_id: Option<i64>) -> Status {
        Status {
            id,
            circuit_id: 1,
            step_id,
            key: format!("S{id}"),
            title: format!("Status {id}"),
            is_required: false,
            is_complete: false,
            is_initial: false,
            is_final: false,
            is_flexible: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn step(id: i64) -> Step {
        Step {
            id,
            circuit_id: 1,
            key: format!("STP-CR0001-{id:08}"),
            title: format!("Step {id}"),
            description: String::new(),
            order_index: id,
            prev_step_id: None,
            next_step_id: None,
            is_final_step: false,
            current_status_id: None,
            next_status_id: None,
            responsible_role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_structure_report_requires_steps() {
        let report = CircuitStructureReport::build(1, &[], &[]);
        assert!(!report.is_valid);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn test_structure_report_flags_empty_step() {
        let report = CircuitStructureReport::build(
            1,
            &[step(1), step(2)],
            &[status(10, Some(1)), status(11, Some(1)), status(12, None)],
        );
        assert!(!report.is_valid);
        assert_eq!(report.steps[0].status_count, 2);
        assert!(!report.steps[1].has_statuses);
    }

    #[test]
    fn test_step_edge_requires_both_ends() {
        let mut s = step(1);
        assert_eq!(s.edge(), None);
        s.current_status_id = Some(3);
        assert_eq!(s.edge(), None);
        s.next_status_id = Some(4);
        assert_eq!(s.edge(), Some((3, 4)));
    }
}
