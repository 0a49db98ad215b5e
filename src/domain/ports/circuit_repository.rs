//! Circuit catalog repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Action, ActionStatusEffect, Circuit, NewAction, NewCircuit, NewStatus, NewStep, Status, Step,
    StepLink, StepOrder, WorkflowConfig,
};

/// Repository interface for the circuit catalog.
#[async_trait]
pub trait CircuitRepository: Send + Sync {
    /// Create a circuit, drawing its key from the persistent circuit counter.
    async fn create_circuit(&self, circuit: &NewCircuit, keys: &WorkflowConfig) -> DomainResult<Circuit>;

    /// Get a circuit by ID.
    async fn get_circuit(&self, id: i64) -> DomainResult<Option<Circuit>>;

    /// List all circuits.
    async fn list_circuits(&self) -> DomainResult<Vec<Circuit>>;

    /// Update an existing circuit.
    async fn update_circuit(&self, circuit: &Circuit) -> DomainResult<()>;

    /// Delete a circuit and, by cascade, its steps, statuses and actions.
    async fn delete_circuit(&self, id: i64) -> DomainResult<()>;

    /// Number of documents assigned to the circuit.
    async fn count_circuit_documents(&self, circuit_id: i64) -> DomainResult<u64>;

    async fn create_status(&self, status: &NewStatus) -> DomainResult<Status>;

    async fn get_status(&self, id: i64) -> DomainResult<Option<Status>>;

    /// Statuses of a circuit ordered by ID.
    async fn list_statuses(&self, circuit_id: i64) -> DomainResult<Vec<Status>>;

    async fn update_status(&self, status: &Status) -> DomainResult<()>;

    async fn delete_status(&self, id: i64) -> DomainResult<()>;

    /// Completion records and documents pointing at the status.
    async fn count_status_references(&self, status_id: i64) -> DomainResult<u64>;

    /// Insert a step with a precomputed key and position.
    async fn create_step(&self, step: &NewStep, key: &str, order_index: i64) -> DomainResult<Step>;

    async fn get_step(&self, id: i64) -> DomainResult<Option<Step>>;

    /// Steps of a circuit ordered by `order_index`, then ID.
    async fn list_steps(&self, circuit_id: i64) -> DomainResult<Vec<Step>>;

    async fn update_step(&self, step: &Step) -> DomainResult<()>;

    /// Delete a step with its action bindings and status effects.
    async fn delete_step(&self, id: i64) -> DomainResult<()>;

    /// Documents whose current step is this one, plus completion records on
    /// statuses attached to it.
    async fn count_step_references(&self, step_id: i64) -> DomainResult<u64>;

    /// Reassign `order_index` for every listed step in one transaction.
    /// Any step not belonging to the circuit aborts the whole batch.
    async fn update_step_order(&self, circuit_id: i64, orders: &[StepOrder]) -> DomainResult<()>;

    /// Persist computed links for a circuit in one transaction, clearing
    /// every existing link first.
    async fn save_step_links(&self, circuit_id: i64, links: &[StepLink]) -> DomainResult<()>;

    async fn create_action(&self, action: &NewAction) -> DomainResult<Action>;

    async fn get_action(&self, id: i64) -> DomainResult<Option<Action>>;

    async fn attach_action(&self, step_id: i64, action_id: i64) -> DomainResult<()>;

    async fn list_actions_for_step(&self, step_id: i64) -> DomainResult<Vec<Action>>;

    /// Steps the action is bound to, ordered by `order_index`.
    async fn list_steps_for_action(&self, action_id: i64) -> DomainResult<Vec<Step>>;

    async fn add_status_effect(
        &self,
        action_id: i64,
        step_id: i64,
        status_id: i64,
        sets_complete: bool,
    ) -> DomainResult<ActionStatusEffect>;

    async fn list_status_effects(&self, action_id: i64) -> DomainResult<Vec<ActionStatusEffect>>;
}
