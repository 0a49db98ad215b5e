//! Circuit catalog service: circuits, statuses, steps and actions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, ActionStatusEffect, Actor, Capability, Circuit, CircuitStructureReport, CircuitUpdate,
    NewAction, NewCircuit, NewStatus, NewStep, Status, StatusUpdate, Step, StepChain, StepUpdate,
    WorkflowConfig,
};
use crate::domain::ports::CircuitRepository;
use crate::services::step_linker::StepLinker;

pub struct CircuitCatalog<C: CircuitRepository> {
    repository: Arc<C>,
    linker: StepLinker<C>,
    config: WorkflowConfig,
}

impl<C: CircuitRepository> CircuitCatalog<C> {
    pub fn new(repository: Arc<C>, config: WorkflowConfig) -> Self {
        Self {
            linker: StepLinker::new(repository.clone()),
            repository,
            config,
        }
    }

    pub fn linker(&self) -> &StepLinker<C> {
        &self.linker
    }

    async fn load_circuit(&self, id: i64) -> DomainResult<Circuit> {
        self.repository
            .get_circuit(id)
            .await?
            .ok_or(DomainError::CircuitNotFound(id))
    }

    async fn load_step(&self, id: i64) -> DomainResult<Step> {
        self.repository
            .get_step(id)
            .await?
            .ok_or(DomainError::StepNotFound(id))
    }

    async fn load_status(&self, id: i64) -> DomainResult<Status> {
        self.repository
            .get_status(id)
            .await?
            .ok_or(DomainError::StatusNotFound(id))
    }

    // ========================================================================
    // Circuits
    // ========================================================================

    /// Create a circuit. Its key is drawn from the persistent counter.
    pub async fn create_circuit(&self, actor: &Actor, circuit: NewCircuit) -> DomainResult<Circuit> {
        actor.authorize(Capability::ManageCatalog)?;
        if circuit.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Circuit title cannot be empty".to_string()));
        }

        let created = self.repository.create_circuit(&circuit, &self.config).await?;
        info!(circuit_id = created.id, key = %created.key, user_id = actor.user_id, "circuit created");
        Ok(created)
    }

    pub async fn get_circuit(&self, actor: &Actor, id: i64) -> DomainResult<Circuit> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_circuit(id).await
    }

    pub async fn list_circuits(&self, actor: &Actor) -> DomainResult<Vec<Circuit>> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.repository.list_circuits().await
    }

    pub async fn update_circuit(&self, actor: &Actor, id: i64, update: CircuitUpdate) -> DomainResult<Circuit> {
        actor.authorize(Capability::ManageCatalog)?;
        let mut circuit = self.load_circuit(id).await?;

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(DomainError::ValidationFailed("Circuit title cannot be empty".to_string()));
            }
            circuit.title = title;
        }
        if let Some(description) = update.description {
            circuit.description = description;
        }
        if let Some(allow) = update.allow_backtrack {
            circuit.allow_backtrack = allow;
        }
        let became_ordered = update.has_ordered_flow == Some(true) && !circuit.has_ordered_flow;
        let left_ordered = update.has_ordered_flow == Some(false) && circuit.has_ordered_flow;
        if let Some(ordered) = update.has_ordered_flow {
            circuit.has_ordered_flow = ordered;
        }
        circuit.updated_at = Utc::now();

        self.repository.update_circuit(&circuit).await?;
        if became_ordered {
            self.linker.relink(circuit.id).await?;
        } else if left_ordered {
            self.linker.unlink(circuit.id).await?;
        }
        Ok(circuit)
    }

    /// Open the circuit to documents. Its steps are frozen from now on.
    pub async fn activate_circuit(&self, actor: &Actor, id: i64) -> DomainResult<Circuit> {
        self.set_active(actor, id, true).await
    }

    pub async fn deactivate_circuit(&self, actor: &Actor, id: i64) -> DomainResult<Circuit> {
        self.set_active(actor, id, false).await
    }

    async fn set_active(&self, actor: &Actor, id: i64, active: bool) -> DomainResult<Circuit> {
        actor.authorize(Capability::ManageCatalog)?;
        let mut circuit = self.load_circuit(id).await?;
        circuit.is_active = active;
        circuit.updated_at = Utc::now();
        self.repository.update_circuit(&circuit).await?;
        info!(circuit_id = id, active, "circuit activation changed");
        Ok(circuit)
    }

    /// Delete a circuit that no document references.
    pub async fn delete_circuit(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        actor.authorize(Capability::ManageCatalog)?;
        self.load_circuit(id).await?;

        let documents = self.repository.count_circuit_documents(id).await?;
        if documents > 0 {
            return Err(DomainError::invalid(format!(
                "Circuit {id} is used by {documents} document(s)"
            )));
        }

        self.repository.delete_circuit(id).await?;
        info!(circuit_id = id, "circuit deleted");
        Ok(())
    }

    /// Report per step whether it has statuses attached.
    pub async fn validate_circuit_structure(&self, actor: &Actor, circuit_id: i64) -> DomainResult<CircuitStructureReport> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_circuit(circuit_id).await?;

        let steps = self.repository.list_steps(circuit_id).await?;
        let statuses = self.repository.list_statuses(circuit_id).await?;
        Ok(CircuitStructureReport::build(circuit_id, &steps, &statuses))
    }

    /// Ordered chain of the circuit's steps.
    pub async fn step_chain(&self, actor: &Actor, circuit_id: i64) -> DomainResult<StepChain> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_circuit(circuit_id).await?;
        let steps = self.repository.list_steps(circuit_id).await?;
        Ok(StepChain::from_steps(circuit_id, &steps))
    }

    // ========================================================================
    // Statuses
    // ========================================================================

    pub async fn create_status(&self, actor: &Actor, status: NewStatus) -> DomainResult<Status> {
        actor.authorize(Capability::ManageCatalog)?;
        if status.key.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Status key cannot be empty".to_string()));
        }
        self.load_circuit(status.circuit_id).await?;
        if let Some(step_id) = status.step_id {
            self.ensure_step_in_circuit(step_id, status.circuit_id).await?;
        }
        if status.is_initial {
            self.ensure_no_other_initial(status.circuit_id, None).await?;
        }

        let created = self.repository.create_status(&status).await?;
        info!(circuit_id = created.circuit_id, status_id = created.id, key = %created.key, "status created");
        Ok(created)
    }

    pub async fn update_status(&self, actor: &Actor, id: i64, update: StatusUpdate) -> DomainResult<Status> {
        actor.authorize(Capability::ManageCatalog)?;
        let mut status = self.load_status(id).await?;
        if let Some(Some(step_id)) = update.step_id {
            self.ensure_step_in_circuit(step_id, status.circuit_id).await?;
        }
        if update.is_initial == Some(true) && !status.is_initial {
            self.ensure_no_other_initial(status.circuit_id, Some(id)).await?;
        }

        update.apply(&mut status);
        self.repository.update_status(&status).await?;
        Ok(status)
    }

    /// Delete a status no document has touched.
    pub async fn delete_status(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        actor.authorize(Capability::ManageCatalog)?;
        self.load_status(id).await?;

        let references = self.repository.count_status_references(id).await?;
        if references > 0 {
            warn!(status_id = id, references, "refusing to delete status in use");
            return Err(DomainError::invalid(format!(
                "Status {id} is in use by {references} document record(s)"
            )));
        }

        self.repository.delete_status(id).await?;
        info!(status_id = id, "status deleted");
        Ok(())
    }

    pub async fn list_statuses(&self, actor: &Actor, circuit_id: i64) -> DomainResult<Vec<Status>> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_circuit(circuit_id).await?;
        self.repository.list_statuses(circuit_id).await
    }

    async fn ensure_no_other_initial(&self, circuit_id: i64, except: Option<i64>) -> DomainResult<()> {
        let statuses = self.repository.list_statuses(circuit_id).await?;
        if let Some(existing) = statuses.iter().find(|s| s.is_initial && Some(s.id) != except) {
            return Err(DomainError::invalid(format!(
                "Circuit {circuit_id} already has initial status {}",
                existing.key
            )));
        }
        Ok(())
    }

    async fn ensure_step_in_circuit(&self, step_id: i64, circuit_id: i64) -> DomainResult<Step> {
        let step = self.load_step(step_id).await?;
        if step.circuit_id != circuit_id {
            return Err(DomainError::invalid(format!(
                "Step {step_id} belongs to circuit {}, not {circuit_id}",
                step.circuit_id
            )));
        }
        Ok(step)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Create a step; it is appended to the end of the circuit.
    pub async fn create_step(&self, actor: &Actor, step: NewStep) -> DomainResult<Step> {
        self.linker.add_step_to_circuit(actor, step).await
    }

    /// Edit a step of an inactive circuit.
    pub async fn update_step(&self, actor: &Actor, id: i64, update: StepUpdate) -> DomainResult<Step> {
        actor.authorize(Capability::ManageCatalog)?;
        let mut step = self.load_step(id).await?;
        self.ensure_editable(step.circuit_id).await?;

        update.apply(&mut step);
        for status_id in [step.current_status_id, step.next_status_id].into_iter().flatten() {
            self.linker.ensure_status_in_circuit(status_id, step.circuit_id).await?;
        }

        self.repository.update_step(&step).await?;
        Ok(step)
    }

    /// Delete a step of an inactive circuit that no document uses, then relink.
    pub async fn delete_step(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        actor.authorize(Capability::ManageCatalog)?;
        let step = self.load_step(id).await?;
        self.ensure_editable(step.circuit_id).await?;

        let references = self.repository.count_step_references(id).await?;
        if references > 0 {
            warn!(step_id = id, references, "refusing to delete step in use");
            return Err(DomainError::invalid(format!(
                "Step {id} is in use by {references} document record(s)"
            )));
        }

        self.repository.delete_step(id).await?;
        self.linker.relink(step.circuit_id).await?;
        info!(circuit_id = step.circuit_id, step_id = id, "step deleted");
        Ok(())
    }

    pub async fn list_steps(&self, actor: &Actor, circuit_id: i64) -> DomainResult<Vec<Step>> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_circuit(circuit_id).await?;
        self.repository.list_steps(circuit_id).await
    }

    async fn ensure_editable(&self, circuit_id: i64) -> DomainResult<()> {
        self.linker.editable_circuit(circuit_id).await.map(|_| ())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub async fn create_action(&self, actor: &Actor, action: NewAction) -> DomainResult<Action> {
        actor.authorize(Capability::ManageCatalog)?;
        if action.key.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Action key cannot be empty".to_string()));
        }
        self.load_circuit(action.circuit_id).await?;
        let created = self.repository.create_action(&action).await?;
        info!(circuit_id = created.circuit_id, action_id = created.id, key = %created.key, "action created");
        Ok(created)
    }

    /// Bind an action to a step of the same circuit.
    pub async fn attach_action_to_step(&self, actor: &Actor, step_id: i64, action_id: i64) -> DomainResult<()> {
        actor.authorize(Capability::ManageCatalog)?;
        let action = self.load_action(action_id).await?;
        self.ensure_step_in_circuit(step_id, action.circuit_id).await?;
        self.repository.attach_action(step_id, action_id).await
    }

    /// Declare that performing `action_id` on `step_id` sets `status_id`'s completion.
    pub async fn add_action_status_effect(
        &self,
        actor: &Actor,
        action_id: i64,
        step_id: i64,
        status_id: i64,
        sets_complete: bool,
    ) -> DomainResult<ActionStatusEffect> {
        actor.authorize(Capability::ManageCatalog)?;
        let action = self.load_action(action_id).await?;
        self.ensure_step_in_circuit(step_id, action.circuit_id).await?;
        self.linker.ensure_status_in_circuit(status_id, action.circuit_id).await?;
        self.repository
            .add_status_effect(action_id, step_id, status_id, sets_complete)
            .await
    }

    pub async fn list_actions_for_step(&self, actor: &Actor, step_id: i64) -> DomainResult<Vec<Action>> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_step(step_id).await?;
        self.repository.list_actions_for_step(step_id).await
    }

    async fn load_action(&self, id: i64) -> DomainResult<Action> {
        self.repository
            .get_action(id)
            .await?
            .ok_or(DomainError::ActionNotFound(id))
    }
}
