//! Step ordering service.
//!
//! Owns `order_index` assignment and the derived `prev`/`next`/`is_final_step`
//! links. Nothing else writes those columns.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    link_chain, Actor, Capability, Circuit, NewStep, Step, StepLink, StepOrder,
};
use crate::domain::ports::CircuitRepository;

pub struct StepLinker<C: CircuitRepository> {
    repository: Arc<C>,
}

impl<C: CircuitRepository> StepLinker<C> {
    pub fn new(repository: Arc<C>) -> Self {
        Self { repository }
    }

    async fn circuit(&self, circuit_id: i64) -> DomainResult<Circuit> {
        self.repository
            .get_circuit(circuit_id)
            .await?
            .ok_or(DomainError::CircuitNotFound(circuit_id))
    }

    /// Circuit whose steps may still change. Active circuits are frozen.
    pub(crate) async fn editable_circuit(&self, circuit_id: i64) -> DomainResult<Circuit> {
        let circuit = self.circuit(circuit_id).await?;
        if circuit.is_active {
            return Err(DomainError::invalid(format!(
                "Circuit {} is active; its steps cannot be changed",
                circuit.key
            )));
        }
        Ok(circuit)
    }

    /// Append a step at the end of its circuit.
    pub async fn add_step_to_circuit(&self, actor: &Actor, step: NewStep) -> DomainResult<Step> {
        actor.authorize(Capability::ManageCatalog)?;
        if step.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Step title cannot be empty".to_string()));
        }

        let circuit = self.editable_circuit(step.circuit_id).await?;
        for status_id in [step.current_status_id, step.next_status_id].into_iter().flatten() {
            self.ensure_status_in_circuit(status_id, circuit.id).await?;
        }

        let count = self.repository.list_steps(circuit.id).await?.len();
        let order_index = i64::try_from(count).unwrap_or(i64::MAX - 1) + 1;
        let key = step_key(&circuit.key);

        let created = self.repository.create_step(&step, &key, order_index).await?;
        info!(circuit_id = circuit.id, step_id = created.id, order_index, key = %key, "step added");

        if circuit.has_ordered_flow {
            self.relink(circuit.id).await?;
            return self
                .repository
                .get_step(created.id)
                .await?
                .ok_or(DomainError::StepNotFound(created.id));
        }
        Ok(created)
    }

    /// Reassign positions for a batch of steps, all or nothing.
    pub async fn update_step_order(
        &self,
        actor: &Actor,
        circuit_id: i64,
        orders: &[StepOrder],
    ) -> DomainResult<Vec<Step>> {
        actor.authorize(Capability::ManageCatalog)?;
        let circuit = self.editable_circuit(circuit_id).await?;

        self.repository.update_step_order(circuit_id, orders).await?;
        info!(circuit_id, steps = orders.len(), "step order updated");

        if circuit.has_ordered_flow {
            self.relink(circuit_id).await?;
        }
        self.repository.list_steps(circuit_id).await
    }

    /// Recompute and persist the chain of one circuit.
    pub async fn relink_steps(&self, actor: &Actor, circuit_id: i64) -> DomainResult<Vec<StepLink>> {
        actor.authorize(Capability::ManageCatalog)?;
        self.circuit(circuit_id).await?;
        self.relink(circuit_id).await
    }

    /// Relink every ordered-flow circuit. Returns how many were processed.
    pub async fn relink_all_circuits(&self, actor: &Actor) -> DomainResult<usize> {
        actor.authorize(Capability::ManageCatalog)?;
        let mut relinked = 0;
        for circuit in self.repository.list_circuits().await? {
            if circuit.has_ordered_flow {
                self.relink(circuit.id).await?;
                relinked += 1;
            }
        }
        info!(relinked, "relinked all ordered circuits");
        Ok(relinked)
    }

    /// Unchecked relink used after structural changes.
    pub(crate) async fn relink(&self, circuit_id: i64) -> DomainResult<Vec<StepLink>> {
        let steps = self.repository.list_steps(circuit_id).await?;
        let links = link_chain(&steps);
        self.repository.save_step_links(circuit_id, &links).await?;
        debug!(circuit_id, steps = links.len(), "steps relinked");
        Ok(links)
    }

    /// Drop every link and final flag. Unordered circuits carry no chain.
    pub(crate) async fn unlink(&self, circuit_id: i64) -> DomainResult<()> {
        self.repository.save_step_links(circuit_id, &[]).await?;
        debug!(circuit_id, "steps unlinked");
        Ok(())
    }

    pub(crate) async fn ensure_status_in_circuit(&self, status_id: i64, circuit_id: i64) -> DomainResult<()> {
        let status = self
            .repository
            .get_status(status_id)
            .await?
            .ok_or(DomainError::StatusNotFound(status_id))?;
        if status.circuit_id != circuit_id {
            return Err(DomainError::invalid(format!(
                "Status {status_id} belongs to circuit {}, not {circuit_id}",
                status.circuit_id
            )));
        }
        Ok(())
    }
}

/// `STP-{circuit key}-{8 random uppercase hex chars}`.
fn step_key(circuit_key: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("STP-{circuit_key}-{}", suffix.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteCircuitRepository};
    use crate::domain::models::{NewCircuit, Role, WorkflowConfig};

    async fn setup() -> (StepLinker<SqliteCircuitRepository>, Arc<SqliteCircuitRepository>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteCircuitRepository::new(pool));
        (StepLinker::new(repo.clone()), repo)
    }

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    #[test]
    fn test_step_key_shape() {
        let key = step_key("CR0003");
        assert!(key.starts_with("STP-CR0003-"));
        assert_eq!(key.len(), "STP-CR0003-".len() + 8);
    }

    #[tokio::test]
    async fn test_add_step_appends_and_links() {
        let (linker, repo) = setup().await;
        let circuit = repo
            .create_circuit(&NewCircuit::new("Linked"), &WorkflowConfig::default())
            .await
            .unwrap();

        let first = linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "One")).await.unwrap();
        assert_eq!(first.order_index, 1);
        assert!(first.is_final_step);

        let second = linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "Two")).await.unwrap();
        assert_eq!(second.order_index, 2);
        assert_eq!(second.prev_step_id, Some(first.id));
        assert!(second.is_final_step);

        // The previous tail lost its final flag.
        let first = repo.get_step(first.id).await.unwrap().unwrap();
        assert!(!first.is_final_step);
        assert_eq!(first.next_step_id, Some(second.id));
    }

    #[tokio::test]
    async fn test_unordered_circuit_is_not_linked() {
        let (linker, repo) = setup().await;
        let circuit = repo
            .create_circuit(&NewCircuit::new("Loose").with_ordered_flow(false), &WorkflowConfig::default())
            .await
            .unwrap();

        linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "One")).await.unwrap();
        let second = linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "Two")).await.unwrap();
        assert_eq!(second.prev_step_id, None);
        assert!(!second.is_final_step);
    }

    #[tokio::test]
    async fn test_active_circuit_rejects_new_steps() {
        let (linker, repo) = setup().await;
        let mut circuit = repo
            .create_circuit(&NewCircuit::new("Live"), &WorkflowConfig::default())
            .await
            .unwrap();
        linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "One")).await.unwrap();
        circuit.is_active = true;
        repo.update_circuit(&circuit).await.unwrap();

        let result = linker.add_step_to_circuit(&admin(), NewStep::new(circuit.id, "Two")).await;
        assert!(matches!(result, Err(DomainError::InvalidOperation(_))));
        assert_eq!(repo.list_steps(circuit.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_simple_user_cannot_add_steps() {
        let (linker, repo) = setup().await;
        let circuit = repo
            .create_circuit(&NewCircuit::new("Guarded"), &WorkflowConfig::default())
            .await
            .unwrap();

        let result = linker
            .add_step_to_circuit(&Actor::new(9, Role::SimpleUser), NewStep::new(circuit.id, "One"))
            .await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }
}
