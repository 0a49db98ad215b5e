//! Document transition engine.
//!
//! Moves documents through the status graph of their circuit. Every mutating
//! call runs under the document's lock, builds a [`WorkflowChange`] and hands
//! it to [`DocumentRepository::commit`], so state, completion records and the
//! history ledger are written together or not at all.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, Actor, AvailableTransition, Capability, Circuit, CompletionWrite, Document,
    DocumentCircuitHistory, DocumentLifecycle, DocumentStatus, DocumentWorkflowStatus,
    NewHistoryEntry, Status, StatusGraph, WorkflowChange, WorkflowConfig,
};
use crate::domain::ports::{CircuitRepository, DocumentRepository};
use crate::services::document_locks::DocumentLocks;

/// Result of [`TransitionEngine::process_action`].
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub document: Document,
    pub approved: bool,
    /// Completion records written by the action's status effects.
    pub effects_applied: usize,
    /// Status the document auto-advanced to, if any.
    pub advanced_to: Option<i64>,
}

pub struct TransitionEngine<C: CircuitRepository, D: DocumentRepository> {
    circuits: Arc<C>,
    documents: Arc<D>,
    locks: DocumentLocks,
    config: WorkflowConfig,
}

impl<C: CircuitRepository, D: DocumentRepository> TransitionEngine<C, D> {
    pub fn new(circuits: Arc<C>, documents: Arc<D>, config: WorkflowConfig) -> Self {
        Self {
            circuits,
            documents,
            locks: DocumentLocks::new(),
            config,
        }
    }

    async fn load_document(&self, id: i64) -> DomainResult<Document> {
        self.documents
            .get_document(id)
            .await?
            .ok_or(DomainError::DocumentNotFound(id))
    }

    async fn load_circuit(&self, id: i64) -> DomainResult<Circuit> {
        self.circuits
            .get_circuit(id)
            .await?
            .ok_or(DomainError::CircuitNotFound(id))
    }

    async fn load_graph(&self, circuit_id: i64) -> DomainResult<StatusGraph> {
        let statuses = self.circuits.list_statuses(circuit_id).await?;
        let steps = self.circuits.list_steps(circuit_id).await?;
        Ok(StatusGraph::new(statuses, steps))
    }

    /// Target status, which must exist and belong to `circuit_id`.
    async fn status_in_circuit(&self, status_id: i64, circuit_id: i64) -> DomainResult<Status> {
        let status = self
            .circuits
            .get_status(status_id)
            .await?
            .ok_or(DomainError::StatusNotFound(status_id))?;
        if status.circuit_id != circuit_id {
            return Err(DomainError::invalid(format!(
                "Status {status_id} does not belong to circuit {circuit_id}"
            )));
        }
        Ok(status)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Register a document so it can be assigned to a circuit.
    pub async fn create_document(&self, actor: &Actor, title: &str) -> DomainResult<Document> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        if title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Document title cannot be empty".to_string()));
        }
        let document = self.documents.create_document(title).await?;
        info!(document_id = document.id, user_id = actor.user_id, "document created");
        Ok(document)
    }

    /// Enter an active circuit at its initial status.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn assign_document_to_circuit(
        &self,
        actor: &Actor,
        document_id: i64,
        circuit_id: i64,
    ) -> DomainResult<Document> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        let _guard = self.locks.acquire(document_id).await;

        let document = self.load_document(document_id).await?;
        let circuit = self.load_circuit(circuit_id).await?;
        if !circuit.is_active {
            return Err(DomainError::invalid(format!("Circuit {} is not active", circuit.key)));
        }

        let graph = self.load_graph(circuit_id).await?;
        let initial = graph.initial_status().cloned().ok_or_else(|| {
            DomainError::invalid(format!("Circuit {} has no initial status", circuit.key))
        })?;

        let now = Utc::now();
        let mut change = WorkflowChange::new(document);
        change.document.circuit_id = Some(circuit_id);
        change.document.enter_status(&initial, now);
        change
            .completions
            .push(CompletionWrite::Upsert(DocumentStatus::pending(document_id, initial.id)));
        change.history.push(
            NewHistoryEntry::new(actor.user_id, format!("Assigned to circuit {}", circuit.key))
                .at_step(initial.step_id.unwrap_or(0))
                .with_status(initial.id),
        );

        let document = self.documents.commit(&change).await?;
        info!(document_id, circuit_id, status_id = initial.id, "document assigned to circuit");
        Ok(document)
    }

    /// Follow a declared edge from the current status to `target_status_id`.
    #[instrument(skip(self, actor, comments), fields(user_id = actor.user_id))]
    pub async fn move_to_next_status(
        &self,
        actor: &Actor,
        document_id: i64,
        target_status_id: i64,
        comments: &str,
    ) -> DomainResult<Document> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        let _guard = self.locks.acquire(document_id).await;

        let document = self.load_document(document_id).await?;
        let (circuit_id, _) = open_position(&document)?;
        self.status_in_circuit(target_status_id, circuit_id).await?;
        let graph = self.load_graph(circuit_id).await?;

        let mut change = WorkflowChange::new(document);
        self.stage_forward_move(&mut change, &graph, target_status_id, actor.user_id, comments)
            .await?;

        let document = self.documents.commit(&change).await?;
        info!(
            document_id,
            status_id = target_status_id,
            completed = document.is_circuit_completed,
            "document moved forward"
        );
        Ok(document)
    }

    /// Go back along a reverse edge, or jump to a flexible status.
    #[instrument(skip(self, actor, comments), fields(user_id = actor.user_id))]
    pub async fn return_to_previous_status(
        &self,
        actor: &Actor,
        document_id: i64,
        target_status_id: i64,
        comments: &str,
    ) -> DomainResult<Document> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        let _guard = self.locks.acquire(document_id).await;

        let document = self.load_document(document_id).await?;
        let (circuit_id, current) = assigned_position(&document)?;
        let target = self.status_in_circuit(target_status_id, circuit_id).await?;
        if target.id == current {
            return Err(DomainError::invalid(format!(
                "Document {document_id} is already at status {}",
                target.key
            )));
        }

        let graph = self.load_graph(circuit_id).await?;
        if !graph.can_return(current, target.id) {
            return Err(DomainError::invalid(format!(
                "No way back from status {current} to {}",
                target.key
            )));
        }
        let via = graph.forward_edge(target.id, current).map_or(0, |s| s.id);

        let mut change = WorkflowChange::new(document);
        change.document.enter_status(&target, Utc::now());
        change.completions.push(CompletionWrite::EnsureExists(target.id));
        change.history.push(
            NewHistoryEntry::new(actor.user_id, comments)
                .at_step(via)
                .with_status(target.id),
        );

        let document = self.documents.commit(&change).await?;
        info!(document_id, status_id = target.id, "document returned");
        Ok(document)
    }

    /// Mark a status of the document's circuit complete or incomplete.
    #[instrument(skip(self, actor, comments), fields(user_id = actor.user_id))]
    pub async fn complete_document_status(
        &self,
        actor: &Actor,
        document_id: i64,
        status_id: i64,
        is_complete: bool,
        comments: &str,
    ) -> DomainResult<Document> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        let _guard = self.locks.acquire(document_id).await;

        let document = self.load_document(document_id).await?;
        let (circuit_id, _) = open_position(&document)?;
        let status = self.status_in_circuit(status_id, circuit_id).await?;

        let now = Utc::now();
        let mut change = WorkflowChange::new(document);
        change.document.updated_at = now;
        change.completions.push(CompletionWrite::Upsert(DocumentStatus::marked(
            document_id,
            status.id,
            is_complete,
            actor.user_id,
            now,
        )));
        change.history.push(
            NewHistoryEntry::new(actor.user_id, comments)
                .at_step(status.step_id.unwrap_or(0))
                .with_status(status.id)
                .approved(is_complete),
        );

        let document = self.documents.commit(&change).await?;
        info!(document_id, status_id, is_complete, "status completion recorded");
        Ok(document)
    }

    /// Record an action event. Rejection marks the document rejected.
    /// Approval applies the action's status effects and, for auto-advancing
    /// actions bound to a step leaving the current status, follows that edge.
    #[instrument(skip(self, actor, comments), fields(user_id = actor.user_id))]
    pub async fn process_action(
        &self,
        actor: &Actor,
        document_id: i64,
        action_id: i64,
        comments: &str,
        is_approved: bool,
    ) -> DomainResult<ActionOutcome> {
        actor.authorize(Capability::PerformAction)?;
        let _guard = self.locks.acquire(document_id).await;

        let document = self.load_document(document_id).await?;
        let (circuit_id, current) = open_position(&document)?;
        let action = self.load_action(action_id, circuit_id).await?;

        let matching: Vec<_> = self
            .circuits
            .list_steps_for_action(action_id)
            .await?
            .into_iter()
            .filter(|s| s.current_status_id == Some(current))
            .collect();

        let now = Utc::now();
        let mut change = WorkflowChange::new(document);
        change.history.push(
            NewHistoryEntry::new(actor.user_id, comments)
                .at_step(matching.first().map_or(0, |s| s.id))
                .with_action(action.id)
                .with_status(current)
                .approved(is_approved),
        );

        if !is_approved {
            change.document.status = DocumentLifecycle::Rejected;
            change.document.updated_at = now;
            let document = self.documents.commit(&change).await?;
            warn!(document_id, action_id, "action rejected document");
            return Ok(ActionOutcome {
                document,
                approved: false,
                effects_applied: 0,
                advanced_to: None,
            });
        }

        for step in &matching {
            if let Some(role) = step.responsible_role {
                if !actor.holds_role(role) {
                    return Err(DomainError::Unauthorized(format!(
                        "Step {} is owned by role {role}",
                        step.key
                    )));
                }
            }
        }

        let effects: Vec<_> = self
            .circuits
            .list_status_effects(action_id)
            .await?
            .into_iter()
            .filter(|e| matching.iter().any(|s| s.id == e.step_id))
            .collect();
        for effect in &effects {
            change.completions.push(CompletionWrite::Upsert(DocumentStatus::marked(
                document_id,
                effect.status_id,
                effect.sets_complete,
                actor.user_id,
                now,
            )));
        }
        change.document.updated_at = now;

        let target = if action.auto_advance {
            matching.iter().find_map(|s| s.next_status_id)
        } else {
            None
        };
        if let Some(target) = target {
            let graph = self.load_graph(circuit_id).await?;
            let comment = self.config.auto_advance_comment.clone();
            self.stage_forward_move(&mut change, &graph, target, actor.user_id, &comment)
                .await?;
        }

        let document = self.documents.commit(&change).await?;
        info!(
            document_id,
            action_id,
            effects = effects.len(),
            advanced_to = ?target,
            "action processed"
        );
        Ok(ActionOutcome {
            document,
            approved: true,
            effects_applied: effects.len(),
            advanced_to: target,
        })
    }

    /// Remove a document with its completion records and history.
    /// Returns `false` when it did not exist.
    pub async fn delete_document(&self, actor: &Actor, document_id: i64) -> DomainResult<bool> {
        actor.authorize(Capability::ExecuteWorkflow)?;
        let _guard = self.locks.acquire(document_id).await;
        let deleted = self.documents.delete_document(document_id).await?;
        if deleted {
            info!(document_id, user_id = actor.user_id, "document deleted");
        } else {
            debug!(document_id, "delete of unknown document ignored");
        }
        Ok(deleted)
    }

    async fn load_action(&self, action_id: i64, circuit_id: i64) -> DomainResult<Action> {
        let action = self
            .circuits
            .get_action(action_id)
            .await?
            .ok_or(DomainError::ActionNotFound(action_id))?;
        if action.circuit_id != circuit_id {
            return Err(DomainError::invalid(format!(
                "Action {} does not belong to circuit {circuit_id}",
                action.key
            )));
        }
        Ok(action)
    }

    /// Add a forward move along a declared edge to `change`.
    async fn stage_forward_move(
        &self,
        change: &mut WorkflowChange,
        graph: &StatusGraph,
        target_id: i64,
        user_id: i64,
        comments: &str,
    ) -> DomainResult<()> {
        let (_, current) = open_position(&change.document)?;
        let edge = graph.forward_edge(current, target_id).ok_or_else(|| {
            DomainError::invalid(format!(
                "No step leads from status {current} to status {target_id}"
            ))
        })?;
        let target = graph
            .status(target_id)
            .ok_or(DomainError::StatusNotFound(target_id))?;

        if self.config.enforce_required_statuses {
            self.ensure_required_complete(change, graph, current).await?;
        }

        change.document.enter_status(target, Utc::now());
        change.completions.push(CompletionWrite::EnsureExists(target.id));
        change.history.push(
            NewHistoryEntry::new(user_id, comments)
                .at_step(edge.id)
                .with_status(target.id),
        );
        Ok(())
    }

    /// A required status cannot be left until its completion record is set.
    /// Records staged in `change` take precedence over stored ones.
    async fn ensure_required_complete(
        &self,
        change: &WorkflowChange,
        graph: &StatusGraph,
        current: i64,
    ) -> DomainResult<()> {
        let Some(status) = graph.status(current).filter(|s| s.is_required) else {
            return Ok(());
        };

        let staged = change.completions.iter().rev().find_map(|w| match w {
            CompletionWrite::Upsert(r) if r.status_id == current => Some(r.is_complete),
            _ => None,
        });
        let complete = match staged {
            Some(complete) => complete,
            None => self
                .documents
                .get_document_status(change.document.id, current)
                .await?
                .is_some_and(|r| r.is_complete),
        };

        if !complete {
            return Err(DomainError::invalid(format!(
                "Required status {} must be completed first",
                status.key
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Statuses reachable from the document's current position.
    pub async fn get_available_transitions(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> DomainResult<Vec<AvailableTransition>> {
        actor.authorize(Capability::ViewWorkflow)?;
        let document = self.load_document(document_id).await?;
        self.transitions_for(&document).await
    }

    async fn transitions_for(&self, document: &Document) -> DomainResult<Vec<AvailableTransition>> {
        let Ok((circuit_id, current)) = open_position(document) else {
            return Ok(Vec::new());
        };
        Ok(self.load_graph(circuit_id).await?.available_from(current))
    }

    pub async fn can_move_to_status(
        &self,
        actor: &Actor,
        document_id: i64,
        target_status_id: i64,
    ) -> DomainResult<bool> {
        actor.authorize(Capability::ViewWorkflow)?;
        let document = self.load_document(document_id).await?;
        let Ok((circuit_id, current)) = open_position(&document) else {
            return Ok(false);
        };
        Ok(self.load_graph(circuit_id).await?.can_move(current, target_status_id))
    }

    pub async fn get_workflow_status(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> DomainResult<DocumentWorkflowStatus> {
        actor.authorize(Capability::ViewWorkflow)?;
        let document = self.load_document(document_id).await?;

        let circuit = match document.circuit_id {
            Some(id) => self.circuits.get_circuit(id).await?,
            None => None,
        };
        let current_status = match document.current_status_id {
            Some(id) => self.circuits.get_status(id).await?,
            None => None,
        };
        let completions = self.documents.list_document_statuses(document_id).await?;
        let available_transitions = self.transitions_for(&document).await?;

        Ok(DocumentWorkflowStatus {
            circuit_key: circuit.as_ref().map(|c| c.key.clone()),
            circuit_title: circuit.map(|c| c.title),
            document,
            current_status,
            completions,
            available_transitions,
        })
    }

    /// History ledger of a document in append order.
    pub async fn get_history(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> DomainResult<Vec<DocumentCircuitHistory>> {
        actor.authorize(Capability::ViewWorkflow)?;
        self.load_document(document_id).await?;
        self.documents.list_history(document_id).await
    }
}

/// `(circuit, current status)` of a document that has been assigned.
fn assigned_position(document: &Document) -> DomainResult<(i64, i64)> {
    match (document.circuit_id, document.current_status_id) {
        (Some(circuit), Some(status)) => Ok((circuit, status)),
        _ => Err(DomainError::invalid(format!(
            "Document {} is not assigned to a circuit",
            document.id
        ))),
    }
}

/// Like [`assigned_position`], but the workflow must also be unfinished.
fn open_position(document: &Document) -> DomainResult<(i64, i64)> {
    let position = assigned_position(document)?;
    if document.is_circuit_completed {
        return Err(DomainError::invalid(format!(
            "Document {} has already completed its circuit",
            document.id
        )));
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteCircuitRepository, SqliteDocumentRepository,
    };
    use crate::domain::models::{NewAction, NewCircuit, NewStatus, NewStep, Role};
    use crate::services::CircuitCatalog;

    type Engine = TransitionEngine<SqliteCircuitRepository, SqliteDocumentRepository>;

    struct Fixture {
        catalog: CircuitCatalog<SqliteCircuitRepository>,
        engine: Engine,
        circuit_id: i64,
        draft: i64,
        review: i64,
        approved: i64,
    }

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    /// Draft(initial) -> Review -> Approved(final), active.
    async fn invoice_fixture(review_required: bool) -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let circuits = Arc::new(SqliteCircuitRepository::new(pool.clone()));
        let documents = Arc::new(SqliteDocumentRepository::new(pool));
        let catalog = CircuitCatalog::new(circuits.clone(), WorkflowConfig::default());
        let engine = TransitionEngine::new(circuits, documents, WorkflowConfig::default());

        let circuit = catalog
            .create_circuit(&admin(), NewCircuit::new("Invoice Approval"))
            .await
            .unwrap();
        let draft = catalog
            .create_status(&admin(), NewStatus::new(circuit.id, "DRAFT", "Draft").initial())
            .await
            .unwrap();
        let mut review = NewStatus::new(circuit.id, "REVIEW", "Review");
        if review_required {
            review = review.required();
        }
        let review = catalog.create_status(&admin(), review).await.unwrap();
        let approved = catalog
            .create_status(&admin(), NewStatus::new(circuit.id, "APPROVED", "Approved").final_status())
            .await
            .unwrap();
        catalog
            .create_step(&admin(), NewStep::new(circuit.id, "Submit").with_edge(draft.id, review.id))
            .await
            .unwrap();
        catalog
            .create_step(&admin(), NewStep::new(circuit.id, "Approve").with_edge(review.id, approved.id))
            .await
            .unwrap();
        catalog.activate_circuit(&admin(), circuit.id).await.unwrap();

        Fixture {
            catalog,
            engine,
            circuit_id: circuit.id,
            draft: draft.id,
            review: review.id,
            approved: approved.id,
        }
    }

    async fn assigned(f: &Fixture) -> Document {
        let doc = f.engine.create_document(&admin(), "INV-1").await.unwrap();
        f.engine
            .assign_document_to_circuit(&admin(), doc.id, f.circuit_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_assign_enters_initial_status() {
        let f = invoice_fixture(false).await;
        let doc = assigned(&f).await;

        assert_eq!(doc.current_status_id, Some(f.draft));
        assert_eq!(doc.status, DocumentLifecycle::InProgress);
        assert!(!doc.is_circuit_completed);

        let status = f.engine.get_workflow_status(&admin(), doc.id).await.unwrap();
        assert_eq!(status.circuit_key.as_deref(), Some("CR0001"));
        assert_eq!(status.completions.len(), 1);
        assert!(!status.completions[0].is_complete);
    }

    #[tokio::test]
    async fn test_assign_to_inactive_circuit_fails() {
        let f = invoice_fixture(false).await;
        f.catalog.deactivate_circuit(&admin(), f.circuit_id).await.unwrap();
        let doc = f.engine.create_document(&admin(), "INV-2").await.unwrap();

        let result = f.engine.assign_document_to_circuit(&admin(), doc.id, f.circuit_id).await;
        assert!(matches!(result, Err(DomainError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_move_without_edge_leaves_document_unchanged() {
        let f = invoice_fixture(false).await;
        let doc = assigned(&f).await;

        let result = f.engine.move_to_next_status(&admin(), doc.id, f.approved, "skip").await;
        assert!(matches!(result, Err(DomainError::InvalidOperation(_))));

        let reread = f.engine.get_workflow_status(&admin(), doc.id).await.unwrap().document;
        assert_eq!(reread.current_status_id, Some(f.draft));
        assert_eq!(reread.version, doc.version);
        assert_eq!(f.engine.get_history(&admin(), doc.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_required_status_blocks_forward_move() {
        let f = invoice_fixture(true).await;
        let doc = assigned(&f).await;
        f.engine.move_to_next_status(&admin(), doc.id, f.review, "").await.unwrap();

        let blocked = f.engine.move_to_next_status(&admin(), doc.id, f.approved, "").await;
        assert!(matches!(blocked, Err(DomainError::InvalidOperation(_))));

        f.engine
            .complete_document_status(&admin(), doc.id, f.review, true, "checked")
            .await
            .unwrap();
        let done = f.engine.move_to_next_status(&admin(), doc.id, f.approved, "").await.unwrap();
        assert!(done.is_circuit_completed);
    }

    #[tokio::test]
    async fn test_rejection_keeps_status() {
        let f = invoice_fixture(false).await;
        let doc = assigned(&f).await;
        let action = f
            .catalog
            .create_action(&admin(), NewAction::new(f.circuit_id, "REJECT", "Reject"))
            .await
            .unwrap();

        let outcome = f
            .engine
            .process_action(&admin(), doc.id, action.id, "wrong amount", false)
            .await
            .unwrap();
        assert!(!outcome.approved);
        assert_eq!(outcome.document.status, DocumentLifecycle::Rejected);
        assert_eq!(outcome.document.current_status_id, Some(f.draft));
    }

    #[tokio::test]
    async fn test_simple_user_cannot_move() {
        let f = invoice_fixture(false).await;
        let doc = assigned(&f).await;
        let result = f
            .engine
            .move_to_next_status(&Actor::new(5, Role::SimpleUser), doc.id, f.review, "")
            .await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_transitions_empty_when_unassigned() {
        let f = invoice_fixture(false).await;
        let doc = f.engine.create_document(&admin(), "loose").await.unwrap();
        assert!(f.engine.get_available_transitions(&admin(), doc.id).await.unwrap().is_empty());
        assert!(!f.engine.can_move_to_status(&admin(), doc.id, f.draft).await.unwrap());
    }
}
