//! Integration tests for the transition engine.
//!
//! These run the engine against a migrated SQLite database and check the
//! externally visible behaviour: edge-gated moves, terminal completion,
//! flexible statuses, action processing, the history ledger and deletion.

mod common;

use circuitflow::domain::errors::DomainError;
use circuitflow::domain::models::{
    DocumentLifecycle, NewAction, NewCircuit, NewStatus, Role, StatusUpdate, StepUpdate,
};
use circuitflow::domain::ports::DocumentRepository;

use common::{admin, approver, assigned_document, clerk, harness, invoice_circuit};

// ============================================================================
// Assignment
// ============================================================================

#[tokio::test]
async fn test_assign_requires_initial_status() {
    let h = harness().await;
    let circuit = h
        .catalog
        .create_circuit(&admin(), NewCircuit::new("No entry"))
        .await
        .unwrap();
    h.catalog
        .create_status(&admin(), NewStatus::new(circuit.id, "OPEN", "Open"))
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), circuit.id).await.unwrap();

    let doc = h.engine.create_document(&admin(), "orphan").await.unwrap();
    let result = h
        .engine
        .assign_document_to_circuit(&admin(), doc.id, circuit.id)
        .await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));

    let status = h.engine.get_workflow_status(&admin(), doc.id).await.unwrap();
    assert_eq!(status.document.circuit_id, None);
    assert!(h.engine.get_history(&admin(), doc.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_assign_unknown_circuit_is_not_found() {
    let h = harness().await;
    let doc = h.engine.create_document(&admin(), "lost").await.unwrap();
    let result = h.engine.assign_document_to_circuit(&admin(), doc.id, 999).await;
    assert!(matches!(result, Err(DomainError::CircuitNotFound(999))));
}

#[tokio::test]
async fn test_assign_enters_initial_status_with_pending_record() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "INV-1").await;

    assert_eq!(doc.circuit_id, Some(inv.circuit_id));
    assert_eq!(doc.current_status_id, Some(inv.draft));
    assert_eq!(doc.status, DocumentLifecycle::InProgress);
    assert!(!doc.is_circuit_completed);

    let record = h
        .documents
        .get_document_status(doc.id, inv.draft)
        .await
        .unwrap()
        .unwrap();
    assert!(!record.is_complete);
    assert_eq!(record.completed_by_user_id, None);
}

// ============================================================================
// Invoice Approval walk-through
// ============================================================================

#[tokio::test]
async fn test_invoice_approval_scenario() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D1").await;
    assert_eq!(doc.current_status_id, Some(inv.draft));

    let doc = h
        .engine
        .move_to_next_status(&clerk(), doc.id, inv.review, "submitted")
        .await
        .unwrap();
    assert_eq!(doc.current_status_id, Some(inv.review));
    assert_eq!(h.engine.get_history(&admin(), doc.id).await.unwrap().len(), 2);

    let doc = h
        .engine
        .move_to_next_status(&clerk(), doc.id, inv.approved, "looks right")
        .await
        .unwrap();
    assert!(doc.is_circuit_completed);
    assert_eq!(doc.status, DocumentLifecycle::Completed);

    for target in [inv.draft, inv.review, inv.approved] {
        let again = h.engine.move_to_next_status(&clerk(), doc.id, target, "").await;
        assert!(
            matches!(again, Err(DomainError::InvalidOperation(_))),
            "completed document must not move to {target}"
        );
    }
    assert!(h
        .engine
        .get_available_transitions(&admin(), doc.id)
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Edge-gated forward moves
// ============================================================================

#[tokio::test]
async fn test_move_without_edge_fails_and_changes_nothing() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D2").await;

    let result = h
        .engine
        .move_to_next_status(&clerk(), doc.id, inv.approved, "shortcut")
        .await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));

    let status = h.engine.get_workflow_status(&admin(), doc.id).await.unwrap();
    assert_eq!(status.document.version, doc.version);
    assert_eq!(status.document.current_status_id, Some(inv.draft));
    assert_eq!(status.document.status, doc.status);
    assert_eq!(h.engine.get_history(&admin(), doc.id).await.unwrap().len(), 1);
    assert!(h
        .documents
        .get_document_status(doc.id, inv.approved)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_move_to_status_of_other_circuit_is_invalid() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let other = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D3").await;

    let result = h
        .engine
        .move_to_next_status(&clerk(), doc.id, other.review, "")
        .await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));

    let missing = h.engine.move_to_next_status(&clerk(), doc.id, 4242, "").await;
    assert!(matches!(missing, Err(DomainError::StatusNotFound(4242))));
}

#[tokio::test]
async fn test_unassigned_document_cannot_move() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = h.engine.create_document(&admin(), "loose").await.unwrap();

    let result = h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));
    assert!(!h.engine.can_move_to_status(&admin(), doc.id, inv.review).await.unwrap());
}

#[tokio::test]
async fn test_required_status_must_be_completed_before_leaving() {
    let h = harness().await;
    let inv = invoice_circuit(&h, false).await;
    h.catalog
        .update_status(
            &admin(),
            inv.review,
            StatusUpdate { is_required: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), inv.circuit_id).await.unwrap();

    let doc = assigned_document(&h, inv.circuit_id, "D4").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    let blocked = h.engine.move_to_next_status(&clerk(), doc.id, inv.approved, "").await;
    assert!(matches!(blocked, Err(DomainError::InvalidOperation(_))));

    h.engine
        .complete_document_status(&clerk(), doc.id, inv.review, true, "checked totals")
        .await
        .unwrap();
    let record = h
        .documents
        .get_document_status(doc.id, inv.review)
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_complete);
    assert_eq!(record.completed_by_user_id, Some(clerk().user_id));
    assert!(record.completed_at.is_some());

    let doc = h
        .engine
        .move_to_next_status(&clerk(), doc.id, inv.approved, "")
        .await
        .unwrap();
    assert!(doc.is_circuit_completed);
}

#[tokio::test]
async fn test_required_gate_can_be_disabled() {
    let config = circuitflow::domain::models::WorkflowConfig {
        enforce_required_statuses: false,
        ..Default::default()
    };
    let h = common::harness_with(config).await;
    let inv = invoice_circuit(&h, false).await;
    h.catalog
        .update_status(
            &admin(),
            inv.draft,
            StatusUpdate { is_required: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), inv.circuit_id).await.unwrap();

    let doc = assigned_document(&h, inv.circuit_id, "D5").await;
    let doc = h
        .engine
        .move_to_next_status(&clerk(), doc.id, inv.review, "")
        .await
        .unwrap();
    assert_eq!(doc.current_status_id, Some(inv.review));
}

// ============================================================================
// Returning and flexible statuses
// ============================================================================

#[tokio::test]
async fn test_return_reopens_completed_document() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D6").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();
    h.engine.move_to_next_status(&clerk(), doc.id, inv.approved, "").await.unwrap();

    let doc = h
        .engine
        .return_to_previous_status(&clerk(), doc.id, inv.review, "amount was wrong")
        .await
        .unwrap();
    assert_eq!(doc.current_status_id, Some(inv.review));
    assert!(!doc.is_circuit_completed);
    assert_eq!(doc.status, DocumentLifecycle::InProgress);

    let history = h.engine.get_history(&admin(), doc.id).await.unwrap();
    assert_eq!(history.last().map(|e| e.step_id), Some(inv.approve_step));
}

#[tokio::test]
async fn test_return_without_reverse_edge_fails() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D7").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    // Approved -> Review is not declared, so Review cannot "return" to Approved.
    let result = h
        .engine
        .return_to_previous_status(&clerk(), doc.id, inv.approved, "")
        .await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_flexible_status_is_reachable_without_edge() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let hold = h
        .catalog
        .create_status(
            &admin(),
            NewStatus::new(inv.circuit_id, "ON_HOLD", "On hold").flexible(),
        )
        .await
        .unwrap();
    let doc = assigned_document(&h, inv.circuit_id, "D8").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    let transitions = h.engine.get_available_transitions(&admin(), doc.id).await.unwrap();
    let ids: Vec<i64> = transitions.iter().map(|t| t.status_id).collect();
    assert_eq!(ids, vec![inv.approved, hold.id]);
    assert_eq!(transitions[0].via_step_id, Some(inv.approve_step));
    assert!(transitions[1].is_flexible);

    assert!(h.engine.can_move_to_status(&admin(), doc.id, hold.id).await.unwrap());
    assert!(!h.engine.can_move_to_status(&admin(), doc.id, inv.draft).await.unwrap());

    let doc = h
        .engine
        .return_to_previous_status(&clerk(), doc.id, hold.id, "waiting on vendor")
        .await
        .unwrap();
    assert_eq!(doc.current_status_id, Some(hold.id));
    assert!(h
        .documents
        .get_document_status(doc.id, hold.id)
        .await
        .unwrap()
        .is_some());
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn test_approved_action_applies_effects_and_auto_advances() {
    let h = harness().await;
    let inv = invoice_circuit(&h, false).await;
    h.catalog
        .update_status(
            &admin(),
            inv.review,
            StatusUpdate { is_required: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
    let approve = h
        .catalog
        .create_action(
            &admin(),
            NewAction::new(inv.circuit_id, "APPROVE", "Approve").auto_advancing(),
        )
        .await
        .unwrap();
    h.catalog
        .attach_action_to_step(&admin(), inv.approve_step, approve.id)
        .await
        .unwrap();
    h.catalog
        .add_action_status_effect(&admin(), approve.id, inv.approve_step, inv.review, true)
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), inv.circuit_id).await.unwrap();

    let doc = assigned_document(&h, inv.circuit_id, "D9").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    let outcome = h
        .engine
        .process_action(&approver(), doc.id, approve.id, "approved", true)
        .await
        .unwrap();
    assert!(outcome.approved);
    assert_eq!(outcome.effects_applied, 1);
    assert_eq!(outcome.advanced_to, Some(inv.approved));
    assert!(outcome.document.is_circuit_completed);

    let history = h.engine.get_history(&admin(), doc.id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].action_id, Some(approve.id));
    assert_eq!(history[3].status_id, Some(inv.approved));
    assert_eq!(history[3].comments, "Automatically advanced by action");
}

#[tokio::test]
async fn test_action_on_unbound_status_only_records() {
    let h = harness().await;
    let inv = invoice_circuit(&h, false).await;
    let approve = h
        .catalog
        .create_action(
            &admin(),
            NewAction::new(inv.circuit_id, "APPROVE", "Approve").auto_advancing(),
        )
        .await
        .unwrap();
    h.catalog
        .attach_action_to_step(&admin(), inv.approve_step, approve.id)
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), inv.circuit_id).await.unwrap();

    // Still in Draft; the action is bound to the step leaving Review.
    let doc = assigned_document(&h, inv.circuit_id, "D10").await;
    let outcome = h
        .engine
        .process_action(&approver(), doc.id, approve.id, "", true)
        .await
        .unwrap();
    assert_eq!(outcome.advanced_to, None);
    assert_eq!(outcome.document.current_status_id, Some(inv.draft));

    let history = h.engine.get_history(&admin(), doc.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].step_id, 0);
}

#[tokio::test]
async fn test_rejected_action_marks_document_rejected() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let reject = h
        .catalog
        .create_action(&admin(), NewAction::new(inv.circuit_id, "REJECT", "Reject"))
        .await
        .unwrap();
    let doc = assigned_document(&h, inv.circuit_id, "D11").await;

    let outcome = h
        .engine
        .process_action(&approver(), doc.id, reject.id, "duplicate invoice", false)
        .await
        .unwrap();
    assert!(!outcome.approved);
    assert_eq!(outcome.document.status, DocumentLifecycle::Rejected);
    assert_eq!(outcome.document.current_status_id, Some(inv.draft));

    let history = h.engine.get_history(&admin(), doc.id).await.unwrap();
    assert!(!history[1].is_approved);
    assert_eq!(history[1].comments, "duplicate invoice");
}

#[tokio::test]
async fn test_action_from_other_circuit_is_invalid() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let other = invoice_circuit(&h, true).await;
    let foreign = h
        .catalog
        .create_action(&admin(), NewAction::new(other.circuit_id, "APPROVE", "Approve"))
        .await
        .unwrap();
    let doc = assigned_document(&h, inv.circuit_id, "D12").await;

    let result = h
        .engine
        .process_action(&approver(), doc.id, foreign.id, "", true)
        .await;
    assert!(matches!(result, Err(DomainError::InvalidOperation(_))));

    let missing = h.engine.process_action(&approver(), doc.id, 777, "", true).await;
    assert!(matches!(missing, Err(DomainError::ActionNotFound(777))));
}

#[tokio::test]
async fn test_responsible_role_is_enforced() {
    let h = harness().await;
    let inv = invoice_circuit(&h, false).await;
    h.catalog
        .update_step(
            &admin(),
            inv.submit_step,
            StepUpdate { responsible_role: Some(Some(Role::FullUser)), ..Default::default() },
        )
        .await
        .unwrap();
    let submit = h
        .catalog
        .create_action(
            &admin(),
            NewAction::new(inv.circuit_id, "SUBMIT", "Submit").auto_advancing(),
        )
        .await
        .unwrap();
    h.catalog
        .attach_action_to_step(&admin(), inv.submit_step, submit.id)
        .await
        .unwrap();
    h.catalog.activate_circuit(&admin(), inv.circuit_id).await.unwrap();
    let doc = assigned_document(&h, inv.circuit_id, "D13").await;

    let denied = h.engine.process_action(&approver(), doc.id, submit.id, "", true).await;
    assert!(matches!(denied, Err(DomainError::Unauthorized(_))));
    assert_eq!(h.engine.get_history(&admin(), doc.id).await.unwrap().len(), 1);

    let outcome = h
        .engine
        .process_action(&clerk(), doc.id, submit.id, "", true)
        .await
        .unwrap();
    assert_eq!(outcome.advanced_to, Some(inv.review));
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_simple_user_cannot_drive_workflow() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D14").await;

    let moved = h.engine.move_to_next_status(&approver(), doc.id, inv.review, "").await;
    assert!(matches!(moved, Err(DomainError::Unauthorized(_))));

    let completed = h
        .engine
        .complete_document_status(&approver(), doc.id, inv.draft, true, "")
        .await;
    assert!(matches!(completed, Err(DomainError::Unauthorized(_))));

    // Reads stay open to simple users.
    assert!(h.engine.get_workflow_status(&approver(), doc.id).await.is_ok());
}

#[tokio::test]
async fn test_inactive_actor_is_unauthorized() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D15").await;

    let result = h
        .engine
        .move_to_next_status(&admin().inactive(), doc.id, inv.review, "")
        .await;
    assert!(matches!(result, Err(DomainError::Unauthorized(_))));
}

// ============================================================================
// History ledger
// ============================================================================

#[tokio::test]
async fn test_history_has_one_row_per_operation_in_time_order() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D16").await;

    h.engine.complete_document_status(&clerk(), doc.id, inv.draft, true, "").await.unwrap();
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();
    h.engine.return_to_previous_status(&clerk(), doc.id, inv.draft, "").await.unwrap();
    h.engine.complete_document_status(&clerk(), doc.id, inv.draft, false, "undo").await.unwrap();
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    // Failed calls leave no trace.
    let _ = h.engine.move_to_next_status(&clerk(), doc.id, inv.draft, "").await;

    let history = h.engine.get_history(&admin(), doc.id).await.unwrap();
    assert_eq!(history.len(), 6);
    assert!(history
        .windows(2)
        .all(|w| w[0].processed_at <= w[1].processed_at && w[0].id < w[1].id));
    assert!(!history[4].is_approved, "incomplete marks are recorded as not approved");
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_document_removes_records() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D17").await;
    h.engine.move_to_next_status(&clerk(), doc.id, inv.review, "").await.unwrap();

    assert!(h.engine.delete_document(&clerk(), doc.id).await.unwrap());
    assert!(h.documents.list_history(doc.id).await.unwrap().is_empty());
    assert!(h.documents.list_document_statuses(doc.id).await.unwrap().is_empty());
    assert!(matches!(
        h.engine.get_history(&admin(), doc.id).await,
        Err(DomainError::DocumentNotFound(_))
    ));

    // A second delete is a no-op.
    assert!(!h.engine.delete_document(&clerk(), doc.id).await.unwrap());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_moves_on_one_document_serialize() {
    let h = harness().await;
    let inv = invoice_circuit(&h, true).await;
    let doc = assigned_document(&h, inv.circuit_id, "D18").await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = std::sync::Arc::clone(&h.engine);
        let (doc_id, review) = (doc.id, inv.review);
        handles.push(tokio::spawn(async move {
            engine.move_to_next_status(&clerk(), doc_id, review, "race").await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(moved) => {
                assert_eq!(moved.current_status_id, Some(inv.review));
                succeeded += 1;
            }
            Err(err) => assert!(
                matches!(err, DomainError::InvalidOperation(_)),
                "losers see the document already in review, got {err:?}"
            ),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(h.engine.get_history(&admin(), doc.id).await.unwrap().len(), 2);
}
