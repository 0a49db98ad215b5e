//! Common test utilities for integration tests
//!
//! Builds services over a migrated in-memory database and provides the
//! "Invoice Approval" circuit used across test files.

#![allow(dead_code)]

use std::sync::Arc;

use circuitflow::adapters::sqlite::{
    create_migrated_test_pool, SqliteCircuitRepository, SqliteDocumentRepository,
};
use circuitflow::domain::models::{
    Actor, Document, NewCircuit, NewStatus, NewStep, Role, WorkflowConfig,
};
use circuitflow::services::{CircuitCatalog, TransitionEngine};

pub type Catalog = CircuitCatalog<SqliteCircuitRepository>;
pub type Engine = TransitionEngine<SqliteCircuitRepository, SqliteDocumentRepository>;

pub struct Harness {
    pub catalog: Catalog,
    pub engine: Arc<Engine>,
    pub circuits: Arc<SqliteCircuitRepository>,
    pub documents: Arc<SqliteDocumentRepository>,
}

pub async fn harness() -> Harness {
    harness_with(WorkflowConfig::default()).await
}

pub async fn harness_with(config: WorkflowConfig) -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");
    let circuits = Arc::new(SqliteCircuitRepository::new(pool.clone()));
    let documents = Arc::new(SqliteDocumentRepository::new(pool));
    Harness {
        catalog: CircuitCatalog::new(circuits.clone(), config.clone()),
        engine: Arc::new(TransitionEngine::new(circuits.clone(), documents.clone(), config)),
        circuits,
        documents,
    }
}

pub fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

pub fn clerk() -> Actor {
    Actor::new(2, Role::FullUser)
}

pub fn approver() -> Actor {
    Actor::new(3, Role::SimpleUser)
}

/// Ids of the Invoice Approval circuit.
#[derive(Debug, Clone, Copy)]
pub struct Invoice {
    pub circuit_id: i64,
    pub draft: i64,
    pub review: i64,
    pub approved: i64,
    pub submit_step: i64,
    pub approve_step: i64,
}

/// Draft(initial) -> Review -> Approved(final). Left inactive when `activate` is false.
pub async fn invoice_circuit(h: &Harness, activate: bool) -> Invoice {
    let admin = admin();
    let circuit = h
        .catalog
        .create_circuit(&admin, NewCircuit::new("Invoice Approval"))
        .await
        .expect("circuit");

    let draft = h
        .catalog
        .create_status(&admin, NewStatus::new(circuit.id, "DRAFT", "Draft").initial())
        .await
        .expect("draft");
    let review = h
        .catalog
        .create_status(&admin, NewStatus::new(circuit.id, "REVIEW", "Review"))
        .await
        .expect("review");
    let approved = h
        .catalog
        .create_status(
            &admin,
            NewStatus::new(circuit.id, "APPROVED", "Approved").final_status(),
        )
        .await
        .expect("approved");

    let submit = h
        .catalog
        .create_step(&admin, NewStep::new(circuit.id, "Submit").with_edge(draft.id, review.id))
        .await
        .expect("submit step");
    let approve = h
        .catalog
        .create_step(
            &admin,
            NewStep::new(circuit.id, "Approve").with_edge(review.id, approved.id),
        )
        .await
        .expect("approve step");

    if activate {
        h.catalog
            .activate_circuit(&admin, circuit.id)
            .await
            .expect("activate");
    }

    Invoice {
        circuit_id: circuit.id,
        draft: draft.id,
        review: review.id,
        approved: approved.id,
        submit_step: submit.id,
        approve_step: approve.id,
    }
}

/// A new document assigned to `circuit_id`.
pub async fn assigned_document(h: &Harness, circuit_id: i64, title: &str) -> Document {
    let doc = h
        .engine
        .create_document(&admin(), title)
        .await
        .expect("document");
    h.engine
        .assign_document_to_circuit(&admin(), doc.id, circuit_id)
        .await
        .expect("assign")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
