//! Document workflow repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Document, DocumentCircuitHistory, DocumentStatus, WorkflowChange};

/// Repository interface for document workflow state.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Create an unassigned draft document.
    async fn create_document(&self, title: &str) -> DomainResult<Document>;

    async fn get_document(&self, id: i64) -> DomainResult<Option<Document>>;

    async fn get_document_status(&self, document_id: i64, status_id: i64) -> DomainResult<Option<DocumentStatus>>;

    async fn list_document_statuses(&self, document_id: i64) -> DomainResult<Vec<DocumentStatus>>;

    /// History entries in append order.
    async fn list_history(&self, document_id: i64) -> DomainResult<Vec<DocumentCircuitHistory>>;

    /// Apply a change atomically: document update (version-checked),
    /// completion writes and history appends. Returns the stored document.
    async fn commit(&self, change: &WorkflowChange) -> DomainResult<Document>;

    /// Delete a document with its history and completion records.
    /// Returns `false` without touching anything if it does not exist.
    async fn delete_document(&self, id: i64) -> DomainResult<bool>;
}
