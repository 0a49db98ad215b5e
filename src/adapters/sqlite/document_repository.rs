//! SQLite implementation of the DocumentRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{format_datetime, parse_datetime, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CompletionWrite, Document, DocumentCircuitHistory, DocumentLifecycle, DocumentStatus,
    WorkflowChange,
};
use crate::domain::ports::DocumentRepository;

#[derive(Clone)]
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn create_document(&self, title: &str) -> DomainResult<Document> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO documents (title, is_circuit_completed, status, version, created_at, updated_at)
               VALUES (?, 0, ?, 1, ?, ?)"#,
        )
        .bind(title)
        .bind(DocumentLifecycle::Draft.code())
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        Ok(Document {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            circuit_id: None,
            current_status_id: None,
            current_step_id: None,
            is_circuit_completed: false,
            status: DocumentLifecycle::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_document(&self, id: i64) -> DomainResult<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, title, circuit_id, current_status_id, current_step_id, is_circuit_completed, status, version, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_document_status(&self, document_id: i64, status_id: i64) -> DomainResult<Option<DocumentStatus>> {
        let row: Option<DocumentStatusRow> = sqlx::query_as(
            "SELECT document_id, status_id, is_complete, completed_by_user_id, completed_at FROM document_status WHERE document_id = ? AND status_id = ?",
        )
        .bind(document_id)
        .bind(status_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_document_statuses(&self, document_id: i64) -> DomainResult<Vec<DocumentStatus>> {
        let rows: Vec<DocumentStatusRow> = sqlx::query_as(
            "SELECT document_id, status_id, is_complete, completed_by_user_id, completed_at FROM document_status WHERE document_id = ? ORDER BY status_id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_history(&self, document_id: i64) -> DomainResult<Vec<DocumentCircuitHistory>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, document_id, step_id, action_id, status_id, processed_by_user_id, processed_at, comments, is_approved FROM document_circuit_history WHERE document_id = ? ORDER BY id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn commit(&self, change: &WorkflowChange) -> DomainResult<Document> {
        let doc = &change.document;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE documents SET circuit_id = ?, current_status_id = ?, current_step_id = ?,
               is_circuit_completed = ?, status = ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(doc.circuit_id)
        .bind(doc.current_status_id)
        .bind(doc.current_step_id)
        .bind(doc.is_circuit_completed)
        .bind(doc.status.code())
        .bind(format_datetime(&doc.updated_at))
        .bind(doc.id)
        .bind(doc.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM documents WHERE id = ?")
                .bind(doc.id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(match exists {
                None => DomainError::DocumentNotFound(doc.id),
                Some(_) => DomainError::ConcurrencyConflict {
                    entity: "document".to_string(),
                    id: doc.id.to_string(),
                },
            });
        }

        for write in &change.completions {
            match write {
                CompletionWrite::EnsureExists(status_id) => {
                    sqlx::query(
                        "INSERT OR IGNORE INTO document_status (document_id, status_id, is_complete) VALUES (?, ?, 0)",
                    )
                    .bind(doc.id)
                    .bind(*status_id)
                    .execute(&mut *tx)
                    .await?;
                }
                CompletionWrite::Upsert(record) => {
                    sqlx::query(
                        r#"INSERT INTO document_status (document_id, status_id, is_complete, completed_by_user_id, completed_at)
                           VALUES (?, ?, ?, ?, ?)
                           ON CONFLICT (document_id, status_id) DO UPDATE SET
                               is_complete = excluded.is_complete,
                               completed_by_user_id = excluded.completed_by_user_id,
                               completed_at = excluded.completed_at"#,
                    )
                    .bind(doc.id)
                    .bind(record.status_id)
                    .bind(record.is_complete)
                    .bind(record.completed_by_user_id)
                    .bind(record.completed_at.as_ref().map(format_datetime))
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        // The ledger never goes back in time for a document.
        let (latest,): (Option<String>,) = sqlx::query_as(
            "SELECT MAX(processed_at) FROM document_circuit_history WHERE document_id = ?",
        )
        .bind(doc.id)
        .fetch_one(&mut *tx)
        .await?;
        let mut floor = latest.as_deref().map(parse_datetime).transpose()?;

        for entry in &change.history {
            let processed_at = match floor {
                Some(f) if f > entry.processed_at => f,
                _ => entry.processed_at,
            };
            floor = Some(processed_at);

            sqlx::query(
                r#"INSERT INTO document_circuit_history (document_id, step_id, action_id, status_id, processed_by_user_id, processed_at, comments, is_approved)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(doc.id)
            .bind(entry.step_id)
            .bind(entry.action_id)
            .bind(entry.status_id)
            .bind(entry.processed_by_user_id)
            .bind(format_datetime(&processed_at))
            .bind(&entry.comments)
            .bind(entry.is_approved)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut stored = doc.clone();
        stored.version += 1;
        Ok(stored)
    }

    async fn delete_document(&self, id: i64) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM document_circuit_history WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM document_status WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    title: String,
    circuit_id: Option<i64>,
    current_status_id: Option<i64>,
    current_step_id: Option<i64>,
    is_circuit_completed: bool,
    status: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DomainError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let status = DocumentLifecycle::from_code(row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid document status: {}", row.status))
        })?;

        Ok(Document {
            id: row.id,
            title: row.title,
            circuit_id: row.circuit_id,
            current_status_id: row.current_status_id,
            current_step_id: row.current_step_id,
            is_circuit_completed: row.is_circuit_completed,
            status,
            version: row.version,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DocumentStatusRow {
    document_id: i64,
    status_id: i64,
    is_complete: bool,
    completed_by_user_id: Option<i64>,
    completed_at: Option<String>,
}

impl TryFrom<DocumentStatusRow> for DocumentStatus {
    type Error = DomainError;

    fn try_from(row: DocumentStatusRow) -> Result<Self, Self::Error> {
        Ok(DocumentStatus {
            document_id: row.document_id,
            status_id: row.status_id,
            is_complete: row.is_complete,
            completed_by_user_id: row.completed_by_user_id,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    document_id: i64,
    step_id: i64,
    action_id: Option<i64>,
    status_id: Option<i64>,
    processed_by_user_id: i64,
    processed_at: String,
    comments: String,
    is_approved: bool,
}

impl TryFrom<HistoryRow> for DocumentCircuitHistory {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(DocumentCircuitHistory {
            id: row.id,
            document_id: row.document_id,
            step_id: row.step_id,
            action_id: row.action_id,
            status_id: row.status_id,
            processed_by_user_id: row.processed_by_user_id,
            processed_at: parse_datetime(&row.processed_at)?,
            comments: row.comments,
            is_approved: row.is_approved,
        })
    }
}
