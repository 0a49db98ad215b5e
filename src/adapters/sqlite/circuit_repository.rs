//! SQLite implementation of the CircuitRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{format_datetime, parse_datetime, parse_optional_role};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, ActionStatusEffect, Circuit, NewAction, NewCircuit, NewStatus, NewStep, Status, Step,
    StepLink, StepOrder, WorkflowConfig,
};
use crate::domain::ports::CircuitRepository;

#[derive(Clone)]
pub struct SqliteCircuitRepository {
    pool: SqlitePool,
}

impl SqliteCircuitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CircuitRepository for SqliteCircuitRepository {
    async fn create_circuit(&self, circuit: &NewCircuit, keys: &WorkflowConfig) -> DomainResult<Circuit> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (counter,): (i64,) = sqlx::query_as(
            "UPDATE counters SET value = value + 1 WHERE name = 'circuit' RETURNING value",
        )
        .fetch_one(&mut *tx)
        .await?;
        let key = keys.circuit_key(counter);

        let result = sqlx::query(
            r#"INSERT INTO circuits (circuit_key, title, description, is_active, has_ordered_flow, allow_backtrack, counter, created_at, updated_at)
               VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?)"#,
        )
        .bind(&key)
        .bind(&circuit.title)
        .bind(&circuit.description)
        .bind(circuit.has_ordered_flow)
        .bind(circuit.allow_backtrack)
        .bind(counter)
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Circuit {
            id: result.last_insert_rowid(),
            key,
            title: circuit.title.clone(),
            description: circuit.description.clone(),
            is_active: false,
            has_ordered_flow: circuit.has_ordered_flow,
            allow_backtrack: circuit.allow_backtrack,
            counter,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_circuit(&self, id: i64) -> DomainResult<Option<Circuit>> {
        let row: Option<CircuitRow> = sqlx::query_as(
            "SELECT id, circuit_key, title, description, is_active, has_ordered_flow, allow_backtrack, counter, created_at, updated_at FROM circuits WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_circuits(&self) -> DomainResult<Vec<Circuit>> {
        let rows: Vec<CircuitRow> = sqlx::query_as(
            "SELECT id, circuit_key, title, description, is_active, has_ordered_flow, allow_backtrack, counter, created_at, updated_at FROM circuits ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_circuit(&self, circuit: &Circuit) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE circuits SET title = ?, description = ?, is_active = ?, has_ordered_flow = ?,
               allow_backtrack = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&circuit.title)
        .bind(&circuit.description)
        .bind(circuit.is_active)
        .bind(circuit.has_ordered_flow)
        .bind(circuit.allow_backtrack)
        .bind(format_datetime(&circuit.updated_at))
        .bind(circuit.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::CircuitNotFound(circuit.id));
        }

        Ok(())
    }

    async fn delete_circuit(&self, id: i64) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM circuits WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::CircuitNotFound(id));
        }

        Ok(())
    }

    async fn count_circuit_documents(&self, circuit_id: i64) -> DomainResult<u64> {
        // Documents reassigned elsewhere still hold history rows pointing at this circuit's statuses.
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM documents d
               WHERE d.circuit_id = ?
                  OR EXISTS (
                      SELECT 1 FROM document_status ds
                      JOIN statuses s ON s.id = ds.status_id
                      WHERE ds.document_id = d.id AND s.circuit_id = ?
                  )"#,
        )
        .bind(circuit_id)
        .bind(circuit_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.unsigned_abs())
    }

    async fn create_status(&self, status: &NewStatus) -> DomainResult<Status> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO statuses (circuit_id, step_id, status_key, title, is_required, is_complete, is_initial, is_final, is_flexible, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(status.circuit_id)
        .bind(status.step_id)
        .bind(&status.key)
        .bind(&status.title)
        .bind(status.is_required)
        .bind(status.is_complete)
        .bind(status.is_initial)
        .bind(status.is_final)
        .bind(status.is_flexible)
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        Ok(Status {
            id: result.last_insert_rowid(),
            circuit_id: status.circuit_id,
            step_id: status.step_id,
            key: status.key.clone(),
            title: status.title.clone(),
            is_required: status.is_required,
            is_complete: status.is_complete,
            is_initial: status.is_initial,
            is_final: status.is_final,
            is_flexible: status.is_flexible,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_status(&self, id: i64) -> DomainResult<Option<Status>> {
        let row: Option<StatusRow> = sqlx::query_as(
            "SELECT id, circuit_id, step_id, status_key, title, is_required, is_complete, is_initial, is_final, is_flexible, created_at, updated_at FROM statuses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_statuses(&self, circuit_id: i64) -> DomainResult<Vec<Status>> {
        let rows: Vec<StatusRow> = sqlx::query_as(
            "SELECT id, circuit_id, step_id, status_key, title, is_required, is_complete, is_initial, is_final, is_flexible, created_at, updated_at FROM statuses WHERE circuit_id = ? ORDER BY id",
        )
        .bind(circuit_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_status(&self, status: &Status) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE statuses SET step_id = ?, title = ?, is_required = ?, is_complete = ?,
               is_initial = ?, is_final = ?, is_flexible = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(status.step_id)
        .bind(&status.title)
        .bind(status.is_required)
        .bind(status.is_complete)
        .bind(status.is_initial)
        .bind(status.is_final)
        .bind(status.is_flexible)
        .bind(format_datetime(&status.updated_at))
        .bind(status.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StatusNotFound(status.id));
        }

        Ok(())
    }

    async fn delete_status(&self, id: i64) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        // Steps keep existing without the edge endpoint.
        sqlx::query("UPDATE steps SET current_status_id = NULL WHERE current_status_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE steps SET next_status_id = NULL WHERE next_status_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM statuses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StatusNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_status_references(&self, status_id: i64) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT (SELECT COUNT(*) FROM document_status WHERE status_id = ?)
                    + (SELECT COUNT(*) FROM documents WHERE current_status_id = ?)"#,
        )
        .bind(status_id)
        .bind(status_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.unsigned_abs())
    }

    async fn create_step(&self, step: &NewStep, key: &str, order_index: i64) -> DomainResult<Step> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO steps (circuit_id, step_key, title, description, order_index, is_final_step, current_status_id, next_status_id, responsible_role, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)"#,
        )
        .bind(step.circuit_id)
        .bind(key)
        .bind(&step.title)
        .bind(&step.description)
        .bind(order_index)
        .bind(step.current_status_id)
        .bind(step.next_status_id)
        .bind(step.responsible_role.map(|r| r.as_str()))
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        Ok(Step {
            id: result.last_insert_rowid(),
            circuit_id: step.circuit_id,
            key: key.to_string(),
            title: step.title.clone(),
            description: step.description.clone(),
            order_index,
            prev_step_id: None,
            next_step_id: None,
            is_final_step: false,
            current_status_id: step.current_status_id,
            next_status_id: step.next_status_id,
            responsible_role: step.responsible_role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_step(&self, id: i64) -> DomainResult<Option<Step>> {
        let row: Option<StepRow> = sqlx::query_as(
            "SELECT id, circuit_id, step_key, title, description, order_index, prev_step_id, next_step_id, is_final_step, current_status_id, next_status_id, responsible_role, created_at, updated_at FROM steps WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_steps(&self, circuit_id: i64) -> DomainResult<Vec<Step>> {
        let rows: Vec<StepRow> = sqlx::query_as(
            "SELECT id, circuit_id, step_key, title, description, order_index, prev_step_id, next_step_id, is_final_step, current_status_id, next_status_id, responsible_role, created_at, updated_at FROM steps WHERE circuit_id = ? ORDER BY order_index, id",
        )
        .bind(circuit_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_step(&self, step: &Step) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE steps SET title = ?, description = ?, current_status_id = ?, next_status_id = ?,
               responsible_role = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&step.title)
        .bind(&step.description)
        .bind(step.current_status_id)
        .bind(step.next_status_id)
        .bind(step.responsible_role.map(|r| r.as_str()))
        .bind(format_datetime(&step.updated_at))
        .bind(step.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StepNotFound(step.id));
        }

        Ok(())
    }

    async fn delete_step(&self, id: i64) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM action_status_effects WHERE step_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM step_actions WHERE step_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE statuses SET step_id = NULL WHERE step_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM steps WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StepNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_step_references(&self, step_id: i64) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT (SELECT COUNT(*) FROM documents WHERE current_step_id = ?)
                    + (SELECT COUNT(*) FROM document_status ds
                         JOIN statuses s ON s.id = ds.status_id
                        WHERE s.step_id = ?)"#,
        )
        .bind(step_id)
        .bind(step_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.unsigned_abs())
    }

    async fn update_step_order(&self, circuit_id: i64, orders: &[StepOrder]) -> DomainResult<()> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.begin().await?;

        for order in orders {
            let result = sqlx::query(
                "UPDATE steps SET order_index = ?, updated_at = ? WHERE id = ? AND circuit_id = ?",
            )
            .bind(order.order_index)
            .bind(&now)
            .bind(order.step_id)
            .bind(circuit_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!(circuit_id, step_id = order.step_id, "unknown step in reorder, rolling back");
                tx.rollback().await?;
                return Err(DomainError::StepNotFound(order.step_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_step_links(&self, circuit_id: i64, links: &[StepLink]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE steps SET prev_step_id = NULL, next_step_id = NULL, is_final_step = 0 WHERE circuit_id = ?",
        )
        .bind(circuit_id)
        .execute(&mut *tx)
        .await?;

        for link in links {
            sqlx::query(
                "UPDATE steps SET prev_step_id = ?, next_step_id = ?, is_final_step = ? WHERE id = ? AND circuit_id = ?",
            )
            .bind(link.prev_step_id)
            .bind(link.next_step_id)
            .bind(link.is_final_step)
            .bind(link.step_id)
            .bind(circuit_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_action(&self, action: &NewAction) -> DomainResult<Action> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO actions (circuit_id, action_key, title, description, auto_advance, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(action.circuit_id)
        .bind(&action.key)
        .bind(&action.title)
        .bind(&action.description)
        .bind(action.auto_advance)
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        Ok(Action {
            id: result.last_insert_rowid(),
            circuit_id: action.circuit_id,
            key: action.key.clone(),
            title: action.title.clone(),
            description: action.description.clone(),
            auto_advance: action.auto_advance,
            created_at: now,
        })
    }

    async fn get_action(&self, id: i64) -> DomainResult<Option<Action>> {
        let row: Option<ActionRow> = sqlx::query_as(
            "SELECT id, circuit_id, action_key, title, description, auto_advance, created_at FROM actions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn attach_action(&self, step_id: i64, action_id: i64) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO step_actions (step_id, action_id) VALUES (?, ?)")
            .bind(step_id)
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_actions_for_step(&self, step_id: i64) -> DomainResult<Vec<Action>> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            r#"SELECT a.id, a.circuit_id, a.action_key, a.title, a.description, a.auto_advance, a.created_at
               FROM actions a JOIN step_actions sa ON sa.action_id = a.id
               WHERE sa.step_id = ? ORDER BY a.id"#,
        )
        .bind(step_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_steps_for_action(&self, action_id: i64) -> DomainResult<Vec<Step>> {
        let rows: Vec<StepRow> = sqlx::query_as(
            r#"SELECT s.id, s.circuit_id, s.step_key, s.title, s.description, s.order_index, s.prev_step_id, s.next_step_id,
                      s.is_final_step, s.current_status_id, s.next_status_id, s.responsible_role, s.created_at, s.updated_at
               FROM steps s JOIN step_actions sa ON sa.step_id = s.id
               WHERE sa.action_id = ? ORDER BY s.order_index, s.id"#,
        )
        .bind(action_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn add_status_effect(
        &self,
        action_id: i64,
        step_id: i64,
        status_id: i64,
        sets_complete: bool,
    ) -> DomainResult<ActionStatusEffect> {
        let result = sqlx::query(
            "INSERT INTO action_status_effects (action_id, step_id, status_id, sets_complete) VALUES (?, ?, ?, ?)",
        )
        .bind(action_id)
        .bind(step_id)
        .bind(status_id)
        .bind(sets_complete)
        .execute(&self.pool)
        .await?;

        Ok(ActionStatusEffect {
            id: result.last_insert_rowid(),
            action_id,
            step_id,
            status_id,
            sets_complete,
        })
    }

    async fn list_status_effects(&self, action_id: i64) -> DomainResult<Vec<ActionStatusEffect>> {
        let rows: Vec<(i64, i64, i64, i64, bool)> = sqlx::query_as(
            "SELECT id, action_id, step_id, status_id, sets_complete FROM action_status_effects WHERE action_id = ? ORDER BY id",
        )
        .bind(action_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, action_id, step_id, status_id, sets_complete)| ActionStatusEffect {
                id,
                action_id,
                step_id,
                status_id,
                sets_complete,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct CircuitRow {
    id: i64,
    circuit_key: String,
    title: String,
    description: String,
    is_active: bool,
    has_ordered_flow: bool,
    allow_backtrack: bool,
    counter: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CircuitRow> for Circuit {
    type Error = DomainError;

    fn try_from(row: CircuitRow) -> Result<Self, Self::Error> {
        Ok(Circuit {
            id: row.id,
            key: row.circuit_key,
            title: row.title,
            description: row.description,
            is_active: row.is_active,
            has_ordered_flow: row.has_ordered_flow,
            allow_backtrack: row.allow_backtrack,
            counter: row.counter,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    id: i64,
    circuit_id: i64,
    step_id: Option<i64>,
    status_key: String,
    title: String,
    is_required: bool,
    is_complete: bool,
    is_initial: bool,
    is_final: bool,
    is_flexible: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<StatusRow> for Status {
    type Error = DomainError;

    fn try_from(row: StatusRow) -> Result<Self, Self::Error> {
        Ok(Status {
            id: row.id,
            circuit_id: row.circuit_id,
            step_id: row.step_id,
            key: row.status_key,
            title: row.title,
            is_required: row.is_required,
            is_complete: row.is_complete,
            is_initial: row.is_initial,
            is_final: row.is_final,
            is_flexible: row.is_flexible,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: i64,
    circuit_id: i64,
    step_key: String,
    title: String,
    description: String,
    order_index: i64,
    prev_step_id: Option<i64>,
    next_step_id: Option<i64>,
    is_final_step: bool,
    current_status_id: Option<i64>,
    next_status_id: Option<i64>,
    responsible_role: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<StepRow> for Step {
    type Error = DomainError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        Ok(Step {
            id: row.id,
            circuit_id: row.circuit_id,
            key: row.step_key,
            title: row.title,
            description: row.description,
            order_index: row.order_index,
            prev_step_id: row.prev_step_id,
            next_step_id: row.next_step_id,
            is_final_step: row.is_final_step,
            current_status_id: row.current_status_id,
            next_status_id: row.next_status_id,
            responsible_role: parse_optional_role(row.responsible_role)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    id: i64,
    circuit_id: i64,
    action_key: String,
    title: String,
    description: String,
    auto_advance: bool,
    created_at: String,
}

impl TryFrom<ActionRow> for Action {
    type Error = DomainError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        Ok(Action {
            id: row.id,
            circuit_id: row.circuit_id,
            key: row.action_key,
            title: row.title,
            description: row.description,
            auto_advance: row.auto_advance,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
