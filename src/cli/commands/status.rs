//! Status CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::{NewStatus, Status, StatusUpdate};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(subcommand)]
    pub command: StatusCommands,
}

#[derive(Subcommand, Debug)]
pub enum StatusCommands {
    /// Add a status to a circuit
    Add {
        circuit_id: i64,
        /// Unique key within the circuit, e.g. REVIEW
        key: String,
        /// Display title (defaults to the key)
        #[arg(short, long)]
        title: Option<String>,
        /// Step this status is attached to
        #[arg(long)]
        step: Option<i64>,
        /// Entry point of the circuit
        #[arg(long)]
        initial: bool,
        /// Reaching it completes the circuit
        #[arg(long = "final")]
        is_final: bool,
        /// Reachable from any status without an edge
        #[arg(long)]
        flexible: bool,
        /// Must be completed before the document leaves it
        #[arg(long)]
        required: bool,
    },
    /// Update a status
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        /// Attach to a step
        #[arg(long, conflicts_with = "detach")]
        step: Option<i64>,
        /// Detach from its step
        #[arg(long)]
        detach: bool,
        #[arg(long)]
        initial: Option<bool>,
        #[arg(long = "final")]
        is_final: Option<bool>,
        #[arg(long)]
        flexible: Option<bool>,
        #[arg(long)]
        required: Option<bool>,
    },
    /// Delete a status no document has used
    Delete {
        id: i64,
    },
    /// List the statuses of a circuit
    List {
        circuit_id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct StatusListOutput {
    pub circuit_id: i64,
    pub statuses: Vec<Status>,
}

impl CommandOutput for StatusListOutput {
    fn to_human(&self) -> String {
        if self.statuses.is_empty() {
            return format!("Circuit {} has no statuses.", self.circuit_id);
        }
        TableFormatter::new().format_statuses(&self.statuses)
    }
}

pub async fn execute(args: StatusArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let actor = &ctx.actor;
    let catalog = &ctx.catalog;

    match args.command {
        StatusCommands::Add {
            circuit_id,
            key,
            title,
            step,
            initial,
            is_final,
            flexible,
            required,
        } => {
            let title = title.unwrap_or_else(|| key.clone());
            let status = NewStatus {
                step_id: step,
                is_initial: initial,
                is_final,
                is_flexible: flexible,
                is_required: required,
                ..NewStatus::new(circuit_id, key, title)
            };
            let status = catalog.create_status(actor, status).await?;
            let message = format!("Status created: {} (id {})", status.key, status.id);
            output(&ActionOutput::new(message, status), json_mode);
        }

        StatusCommands::Update {
            id,
            title,
            step,
            detach,
            initial,
            is_final,
            flexible,
            required,
        } => {
            let step_id = if detach { Some(None) } else { step.map(Some) };
            let update = StatusUpdate {
                title,
                step_id,
                is_required: required,
                is_complete: None,
                is_initial: initial,
                is_final,
                is_flexible: flexible,
            };
            let status = catalog.update_status(actor, id, update).await?;
            let message = format!("Status updated: {}", status.key);
            output(&ActionOutput::new(message, status), json_mode);
        }

        StatusCommands::Delete { id } => {
            catalog.delete_status(actor, id).await?;
            output(&ActionOutput::message(format!("Status deleted: {id}")), json_mode);
        }

        StatusCommands::List { circuit_id } => {
            let statuses = catalog.list_statuses(actor, circuit_id).await?;
            output(&StatusListOutput { circuit_id, statuses }, json_mode);
        }
    }

    Ok(())
}
