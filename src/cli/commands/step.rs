//! Step CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::{NewStep, Role, Step, StepOrder, StepUpdate};

#[derive(Args, Debug)]
pub struct StepArgs {
    #[command(subcommand)]
    pub command: StepCommands,
}

#[derive(Subcommand, Debug)]
pub enum StepCommands {
    /// Append a step to a circuit
    Add {
        circuit_id: i64,
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Status the edge leaves from
        #[arg(long, requires = "to")]
        from: Option<i64>,
        /// Status the edge leads to
        #[arg(long, requires = "from")]
        to: Option<i64>,
        /// Role that must perform actions on this step
        #[arg(long)]
        role: Option<String>,
    },
    /// Update a step of an inactive circuit
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        from: Option<i64>,
        #[arg(long)]
        to: Option<i64>,
        /// Remove the edge
        #[arg(long, conflicts_with_all = ["from", "to"])]
        clear_edge: bool,
        #[arg(long)]
        role: Option<String>,
        /// Remove the responsible role
        #[arg(long, conflicts_with = "role")]
        clear_role: bool,
    },
    /// Delete a step of an inactive circuit
    Delete {
        id: i64,
    },
    /// Reassign step positions, e.g. `reorder 1 12=1 10=2 11=3`
    Reorder {
        circuit_id: i64,
        /// STEP_ID=ORDER_INDEX pairs
        #[arg(required = true)]
        orders: Vec<String>,
    },
    /// List the steps of a circuit in order
    List {
        circuit_id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct StepListOutput {
    pub circuit_id: i64,
    pub steps: Vec<Step>,
}

impl CommandOutput for StepListOutput {
    fn to_human(&self) -> String {
        if self.steps.is_empty() {
            return format!("Circuit {} has no steps.", self.circuit_id);
        }
        TableFormatter::new().format_steps(&self.steps)
    }
}

fn parse_role(value: &str) -> Result<Role> {
    Role::from_str(value).ok_or_else(|| anyhow!("Invalid role: {value}"))
}

fn parse_order(pair: &str) -> Result<StepOrder> {
    let (step, order) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected STEP_ID=ORDER_INDEX, got '{pair}'"))?;
    Ok(StepOrder {
        step_id: step.trim().parse().map_err(|_| anyhow!("Invalid step id in '{pair}'"))?,
        order_index: order.trim().parse().map_err(|_| anyhow!("Invalid order index in '{pair}'"))?,
    })
}

pub async fn execute(args: StepArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let actor = &ctx.actor;
    let catalog = &ctx.catalog;

    match args.command {
        StepCommands::Add { circuit_id, title, description, from, to, role } => {
            let step = NewStep {
                description,
                current_status_id: from,
                next_status_id: to,
                responsible_role: role.as_deref().map(parse_role).transpose()?,
                ..NewStep::new(circuit_id, title)
            };
            let step = catalog.create_step(actor, step).await?;
            let message = format!(
                "Step created: {} (id {}, position {})",
                step.key, step.id, step.order_index
            );
            output(&ActionOutput::new(message, step), json_mode);
        }

        StepCommands::Update {
            id,
            title,
            description,
            from,
            to,
            clear_edge,
            role,
            clear_role,
        } => {
            let responsible_role = if clear_role {
                Some(None)
            } else {
                role.as_deref().map(parse_role).transpose()?.map(Some)
            };
            let update = StepUpdate {
                title,
                description,
                current_status_id: if clear_edge { Some(None) } else { from.map(Some) },
                next_status_id: if clear_edge { Some(None) } else { to.map(Some) },
                responsible_role,
            };
            let step = catalog.update_step(actor, id, update).await?;
            let message = format!("Step updated: {}", step.key);
            output(&ActionOutput::new(message, step), json_mode);
        }

        StepCommands::Delete { id } => {
            catalog.delete_step(actor, id).await?;
            output(&ActionOutput::message(format!("Step deleted: {id}")), json_mode);
        }

        StepCommands::Reorder { circuit_id, orders } => {
            let orders = orders.iter().map(|p| parse_order(p)).collect::<Result<Vec<_>>>()?;
            let steps = catalog.linker().update_step_order(actor, circuit_id, &orders).await?;
            output(&StepListOutput { circuit_id, steps }, json_mode);
        }

        StepCommands::List { circuit_id } => {
            let steps = catalog.list_steps(actor, circuit_id).await?;
            output(&StepListOutput { circuit_id, steps }, json_mode);
        }
    }

    Ok(())
}
