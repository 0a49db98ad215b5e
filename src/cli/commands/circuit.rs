//! Circuit CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::step_chain::is_linked;
use crate::domain::models::{
    Circuit, CircuitStructureReport, CircuitUpdate, NewCircuit, Status, Step, StepLink,
};

#[derive(Args, Debug)]
pub struct CircuitArgs {
    #[command(subcommand)]
    pub command: CircuitCommands,
}

#[derive(Subcommand, Debug)]
pub enum CircuitCommands {
    /// Create a new (inactive) circuit
    Create {
        /// Circuit title
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Do not maintain prev/next links between steps
        #[arg(long)]
        unordered: bool,
        /// Allow documents to move backwards
        #[arg(long)]
        allow_backtrack: bool,
    },
    /// List circuits
    List,
    /// Show a circuit with its statuses and steps
    Show {
        id: i64,
    },
    /// Update circuit attributes
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        ordered: Option<bool>,
        #[arg(long)]
        allow_backtrack: Option<bool>,
    },
    /// Open the circuit to documents
    Activate {
        id: i64,
    },
    /// Close the circuit to new documents
    Deactivate {
        id: i64,
    },
    /// Delete a circuit no document uses
    Delete {
        id: i64,
    },
    /// Check that every step has statuses attached
    Validate {
        id: i64,
    },
    /// Recompute step links of one circuit
    Relink {
        id: i64,
    },
    /// Recompute step links of every ordered circuit
    RelinkAll,
    /// Show the ordered step chain
    Chain {
        id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct CircuitListOutput {
    pub circuits: Vec<Circuit>,
    pub total: usize,
}

impl CommandOutput for CircuitListOutput {
    fn to_human(&self) -> String {
        if self.circuits.is_empty() {
            return "No circuits found.".to_string();
        }
        format!(
            "Found {} circuit(s):\n{}",
            self.total,
            TableFormatter::new().format_circuits(&self.circuits)
        )
    }
}

#[derive(Debug, Serialize)]
pub struct CircuitDetailOutput {
    pub circuit: Circuit,
    pub statuses: Vec<Status>,
    pub steps: Vec<Step>,
}

impl CommandOutput for CircuitDetailOutput {
    fn to_human(&self) -> String {
        let c = &self.circuit;
        let formatter = TableFormatter::new();
        let mut lines = vec![
            format!("Circuit: {} ({})", c.title, c.key),
            format!("ID: {}", c.id),
            format!("Active: {}", c.is_active),
            format!("Ordered flow: {}", c.has_ordered_flow),
            format!("Allow backtrack: {}", c.allow_backtrack),
        ];
        if !c.description.is_empty() {
            lines.push(format!("Description: {}", c.description));
        }
        lines.push(format!("\nStatuses ({}):", self.statuses.len()));
        if !self.statuses.is_empty() {
            lines.push(formatter.format_statuses(&self.statuses));
        }
        lines.push(format!("\nSteps ({}):", self.steps.len()));
        if !self.steps.is_empty() {
            lines.push(formatter.format_steps(&self.steps));
        }
        lines.join("\n")
    }
}

impl CommandOutput for CircuitStructureReport {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Circuit {} is {}",
            self.circuit_id,
            if self.is_valid { "valid" } else { "INVALID" }
        )];
        if self.steps.is_empty() {
            lines.push("  no steps defined".to_string());
        }
        for step in &self.steps {
            let mark = if step.has_statuses { "ok " } else { "!! " };
            lines.push(format!(
                "  {mark}step {} '{}': {} status(es)",
                step.step_id, step.title, step.status_count
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ChainOutput {
    pub circuit_id: i64,
    pub links: Vec<ChainEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChainEntry {
    #[serde(flatten)]
    pub link: StepLink,
    pub title: String,
    /// Stored links match the computed ones.
    pub in_sync: bool,
}

impl CommandOutput for ChainOutput {
    fn to_human(&self) -> String {
        if self.links.is_empty() {
            return format!("Circuit {} has no steps.", self.circuit_id);
        }
        let mut lines = vec![format!("Step chain of circuit {}:", self.circuit_id)];
        for entry in &self.links {
            let mut line = format!(
                "  {}. [{}] {}",
                entry.link.order_index, entry.link.step_id, entry.title
            );
            if entry.link.is_final_step {
                line.push_str(" (final)");
            }
            if !entry.in_sync {
                line.push_str("  <- stored links out of date, run `circuit relink`");
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

pub async fn execute(args: CircuitArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let actor = &ctx.actor;
    let catalog = &ctx.catalog;

    match args.command {
        CircuitCommands::Create { title, description, unordered, allow_backtrack } => {
            let circuit = catalog
                .create_circuit(
                    actor,
                    NewCircuit::new(title)
                        .with_description(description)
                        .with_ordered_flow(!unordered)
                        .with_backtrack(allow_backtrack),
                )
                .await?;
            let message = format!("Circuit created: {} (id {})", circuit.key, circuit.id);
            output(&ActionOutput::new(message, circuit), json_mode);
        }

        CircuitCommands::List => {
            let circuits = catalog.list_circuits(actor).await?;
            let out = CircuitListOutput { total: circuits.len(), circuits };
            output(&out, json_mode);
        }

        CircuitCommands::Show { id } => {
            let circuit = catalog.get_circuit(actor, id).await?;
            let statuses = catalog.list_statuses(actor, id).await?;
            let steps = catalog.list_steps(actor, id).await?;
            output(&CircuitDetailOutput { circuit, statuses, steps }, json_mode);
        }

        CircuitCommands::Update { id, title, description, ordered, allow_backtrack } => {
            let update = CircuitUpdate {
                title,
                description,
                has_ordered_flow: ordered,
                allow_backtrack,
            };
            let circuit = catalog.update_circuit(actor, id, update).await?;
            let message = format!("Circuit updated: {}", circuit.key);
            output(&ActionOutput::new(message, circuit), json_mode);
        }

        CircuitCommands::Activate { id } => {
            let circuit = catalog.activate_circuit(actor, id).await?;
            let message = format!("Circuit activated: {}", circuit.key);
            output(&ActionOutput::new(message, circuit), json_mode);
        }

        CircuitCommands::Deactivate { id } => {
            let circuit = catalog.deactivate_circuit(actor, id).await?;
            let message = format!("Circuit deactivated: {}", circuit.key);
            output(&ActionOutput::new(message, circuit), json_mode);
        }

        CircuitCommands::Delete { id } => {
            catalog.delete_circuit(actor, id).await?;
            output(&ActionOutput::message(format!("Circuit deleted: {id}")), json_mode);
        }

        CircuitCommands::Validate { id } => {
            let report = catalog.validate_circuit_structure(actor, id).await?;
            output(&report, json_mode);
        }

        CircuitCommands::Relink { id } => {
            let links = catalog.linker().relink_steps(actor, id).await?;
            let message = format!("Relinked {} step(s) of circuit {id}", links.len());
            output(&ActionOutput::new(message, links), json_mode);
        }

        CircuitCommands::RelinkAll => {
            let count = catalog.linker().relink_all_circuits(actor).await?;
            let message = format!("Relinked {count} ordered circuit(s)");
            output(&ActionOutput::new(message, count), json_mode);
        }

        CircuitCommands::Chain { id } => {
            let chain = catalog.step_chain(actor, id).await?;
            let steps = catalog.list_steps(actor, id).await?;
            let links = chain
                .links
                .into_iter()
                .map(|link| {
                    let stored = steps.iter().find(|s| s.id == link.step_id);
                    ChainEntry {
                        title: stored.map(|s| s.title.clone()).unwrap_or_default(),
                        in_sync: stored.is_some_and(|s| is_linked(s, &link)),
                        link,
                    }
                })
                .collect();
            output(&ChainOutput { circuit_id: chain.circuit_id, links }, json_mode);
        }
    }

    Ok(())
}
