//! Action CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, truncate, ActionOutput, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::{Action, NewAction};

#[derive(Args, Debug)]
pub struct ActionArgs {
    #[command(subcommand)]
    pub command: ActionCommands,
}

#[derive(Subcommand, Debug)]
pub enum ActionCommands {
    /// Define an action on a circuit
    Create {
        circuit_id: i64,
        /// Unique key within the circuit, e.g. APPROVE
        key: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Follow the step's edge when the action is approved
        #[arg(long)]
        auto_advance: bool,
    },
    /// Make an action available on a step
    Attach {
        action_id: i64,
        step_id: i64,
    },
    /// Set a status's completion when the action is performed on a step
    Effect {
        action_id: i64,
        step_id: i64,
        status_id: i64,
        /// Mark the status incomplete instead of complete
        #[arg(long)]
        incomplete: bool,
    },
    /// List the actions attached to a step
    List {
        step_id: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct ActionListOutput {
    pub step_id: i64,
    pub actions: Vec<Action>,
}

impl CommandOutput for ActionListOutput {
    fn to_human(&self) -> String {
        if self.actions.is_empty() {
            return format!("Step {} has no actions.", self.step_id);
        }
        let mut lines = vec![format!("Actions on step {}:", self.step_id)];
        for action in &self.actions {
            lines.push(format!(
                "  [{}] {:<12} {}{}",
                action.id,
                action.key,
                truncate(&action.title, 40),
                if action.auto_advance { "  (auto-advance)" } else { "" }
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ActionArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let actor = &ctx.actor;
    let catalog = &ctx.catalog;

    match args.command {
        ActionCommands::Create { circuit_id, key, title, description, auto_advance } => {
            let title = title.unwrap_or_else(|| key.clone());
            let action = NewAction {
                description,
                auto_advance,
                ..NewAction::new(circuit_id, key, title)
            };
            let action = catalog.create_action(actor, action).await?;
            let message = format!("Action created: {} (id {})", action.key, action.id);
            output(&ActionOutput::new(message, action), json_mode);
        }

        ActionCommands::Attach { action_id, step_id } => {
            catalog.attach_action_to_step(actor, step_id, action_id).await?;
            output(
                &ActionOutput::message(format!("Action {action_id} attached to step {step_id}")),
                json_mode,
            );
        }

        ActionCommands::Effect { action_id, step_id, status_id, incomplete } => {
            let effect = catalog
                .add_action_status_effect(actor, action_id, step_id, status_id, !incomplete)
                .await?;
            let message = format!(
                "Action {action_id} on step {step_id} now marks status {status_id} {}",
                if effect.sets_complete { "complete" } else { "incomplete" }
            );
            output(&ActionOutput::new(message, effect), json_mode);
        }

        ActionCommands::List { step_id } => {
            let actions = catalog.list_actions_for_step(actor, step_id).await?;
            output(&ActionListOutput { step_id, actions }, json_mode);
        }
    }

    Ok(())
}
