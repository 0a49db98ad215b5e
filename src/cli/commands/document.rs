//! Document workflow CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::table::lifecycle_label;
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::{
    AvailableTransition, Document, DocumentCircuitHistory, DocumentWorkflowStatus,
};
use crate::services::ActionOutcome;

#[derive(Args, Debug)]
pub struct DocumentArgs {
    #[command(subcommand)]
    pub command: DocumentCommands,
}

#[derive(Subcommand, Debug)]
pub enum DocumentCommands {
    /// Register a document
    Create {
        title: String,
    },
    /// Enter a circuit at its initial status
    Assign {
        document_id: i64,
        circuit_id: i64,
    },
    /// Move forward along a declared step
    Move {
        document_id: i64,
        status_id: i64,
        #[arg(short, long, default_value = "")]
        comments: String,
    },
    /// Go back to an earlier or flexible status
    Return {
        document_id: i64,
        status_id: i64,
        #[arg(short, long, default_value = "")]
        comments: String,
    },
    /// Mark a status complete (or incomplete with --undo)
    Complete {
        document_id: i64,
        status_id: i64,
        #[arg(long)]
        undo: bool,
        #[arg(short, long, default_value = "")]
        comments: String,
    },
    /// Perform an action (approve by default)
    Act {
        document_id: i64,
        action_id: i64,
        /// Reject instead of approve
        #[arg(long)]
        reject: bool,
        #[arg(short, long, default_value = "")]
        comments: String,
    },
    /// List statuses the document can move to
    Transitions {
        document_id: i64,
    },
    /// Check whether a move to a status is allowed
    CanMove {
        document_id: i64,
        status_id: i64,
    },
    /// Show the document's workflow position
    Status {
        document_id: i64,
    },
    /// Show the document's history
    History {
        document_id: i64,
    },
    /// Delete a document with its records
    Delete {
        document_id: i64,
    },
}

impl CommandOutput for DocumentWorkflowStatus {
    fn to_human(&self) -> String {
        let doc = &self.document;
        let formatter = TableFormatter::new();
        let mut lines = vec![
            format!("Document: {} (id {})", doc.title, doc.id),
            format!("State: {}", lifecycle_label(doc.status)),
        ];

        match (&self.circuit_key, &self.circuit_title) {
            (Some(key), Some(title)) => lines.push(format!("Circuit: {title} ({key})")),
            _ => lines.push("Circuit: not assigned".to_string()),
        }
        if let Some(status) = &self.current_status {
            lines.push(format!("Current status: {} [{}]", status.title, status.key));
        }
        if doc.is_circuit_completed {
            lines.push("Circuit completed".to_string());
        }

        if !self.completions.is_empty() {
            lines.push("\nCompletion:".to_string());
            lines.push(formatter.format_completions(&self.completions));
        }
        if !self.available_transitions.is_empty() {
            lines.push("\nAvailable transitions:".to_string());
            lines.push(formatter.format_transitions(&self.available_transitions));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionListOutput {
    pub document_id: i64,
    pub transitions: Vec<AvailableTransition>,
}

impl CommandOutput for TransitionListOutput {
    fn to_human(&self) -> String {
        if self.transitions.is_empty() {
            return format!("Document {} has no available transitions.", self.document_id);
        }
        TableFormatter::new().format_transitions(&self.transitions)
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub document_id: i64,
    pub entries: Vec<DocumentCircuitHistory>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return format!("Document {} has no history.", self.document_id);
        }
        TableFormatter::new().format_history(&self.entries)
    }
}

#[derive(Debug, Serialize)]
pub struct CanMoveOutput {
    pub document_id: i64,
    pub status_id: i64,
    pub allowed: bool,
}

impl CommandOutput for CanMoveOutput {
    fn to_human(&self) -> String {
        format!(
            "Document {} {} move to status {}",
            self.document_id,
            if self.allowed { "can" } else { "cannot" },
            self.status_id
        )
    }
}

impl CommandOutput for ActionOutcome {
    fn to_human(&self) -> String {
        let doc = &self.document;
        if !self.approved {
            return format!("Action rejected; document {} is now rejected", doc.id);
        }
        let mut message = format!("Action approved for document {}", doc.id);
        if self.effects_applied > 0 {
            message.push_str(&format!(", {} status effect(s) applied", self.effects_applied));
        }
        if let Some(target) = self.advanced_to {
            message.push_str(&format!(", advanced to status {target}"));
        }
        message
    }
}

fn moved(document: Document, verb: &str) -> ActionOutput<Document> {
    let mut message = format!(
        "Document {} {verb} status {}",
        document.id,
        document.current_status_id.unwrap_or_default()
    );
    if document.is_circuit_completed {
        message.push_str("; circuit completed");
    }
    ActionOutput::new(message, document)
}

pub async fn execute(args: DocumentArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let actor = &ctx.actor;
    let engine = &ctx.engine;

    match args.command {
        DocumentCommands::Create { title } => {
            let document = engine.create_document(actor, &title).await?;
            let message = format!("Document created: {}", document.id);
            output(&ActionOutput::new(message, document), json_mode);
        }

        DocumentCommands::Assign { document_id, circuit_id } => {
            let document = engine
                .assign_document_to_circuit(actor, document_id, circuit_id)
                .await?;
            output(&moved(document, "entered"), json_mode);
        }

        DocumentCommands::Move { document_id, status_id, comments } => {
            let document = engine
                .move_to_next_status(actor, document_id, status_id, &comments)
                .await?;
            output(&moved(document, "moved to"), json_mode);
        }

        DocumentCommands::Return { document_id, status_id, comments } => {
            let document = engine
                .return_to_previous_status(actor, document_id, status_id, &comments)
                .await?;
            output(&moved(document, "returned to"), json_mode);
        }

        DocumentCommands::Complete { document_id, status_id, undo, comments } => {
            let document = engine
                .complete_document_status(actor, document_id, status_id, !undo, &comments)
                .await?;
            let message = format!(
                "Status {status_id} of document {document_id} marked {}",
                if undo { "incomplete" } else { "complete" }
            );
            output(&ActionOutput::new(message, document), json_mode);
        }

        DocumentCommands::Act { document_id, action_id, reject, comments } => {
            let outcome = engine
                .process_action(actor, document_id, action_id, &comments, !reject)
                .await?;
            output(&outcome, json_mode);
        }

        DocumentCommands::Transitions { document_id } => {
            let transitions = engine.get_available_transitions(actor, document_id).await?;
            output(&TransitionListOutput { document_id, transitions }, json_mode);
        }

        DocumentCommands::CanMove { document_id, status_id } => {
            let allowed = engine.can_move_to_status(actor, document_id, status_id).await?;
            output(&CanMoveOutput { document_id, status_id, allowed }, json_mode);
        }

        DocumentCommands::Status { document_id } => {
            let status = engine.get_workflow_status(actor, document_id).await?;
            output(&status, json_mode);
        }

        DocumentCommands::History { document_id } => {
            let entries = engine.get_history(actor, document_id).await?;
            output(&HistoryOutput { document_id, entries }, json_mode);
        }

        DocumentCommands::Delete { document_id } => {
            let deleted = engine.delete_document(actor, document_id).await?;
            let message = if deleted {
                format!("Document deleted: {document_id}")
            } else {
                format!("Document {document_id} did not exist")
            };
            output(&ActionOutput::new(message, deleted), json_mode);
        }
    }

    Ok(())
}
