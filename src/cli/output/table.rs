//! Table output formatting for CLI commands
//!
//! Circuits, statuses, steps, transitions and history rendered with comfy-table.
//! Colors are dropped when `NO_COLOR` is set or the terminal is dumb.

use crate::domain::models::{
    AvailableTransition, Circuit, DocumentCircuitHistory, DocumentLifecycle, DocumentStatus, Status,
    Step,
};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::{flag, truncate};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    pub fn format_circuits(&self, circuits: &[Circuit]) -> String {
        let mut table = self.create_base_table(&["ID", "Key", "Title", "Active", "Ordered", "Backtrack"]);

        for circuit in circuits {
            let active = if self.use_colors {
                let (text, color) = if circuit.is_active {
                    ("active", Color::Green)
                } else {
                    ("inactive", Color::DarkGrey)
                };
                Cell::new(text).fg(color)
            } else {
                Cell::new(if circuit.is_active { "active" } else { "inactive" })
            };

            table.add_row(vec![
                Cell::new(circuit.id),
                Cell::new(&circuit.key),
                Cell::new(truncate(&circuit.title, 40)),
                active,
                Cell::new(flag(circuit.has_ordered_flow, "yes")),
                Cell::new(flag(circuit.allow_backtrack, "yes")),
            ]);
        }

        table.to_string()
    }

    pub fn format_statuses(&self, statuses: &[Status]) -> String {
        let mut table = self.create_base_table(&["ID", "Key", "Title", "Step", "Flags"]);

        for status in statuses {
            table.add_row(vec![
                Cell::new(status.id),
                Cell::new(&status.key),
                Cell::new(truncate(&status.title, 30)),
                Cell::new(status.step_id.map_or_else(|| "-".to_string(), |id| id.to_string())),
                Cell::new(status_flags(status)),
            ]);
        }

        table.to_string()
    }

    pub fn format_steps(&self, steps: &[Step]) -> String {
        let mut table =
            self.create_base_table(&["#", "ID", "Key", "Title", "Edge", "Prev", "Next", "Role"]);

        for step in steps {
            let edge = match step.edge() {
                Some((from, to)) => format!("{from} -> {to}"),
                None => "-".to_string(),
            };
            let order = if step.is_final_step {
                format!("{} (final)", step.order_index)
            } else {
                step.order_index.to_string()
            };

            table.add_row(vec![
                Cell::new(order),
                Cell::new(step.id),
                Cell::new(&step.key),
                Cell::new(truncate(&step.title, 30)),
                Cell::new(edge),
                Cell::new(optional_id(step.prev_step_id)),
                Cell::new(optional_id(step.next_step_id)),
                Cell::new(step.responsible_role.map_or("-", |r| r.as_str())),
            ]);
        }

        table.to_string()
    }

    pub fn format_transitions(&self, transitions: &[AvailableTransition]) -> String {
        let mut table = self.create_base_table(&["Status", "Key", "Title", "Via", "Kind"]);

        for t in transitions {
            let kind = match (t.via_step_id.is_some(), t.is_flexible) {
                (true, _) => "edge",
                (false, true) => "flexible",
                (false, false) => "-",
            };
            let key = if self.use_colors && t.is_final {
                Cell::new(&t.status_key).fg(Color::Green)
            } else {
                Cell::new(&t.status_key)
            };

            table.add_row(vec![
                Cell::new(t.status_id),
                key,
                Cell::new(truncate(&t.title, 30)),
                Cell::new(optional_id(t.via_step_id)),
                Cell::new(kind),
            ]);
        }

        table.to_string()
    }

    pub fn format_completions(&self, completions: &[DocumentStatus]) -> String {
        let mut table = self.create_base_table(&["Status", "Complete", "By", "At"]);

        for record in completions {
            let complete = if self.use_colors {
                let color = if record.is_complete { Color::Green } else { Color::Yellow };
                Cell::new(if record.is_complete { "yes" } else { "no" }).fg(color)
            } else {
                Cell::new(if record.is_complete { "yes" } else { "no" })
            };

            table.add_row(vec![
                Cell::new(record.status_id),
                complete,
                Cell::new(optional_id(record.completed_by_user_id)),
                Cell::new(
                    record
                        .completed_at
                        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                ),
            ]);
        }

        table.to_string()
    }

    pub fn format_history(&self, history: &[DocumentCircuitHistory]) -> String {
        let mut table =
            self.create_base_table(&["When", "User", "Step", "Status", "Action", "Approved", "Comments"]);

        for entry in history {
            let approved = if self.use_colors && !entry.is_approved {
                Cell::new("no").fg(Color::Red)
            } else {
                Cell::new(if entry.is_approved { "yes" } else { "no" })
            };

            table.add_row(vec![
                Cell::new(entry.processed_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
                Cell::new(entry.processed_by_user_id),
                Cell::new(if entry.step_id == 0 { "-".to_string() } else { entry.step_id.to_string() }),
                Cell::new(optional_id(entry.status_id)),
                Cell::new(optional_id(entry.action_id)),
                approved,
                Cell::new(truncate(&entry.comments, 40)),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
            );

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Human label of a document's lifecycle state.
pub fn lifecycle_label(lifecycle: DocumentLifecycle) -> &'static str {
    match lifecycle {
        DocumentLifecycle::Draft => "draft",
        DocumentLifecycle::InProgress => "in progress",
        DocumentLifecycle::Completed => "completed",
        DocumentLifecycle::Rejected => "rejected",
    }
}

fn status_flags(status: &Status) -> String {
    [
        (status.is_initial, "initial"),
        (status.is_final, "final"),
        (status.is_flexible, "flexible"),
        (status.is_required, "required"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}

fn optional_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
