//! Command-line interface.
//!
//! The CLI is the request layer of the engine: it turns `--user-id`/`--role`
//! into an [`Actor`], opens the configured database and maps
//! [`DomainError`] kinds to exit codes.

pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};
use serde_json::json;

use crate::domain::errors::{DomainError, ErrorKind};
use crate::domain::models::{Actor, Role};

pub use context::AppContext;

#[derive(Parser, Debug)]
#[command(name = "circuitflow")]
#[command(about = "Document approval circuits and their workflow engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Id of the acting user
    #[arg(long, global = true, env = "CIRCUITFLOW_USER_ID", default_value_t = 1)]
    pub user_id: i64,

    /// Role of the acting user (admin, full_user, simple_user)
    #[arg(long, global = true, env = "CIRCUITFLOW_ROLE", default_value = "admin", value_parser = parse_role)]
    pub role: Role,
}

impl Cli {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .circuitflow/ with a default config and an empty database
    Init(commands::init::InitArgs),
    /// Manage circuits
    Circuit(commands::circuit::CircuitArgs),
    /// Manage the statuses of a circuit
    Status(commands::status::StatusArgs),
    /// Manage the steps (edges) of a circuit
    Step(commands::step::StepArgs),
    /// Manage actions and their effects
    Action(commands::action::ActionArgs),
    /// Move documents through circuits
    Document(commands::document::DocumentArgs),
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("unknown role '{s}' (admin, full_user, simple_user)"))
}

/// Process exit code for an error kind.
pub fn exit_code(kind: Option<ErrorKind>) -> i32 {
    match kind {
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::InvalidOperation) => 4,
        Some(ErrorKind::Unauthorized) => 5,
        Some(ErrorKind::Conflict) => 6,
        Some(ErrorKind::Internal) | None => 1,
    }
}

/// Report `err` on stderr (or stdout as JSON) and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = err.downcast_ref::<DomainError>().map(DomainError::kind);

    if json_mode {
        let body = json!({
            "success": false,
            "error": format!("{err:#}"),
            "kind": kind.map(ErrorKind::as_str),
            "status_code": kind.map(ErrorKind::status_code),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }

    std::process::exit(exit_code(kind));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_actor_flags() {
        let cli = Cli::try_parse_from([
            "circuitflow",
            "document",
            "status",
            "3",
            "--user-id",
            "42",
            "--role",
            "simple-user",
        ])
        .unwrap();
        let actor = cli.actor();
        assert_eq!(actor.user_id, 42);
        assert_eq!(actor.role, Role::SimpleUser);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = Cli::try_parse_from(["circuitflow", "--role", "root", "circuit", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_codes_follow_kind() {
        assert_eq!(exit_code(Some(DomainError::DocumentNotFound(1).kind())), 3);
        assert_eq!(exit_code(Some(DomainError::invalid("x").kind())), 4);
        assert_eq!(exit_code(None), 1);
    }
}
