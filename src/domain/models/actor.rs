//! Caller identity and capability checks.
//!
//! The request layer authenticates the caller and hands the engine an
//! [`Actor`]. Every write goes through [`Actor::authorize`].

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    FullUser,
    SimpleUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::FullUser => "full_user",
            Self::SimpleUser => "simple_user",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "admin" => Some(Self::Admin),
            "full_user" | "fulluser" => Some(Self::FullUser),
            "simple_user" | "simpleuser" => Some(Self::SimpleUser),
            _ => None,
        }
    }

    /// Whether this role holds the given capability.
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Self::Admin | Self::FullUser => true,
            Self::SimpleUser => matches!(
                capability,
                Capability::PerformAction | Capability::ViewWorkflow
            ),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something an actor may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create, edit and delete circuits, statuses, steps and actions.
    ManageCatalog,
    /// Assign, move, return, complete and delete documents.
    ExecuteWorkflow,
    /// Process actions on a document.
    PerformAction,
    /// Read workflow state and history.
    ViewWorkflow,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageCatalog => "manage_catalog",
            Self::ExecuteWorkflow => "execute_workflow",
            Self::PerformAction => "perform_action",
            Self::ViewWorkflow => "view_workflow",
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub is_active: bool,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role, is_active: true }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Single authorization predicate used by every service entry point.
    pub fn authorize(&self, capability: Capability) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::Unauthorized(format!(
                "User {} is inactive",
                self.user_id
            )));
        }
        if !self.role.grants(capability) {
            return Err(DomainError::Unauthorized(format!(
                "Role {} lacks {}",
                self.role,
                capability.as_str()
            )));
        }
        Ok(())
    }

    /// Whether the actor may act on a step owned by `role`.
    pub fn holds_role(&self, role: Role) -> bool {
        self.role == Role::Admin || self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("Admin"), Some(Role::Admin));
        assert_eq!(Role::from_str("FullUser"), Some(Role::FullUser));
        assert_eq!(Role::from_str("simple-user"), Some(Role::SimpleUser));
        assert_eq!(Role::from_str("guest"), None);
    }

    #[test]
    fn test_simple_user_capabilities() {
        let actor = Actor::new(5, Role::SimpleUser);
        assert!(actor.authorize(Capability::ViewWorkflow).is_ok());
        assert!(actor.authorize(Capability::PerformAction).is_ok());
        assert!(matches!(
            actor.authorize(Capability::ExecuteWorkflow),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(actor.authorize(Capability::ManageCatalog).is_err());
    }

    #[test]
    fn test_inactive_actor_denied() {
        let actor = Actor::new(1, Role::Admin).inactive();
        assert!(matches!(
            actor.authorize(Capability::ViewWorkflow),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_admin_holds_every_role() {
        let admin = Actor::new(1, Role::Admin);
        assert!(admin.holds_role(Role::SimpleUser));
        let full = Actor::new(2, Role::FullUser);
        assert!(!full.holds_role(Role::SimpleUser));
        assert!(full.holds_role(Role::FullUser));
    }
}
