//! Session collaborator used for "my records" scoping and role checks.
//!
//! Credential issuance lives outside this crate; views only ask who is
//! signed in and which roles they hold.

use crate::types::OwnerId;

/// Read-only view of the signed-in user.
pub trait Session {
    /// Identifier of the signed-in team member, if any.
    fn current_user(&self) -> Option<&str>;
    /// Returns `true` when the signed-in user holds `role`.
    fn has_role(&self, role: &str) -> bool;
}

/// Fixed session, used by tests and demos.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticSession {
    user: Option<OwnerId>,
    roles: Vec<String>,
}

impl StaticSession {
    pub fn signed_in(user: impl Into<OwnerId>, roles: Vec<String>) -> Self {
        Self {
            user: Some(user.into()),
            roles,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl Session for StaticSession {
    fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn has_role(&self, role: &str) -> bool {
        self.user.is_some() && self.roles.iter().any(|held| held == role)
    }
}
