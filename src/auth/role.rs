//! Reviewer roles

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a signed-in user may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reviews records from the queue
    #[default]
    Reviewer,

    /// Reviewer plus queue statistics and maintenance
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a free-form role name.
///
/// Unknown or empty names fall back to [`Role::Reviewer`]. The user named
/// `admin` is always an administrator.
pub fn normalize_role(username: &str, role: &str) -> Role {
    if username.trim().eq_ignore_ascii_case("admin") {
        return Role::Admin;
    }
    match role.trim().to_lowercase().as_str() {
        "admin" | "administrador" | "administrator" => Role::Admin,
        _ => Role::Reviewer,
    }
}
