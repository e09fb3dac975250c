//! Role classification and the user modification matrix.
//!
//! Roles form a strict hierarchy: `super_admin > admin > customer`. Role
//! strings coming from storage are parsed leniently; anything unrecognized
//! is treated as the least-privileged role.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }

    /// Parse a stored role string. Unknown values map to `Customer`.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "super_admin" => Self::SuperAdmin,
            "admin" => Self::Admin,
            _ => Self::Customer,
        }
    }

    /// Whether this role belongs to the admin tier.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Whether a user with this role may modify a user with `target`.
    ///
    /// | actor \ target | super_admin | admin | customer |
    /// |---|---|---|---|
    /// | super_admin | no  | yes | yes |
    /// | admin       | no  | no  | yes |
    /// | customer    | no  | no  | no  |
    pub fn can_modify(&self, target: Role) -> bool {
        match self {
            Self::SuperAdmin => target != Self::SuperAdmin,
            Self::Admin => target == Self::Customer,
            Self::Customer => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Whether `role` is admin-tier.
pub fn is_admin_role(role: Role) -> bool {
    role.is_admin()
}

pub fn is_super_admin(role: Role) -> bool {
    role.is_super_admin()
}

/// Whether `actor` may modify a user holding `target`.
pub fn can_modify_user(actor: Role, target: Role) -> bool {
    actor.can_modify(target)
}
