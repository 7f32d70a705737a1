// 🧭 Store Routing - which database owns which kind of data
//
// Reads always consult both stores through the resolver; this mapping only
// decides where writes, migrations and user lookups go.

use crate::error::{CertError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// STORE ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreRole {
    /// The "default" database, wins on identifier collisions
    Primary,

    /// The second database, consulted after primary
    Secondary,
}

impl StoreRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreRole::Primary => "primary",
            StoreRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreRole {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "default" => Ok(StoreRole::Primary),
            "secondary" => Ok(StoreRole::Secondary),
            other => Err(CertError::Config {
                key: "store role".to_string(),
                message: format!("unknown store '{}'", other),
            }),
        }
    }
}

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Owner,
    User,
}

// ============================================================================
// ROUTING TABLE
// ============================================================================

/// Entity kind → store mapping, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRouting {
    routes: HashMap<EntityKind, StoreRole>,
}

impl Default for StoreRouting {
    fn default() -> Self {
        Self::new(StoreRole::Primary, StoreRole::Primary)
    }
}

impl StoreRouting {
    pub fn new(owners: StoreRole, users: StoreRole) -> Self {
        let mut routes = HashMap::new();
        routes.insert(EntityKind::Owner, owners);
        routes.insert(EntityKind::User, users);
        Self { routes }
    }

    /// Store that receives writes for this entity kind
    pub fn store_for(&self, kind: EntityKind) -> StoreRole {
        self.routes.get(&kind).copied().unwrap_or(StoreRole::Primary)
    }

    /// Whether `role` should carry the table for `kind`.
    /// Owner tables exist in both stores since both are read.
    pub fn allow_migrate(&self, role: StoreRole, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Owner => true,
            EntityKind::User => self.store_for(EntityKind::User) == role,
        }
    }
}
