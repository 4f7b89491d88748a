// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The `Principal` is the only identity concept the core consumes; it is
//! produced by an authentication adapter outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalType {
    Admin,
    ApiKey,
    Anon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Share,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    pub id: String,
    pub permissions: HashSet<Permission>,
    /// A normalised virtual path every resolved path must fall under. `None`
    /// for principals with no restriction (always true for `Admin`).
    pub allowed_base_path: Option<String>,
}

impl Principal {
    pub fn admin(id: impl Into<String>) -> Self {
        Principal {
            principal_type: PrincipalType::Admin,
            id: id.into(),
            permissions: HashSet::from([
                Permission::Read,
                Permission::Write,
                Permission::Delete,
                Permission::Share,
                Permission::Admin,
            ]),
            allowed_base_path: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.principal_type, PrincipalType::Admin)
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.is_admin() || self.permissions.contains(&permission)
    }

    /// Whether `path` (already normalised) falls within this principal's
    /// restriction, if any.
    pub fn permits_path(&self, path: &str) -> bool {
        if self.is_admin() {
            return true;
        }
        match &self.allowed_base_path {
            None => true,
            Some(base) => path == base || path.starts_with(&format!("{base}/")) || base == "/",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bypasses_base_path() {
        let p = Principal::admin("root");
        assert!(p.permits_path("/anything/at/all"));
    }

    #[test]
    fn api_key_restricted_to_base() {
        let p = Principal {
            principal_type: PrincipalType::ApiKey,
            id: "k1".into(),
            permissions: HashSet::from([Permission::Read]),
            allowed_base_path: Some("/team-a".into()),
        };
        assert!(p.permits_path("/team-a/docs/file.txt"));
        assert!(!p.permits_path("/team-b/docs/file.txt"));
        assert!(!p.permits_path("/team-abc/file.txt"));
    }
}
