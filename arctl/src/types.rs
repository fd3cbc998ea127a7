//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs ([`AccountId`], [`BroadcastId`])
//! - The [`PermissionSet`] carried by every authenticated caller
//! - Resource and operation enums for access control
//!
//! # Permission System
//!
//! A caller's permissions are a map from a resource name to the list of action names that
//! are granted on it:
//!
//! ```json
//! { "broadcast": ["read", "update_partially"], "account": ["read"] }
//! ```
//!
//! The check is literal: an action is allowed iff the resource is present and
//! its list contains the action name. There is no implication between actions, so `update`
//! does not grant `update_partially`.
//!
//! The typed layer on top of the names:
//!
//! - [`Resource`]: What entity type is being accessed (Accounts, Broadcasts)
//! - [`Operation`]: What action is being performed (Read, UpdatePartially, ...)
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! ## Example Permission Check
//!
//! ```
//! use arctl::types::{Operation, PermissionSet, Resource};
//!
//! let mut permissions = PermissionSet::default();
//! permissions.grant(Resource::Broadcasts, Operation::UpdatePartially);
//!
//! assert!(permissions.allows("broadcast", "update_partially"));
//! assert!(!permissions.allows("broadcast", "delete"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type AccountId = Uuid;
pub type BroadcastId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    UpdatePartially,
    Delete,
}

impl Operation {
    /// Action name as it appears in a permission set
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::UpdatePartially => "update_partially",
            Operation::Delete => "delete",
        }
    }
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Accounts,
    Broadcasts,
}

impl Resource {
    /// Resource name as it appears in a permission set
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Accounts => "account",
            Resource::Broadcasts => "broadcast",
        }
    }
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::UpdatePartially => write!(f, "partially update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions granted to a caller, keyed by resource name.
///
/// Stored as JSONB on the account row and carried verbatim in session tokens, so unknown
/// resource and action names survive a round trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, Vec<String>>);

impl PermissionSet {
    pub fn new(grants: BTreeMap<String, Vec<String>>) -> Self {
        Self(grants)
    }

    /// Whether `action` is granted on `resource`.
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .is_some_and(|actions| actions.iter().any(|granted| granted == action))
    }

    /// Grant a typed operation, keeping the action list free of duplicates.
    pub fn grant(&mut self, resource: Resource, operation: Operation) {
        let actions = self.0.entry(resource.as_str().to_string()).or_default();
        if !actions.iter().any(|a| a == operation.as_str()) {
            actions.push(operation.as_str().to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<R: Into<String>, A: Into<String>> FromIterator<(R, Vec<A>)> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = (R, Vec<A>)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(resource, actions)| (resource.into(), actions.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast_editor() -> PermissionSet {
        [("broadcast", vec!["read", "update_partially"])].into_iter().collect()
    }

    #[test]
    fn test_allows_granted_action() {
        let permissions = broadcast_editor();
        assert!(permissions.allows("broadcast", "update_partially"));
        assert!(permissions.allows("broadcast", "read"));
    }

    #[test]
    fn test_denies_missing_resource_and_action() {
        let permissions = broadcast_editor();
        assert!(!permissions.allows("account", "read"));
        assert!(!permissions.allows("broadcast", "delete"));
        assert!(!PermissionSet::default().allows("broadcast", "read"));
    }

    #[test]
    fn test_no_implication_between_actions() {
        let permissions: PermissionSet = [("broadcast", vec!["update"])].into_iter().collect();
        assert!(!permissions.allows("broadcast", "update_partially"));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut permissions = PermissionSet::default();
        permissions.grant(Resource::Accounts, Operation::Read);
        permissions.grant(Resource::Accounts, Operation::Read);

        let json = serde_json::to_value(&permissions).unwrap();
        assert_eq!(json, serde_json::json!({ "account": ["read"] }));
    }

    #[test]
    fn test_unknown_names_round_trip() {
        let json = serde_json::json!({ "playlist": ["reorder"] });
        let permissions: PermissionSet = serde_json::from_value(json.clone()).unwrap();
        assert!(permissions.allows("playlist", "reorder"));
        assert_eq!(serde_json::to_value(&permissions).unwrap(), json);
    }

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
