//! Database models for accounts.

use crate::types::{AccountId, PermissionSet};
use chrono::{DateTime, Utc};

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub permissions: PermissionSet,
}

/// Database request for updating an account. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdateDBRequest {
    pub display_name: Option<String>,
    pub permissions: Option<PermissionSet>,
}

/// Database response for an account
#[derive(Debug, Clone)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
