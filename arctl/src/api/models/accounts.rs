//! API request/response models for accounts.

use crate::db::models::accounts::AccountDBResponse;
use crate::types::{AccountId, PermissionSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An API caller and the permissions granted to them
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Actions granted per resource, e.g. `{"broadcast": ["read", "update_partially"]}`
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The whole account list. Not paginated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountList {
    pub results: Vec<AccountResponse>,
}

impl From<AccountDBResponse> for AccountResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            permissions: db.permissions,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
