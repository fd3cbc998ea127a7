//! API response model for the caller's session.

use crate::auth::current_user::CurrentUser;
use crate::types::{AccountId, PermissionSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who the caller is and what they may do. A UI reads `permissions` to decide which
/// affordances to show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub username: String,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
}

impl From<CurrentUser> for SessionInfo {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            permissions: user.permissions,
        }
    }
}
