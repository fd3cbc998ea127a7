//! Permission checks.
//!
//! [`is_allowed`] is the single rule every check reduces to: an action is allowed iff the
//! caller's permission set lists it under the resource. Handlers state what they need in their
//! signature with [`RequiresPermission`]:
//!
//! ```ignore
//! async fn update_broadcast(
//!     State(state): State<AppState>,
//!     current: RequiresPermission<resource::Broadcasts, operation::UpdatePartially>,
//!     // ...
//! ) -> Result<Json<BroadcastResponse>> {
//!     let user = current.user;
//!     // ...
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};

use crate::{
    AppState,
    auth::current_user::CurrentUser,
    errors::{Error, Result},
    types::{Operation, Permission, PermissionSet, Resource},
};

/// Whether `action` is granted on `resource`.
pub fn is_allowed(permissions: &PermissionSet, resource: &str, action: &str) -> bool {
    permissions.allows(resource, action)
}

/// Typed form of [`is_allowed`] for an authenticated caller.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    is_allowed(&user.permissions, resource.as_str(), operation.as_str())
}

/// Fail with 403 unless the caller holds the permission.
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        debug!(user_id = %user.id, %resource, action = operation.as_str(), "Permission denied");
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Type-level resource markers for [`RequiresPermission`]
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceType: Send + Sync {
        const RESOURCE: Resource;
    }

    pub struct Accounts;
    pub struct Broadcasts;

    impl ResourceType for Accounts {
        const RESOURCE: Resource = Resource::Accounts;
    }

    impl ResourceType for Broadcasts {
        const RESOURCE: Resource = Resource::Broadcasts;
    }
}

/// Type-level operation markers for [`RequiresPermission`]
pub mod operation {
    use crate::types::Operation;

    pub trait OperationType: Send + Sync {
        const OPERATION: Operation;
    }

    pub struct Create;
    pub struct Read;
    pub struct Update;
    pub struct UpdatePartially;
    pub struct Delete;

    impl OperationType for Create {
        const OPERATION: Operation = Operation::Create;
    }

    impl OperationType for Read {
        const OPERATION: Operation = Operation::Read;
    }

    impl OperationType for Update {
        const OPERATION: Operation = Operation::Update;
    }

    impl OperationType for UpdatePartially {
        const OPERATION: Operation = Operation::UpdatePartially;
    }

    impl OperationType for Delete {
        const OPERATION: Operation = Operation::Delete;
    }
}

/// Extractor that authenticates the caller (401 otherwise) and then requires them to hold
/// `O` on `R` (403 otherwise).
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceType,
    O: operation::OperationType,
{
    type Rejection = Error;

    #[instrument(skip_all, fields(resource = R::RESOURCE.as_str(), action = O::OPERATION.as_str()))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        require_permission(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;

    #[test]
    fn test_is_allowed_requires_resource_and_action() {
        let permissions: PermissionSet = [("broadcast", vec!["read", "update_partially"])].into_iter().collect();

        assert!(is_allowed(&permissions, "broadcast", "update_partially"));
        assert!(!is_allowed(&permissions, "broadcast", "delete"));
        assert!(!is_allowed(&permissions, "account", "read"));
        assert!(!is_allowed(&PermissionSet::default(), "broadcast", "read"));
    }

    #[test]
    fn test_update_does_not_imply_partial_update() {
        let user = create_test_user(&[(Resource::Broadcasts, Operation::Update)]);

        assert!(has_permission(&user, Resource::Broadcasts, Operation::Update));
        assert!(!has_permission(&user, Resource::Broadcasts, Operation::UpdatePartially));
    }

    #[test]
    fn test_require_permission_reports_what_was_missing() {
        let user = create_test_user(&[(Resource::Broadcasts, Operation::Read)]);

        assert!(require_permission(&user, Resource::Broadcasts, Operation::Read).is_ok());
        match require_permission(&user, Resource::Accounts, Operation::Read) {
            Err(Error::InsufficientPermissions { required, resource, .. }) => {
                assert_eq!(required, Permission::Allow(Resource::Accounts, Operation::Read));
                assert_eq!(resource, "account");
            }
            other => panic!("expected InsufficientPermissions, got {other:?}"),
        }
    }
}
