//! HTTP handlers for account endpoints.

use crate::{
    AppState,
    api::models::accounts::{AccountList, AccountResponse},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{Accounts, Repository, accounts::AccountFilter},
    },
    errors::{Error, Result},
};
use axum::{extract::State, response::Json};

#[utoipa::path(
    get,
    path = "/accounts",
    tag = "accounts",
    summary = "List accounts",
    description = "List every account with its permission set, ordered by username. Requires `account:read`.",
    responses(
        (status = 200, description = "All accounts", body = AccountList),
        (status = 401, description = "No valid session", body = crate::errors::ErrorBody),
        (status = 403, description = "Missing `account:read`", body = crate::errors::ErrorBody),
        (status = 503, description = "Database unavailable", body = crate::errors::ErrorBody),
    ),
    security(("cookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Accounts, operation::Read>,
) -> Result<Json<AccountList>> {
    let pool = state.pools.acquire().await;
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;

    let accounts = Accounts::new(&mut conn).list(&AccountFilter).await?;

    Ok(Json(AccountList {
        results: accounts.into_iter().map(AccountResponse::from).collect(),
    }))
}
