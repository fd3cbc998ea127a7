//! Database repository for accounts.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountUpdateDBRequest},
};
use crate::types::{AccountId, PermissionSet, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing accounts. The account list is served whole, so there is nothing to filter
/// on yet.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub permissions: Json<PermissionSet>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountDBResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            display_name: account.display_name,
            permissions: account.permissions.0,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, display_name, permissions, created_at, updated_at";

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type UpdateRequest = AccountUpdateDBRequest;
    type Response = AccountDBResponse;
    type Id = AccountId;
    type Filter = AccountFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (id, username, email, display_name, permissions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(Json(&request.permissions))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account.into())
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account.map(Into::into))
    }

    #[instrument(skip(self, _filter), err)]
    async fn list(&mut self, _filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let accounts = sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(accounts.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts SET
                display_name = COALESCE($2, display_name),
                permissions = COALESCE($3, permissions),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.display_name)
        .bind(request.permissions.as_ref().map(Json))
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(account.into())
    }
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, username), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"))
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Operation, Resource};
    use sqlx::PgPool;

    fn account_request(username: &str) -> AccountCreateDBRequest {
        AccountCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            display_name: None,
            permissions: PermissionSet::default(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_create_and_get_account(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let mut request = account_request("presenter");
        request.permissions.grant(Resource::Broadcasts, Operation::UpdatePartially);
        let created = repo.create(&request).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().expect("account exists");
        assert_eq!(fetched.username, "presenter");
        assert_eq!(fetched.email, "presenter@example.com");
        assert!(fetched.permissions.allows("broadcast", "update_partially"));

        let by_name = repo.get_by_username("presenter").await.unwrap().expect("account exists");
        assert_eq!(by_name.id, created.id);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_list_accounts_ordered_by_username(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        for name in ["zoe", "adam", "mira"] {
            repo.create(&account_request(name)).await.unwrap();
        }

        let accounts = repo.list(&AccountFilter).await.unwrap();
        let names: Vec<_> = accounts.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["adam", "mira", "zoe"]);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        repo.create(&account_request("dj")).await.unwrap();
        let mut duplicate = account_request("dj");
        duplicate.email = "other@example.com".to_string();

        let err = repo.create(&duplicate).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_update_permissions_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);
        let created = repo.create(&account_request("editor")).await.unwrap();

        let mut permissions = PermissionSet::default();
        permissions.grant(Resource::Accounts, Operation::Read);
        let updated = repo
            .update(
                created.id,
                &AccountUpdateDBRequest {
                    display_name: None,
                    permissions: Some(permissions),
                },
            )
            .await
            .unwrap();
        assert!(updated.permissions.allows("account", "read"));
        assert_eq!(updated.display_name, None);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(matches!(
            repo.update(created.id, &AccountUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }
}
