//! Database repository for broadcasts.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::broadcasts::{BroadcastCreateDBRequest, BroadcastDBResponse, BroadcastUpdateDBRequest},
};
use crate::types::{BroadcastId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing broadcasts
#[derive(Debug, Clone)]
pub struct BroadcastFilter {
    pub skip: i64,
    pub limit: i64,
}

impl BroadcastFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Broadcast {
    pub id: BroadcastId,
    pub title: String,
    pub aired_on: NaiveDate,
    pub like_count: i64,
    pub listener_peak_count: i64,
    pub archive_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Broadcast> for BroadcastDBResponse {
    fn from(b: Broadcast) -> Self {
        Self {
            id: b.id,
            title: b.title,
            aired_on: b.aired_on,
            like_count: b.like_count,
            listener_peak_count: b.listener_peak_count,
            archive_url: b.archive_url,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

const BROADCAST_COLUMNS: &str =
    "id, title, aired_on, like_count, listener_peak_count, archive_url, created_at, updated_at";

pub struct Broadcasts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Broadcasts<'c> {
    type CreateRequest = BroadcastCreateDBRequest;
    type UpdateRequest = BroadcastUpdateDBRequest;
    type Response = BroadcastDBResponse;
    type Id = BroadcastId;
    type Filter = BroadcastFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let broadcast = sqlx::query_as::<_, Broadcast>(&format!(
            r#"
            INSERT INTO broadcasts (id, title, aired_on, like_count, listener_peak_count, archive_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BROADCAST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(request.aired_on)
        .bind(request.like_count)
        .bind(request.listener_peak_count)
        .bind(&request.archive_url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(broadcast.into())
    }

    #[instrument(skip(self), fields(broadcast_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let broadcast =
            sqlx::query_as::<_, Broadcast>(&format!("SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(broadcast.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let broadcasts = sqlx::query_as::<_, Broadcast>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts ORDER BY aired_on DESC, title LIMIT $1 OFFSET $2"
        ))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(broadcasts.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(broadcast_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM broadcasts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(broadcast_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let broadcast = sqlx::query_as::<_, Broadcast>(&format!(
            r#"
            UPDATE broadcasts SET
                title = COALESCE($2, title),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BROADCAST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.title)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(broadcast.into())
    }
}

impl<'c> Broadcasts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total number of archived broadcasts
    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM broadcasts")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }
}
