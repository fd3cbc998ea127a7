//! API request/response models for broadcasts.

use super::pagination::Pagination;
use crate::db::models::broadcasts::BroadcastDBResponse;
use crate::types::BroadcastId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Longest title a broadcast may carry, in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// An archived broadcast as shown on the archive page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BroadcastResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BroadcastId,
    pub title: String,
    pub aired_on: NaiveDate,
    pub like_count: i64,
    pub listener_peak_count: i64,
    pub archive_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the caller may edit this broadcast (`broadcast:update_partially`)
    pub editable: bool,
}

impl BroadcastResponse {
    pub fn new(db: BroadcastDBResponse, editable: bool) -> Self {
        Self {
            id: db.id,
            title: db.title,
            aired_on: db.aired_on,
            like_count: db.like_count,
            listener_peak_count: db.listener_peak_count,
            archive_url: db.archive_url,
            created_at: db.created_at,
            updated_at: db.updated_at,
            editable,
        }
    }
}

/// Partial update of a broadcast. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BroadcastUpdate {
    /// New title; surrounding whitespace is trimmed, 1 to 200 characters remain
    pub title: Option<String>,
}

impl BroadcastUpdate {
    /// Check the update, returning a message suitable for a 400 response.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            let length = title.trim().chars().count();
            if length == 0 {
                return Err("Title must not be blank".to_string());
            }
            if length > MAX_TITLE_LENGTH {
                return Err(format!("Title must be at most {MAX_TITLE_LENGTH} characters"));
            }
        }
        Ok(())
    }
}

/// Query parameters for listing broadcasts
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListBroadcastsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
