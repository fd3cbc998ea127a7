//! Database models for broadcasts.

use crate::api::models::broadcasts::BroadcastUpdate;
use crate::types::BroadcastId;
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for archiving a new broadcast
#[derive(Debug, Clone)]
pub struct BroadcastCreateDBRequest {
    pub title: String,
    pub aired_on: NaiveDate,
    pub like_count: i64,
    pub listener_peak_count: i64,
    pub archive_url: Option<String>,
}

/// Database request for a partial update of a broadcast
#[derive(Debug, Clone, Default)]
pub struct BroadcastUpdateDBRequest {
    pub title: Option<String>,
}

impl From<BroadcastUpdate> for BroadcastUpdateDBRequest {
    fn from(update: BroadcastUpdate) -> Self {
        Self {
            title: update.title.map(|title| title.trim().to_string()),
        }
    }
}

/// Database response for a broadcast
#[derive(Debug, Clone)]
pub struct BroadcastDBResponse {
    pub id: BroadcastId,
    pub title: String,
    pub aired_on: NaiveDate,
    pub like_count: i64,
    pub listener_peak_count: i64,
    pub archive_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
