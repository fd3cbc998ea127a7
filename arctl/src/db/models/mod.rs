//! Database record models matching table schemas.
//!
//! Database models are distinct from the API models in [`crate::api::models`] so the stored
//! and served representations can evolve independently. Conversions go through `From`:
//!
//! ```ignore
//! use arctl::api::models::accounts::AccountResponse;
//! use arctl::db::models::accounts::AccountDBResponse;
//!
//! let db_account: AccountDBResponse = /* ... */;
//! let api_response = AccountResponse::from(db_account);
//! ```

pub mod accounts;
pub mod broadcasts;
