//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open
//! transaction), binds parameters, and returns the records in [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Accounts`]: API callers and their permission sets
//! - [`Broadcasts`]: The broadcast archive
//!
//! # Common Pattern
//!
//! ```ignore
//! use arctl::db::handlers::{Broadcasts, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let mut repo = Broadcasts::new(&mut tx);
//! let updated = repo.update(id, &request).await?;
//! tx.commit().await?;
//! ```

pub mod accounts;
pub mod broadcasts;
pub mod repository;

pub use accounts::Accounts;
pub use broadcasts::Broadcasts;
pub use repository::Repository;
