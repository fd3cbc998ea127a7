//! Axum route handlers.
//!
//! - [`health`]: liveness and readiness probes
//! - [`session`]: the caller's session
//! - [`accounts`]: account listing (`account:read`)
//! - [`broadcasts`]: archive listing, lookup, and title edits (`broadcast:update_partially`)
//!
//! Handlers declare authentication with the [`crate::auth::current_user::CurrentUser`] and
//! [`crate::auth::permissions::RequiresPermission`] extractors and return
//! [`crate::errors::Error`], which renders as a JSON error body.

pub mod accounts;
pub mod broadcasts;
pub mod health;
pub mod session;
