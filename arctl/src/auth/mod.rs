//! Authentication and authorization.
//!
//! Callers authenticate with a signed session token in a cookie (named by
//! `auth.session.cookie_name`). The token carries the caller's account id, username and
//! permission set, so no database lookup is needed per request.
//!
//! # Modules
//!
//! - [`session`]: JWT session token verification (and minting, for tooling and tests)
//! - [`current_user`]: The [`current_user::CurrentUser`] extractor, required or optional
//! - [`permissions`]: The permission check and the `RequiresPermission` extractor
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use arctl::auth::current_user::CurrentUser;
//!
//! // 401 without a valid session
//! async fn whoami(user: CurrentUser) -> String {
//!     user.username
//! }
//!
//! // Anonymous callers get `None`
//! async fn archive(user: Option<CurrentUser>) -> String {
//!     user.map(|u| u.username).unwrap_or_default()
//! }
//! ```

pub mod current_user;
pub mod permissions;
pub mod session;
