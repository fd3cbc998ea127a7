//! API request and response data models.
//!
//! API models are distinct from database models so the served and stored representations can
//! evolve independently. All models are annotated with `utoipa` for the generated docs.
//!
//! - [`accounts`]: Account listing
//! - [`broadcasts`]: Archive listing and partial edits
//! - [`session`]: The caller's identity and permission set
//! - [`pagination`]: Shared `skip`/`limit` parameters

pub mod accounts;
pub mod broadcasts;
pub mod pagination;
pub mod session;
