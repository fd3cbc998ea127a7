//! HTTP API: axum handlers and the models they exchange.
//!
//! - **[`handlers`]**: route handlers, one module per resource
//! - **[`models`]**: request/response bodies and query parameters
//!
//! Everything under `/api/v1` is documented with `utoipa`; the document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
