use crate::{api::models::session::SessionInfo, auth::current_user::CurrentUser, errors::Result};
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    summary = "Current session",
    description = "The caller's identity and permission set, as carried by their session cookie.",
    responses(
        (status = 200, description = "The caller", body = SessionInfo),
        (status = 401, description = "No valid session", body = crate::errors::ErrorBody),
    ),
    security(("cookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(current_user: CurrentUser) -> Result<Json<SessionInfo>> {
    Ok(Json(SessionInfo::from(current_user)))
}
