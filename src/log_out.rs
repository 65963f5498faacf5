//! The route for logging out the current user.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;

use crate::auth_cookie::invalidate_auth_cookie;

/// Handler for log-out requests.
///
/// Invalidates the auth cookie pair. Safe to call without a session.
pub async fn get_log_out(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (jar, Json(json!({ "success": true }))).into_response()
}
