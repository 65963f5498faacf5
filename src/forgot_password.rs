//! The routes for the password recovery flow.
//!
//! Requesting a reset issues a recovery token and writes the reset link to
//! the server log in place of an outbound mailer. The reset endpoint
//! accepts the token from either the query string or the request body, so
//! links survive clients that move query parameters into fragments. A
//! successful reset signs the caller in, mirroring the session injection a
//! recovery link performs in hosted identity providers.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::Duration;
use uuid::Uuid;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    auth_cookie::set_auth_cookie,
    endpoints,
    user::{get_user_by_recovery_token, set_recovery_token, update_password},
};

/// The state needed for the password recovery endpoints.
#[derive(Clone)]
pub struct RecoveryState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RecoveryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RecoveryState> for Key {
    fn from_ref(state: &RecoveryState) -> Self {
        state.cookie_key.clone()
    }
}

/// The form data for requesting a password reset.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordData {
    /// The account email.
    pub email: String,
}

/// Handler for requesting a password reset.
///
/// Always answers with success so the response does not reveal whether an
/// email address is registered.
pub async fn post_forgot_password(
    State(state): State<RecoveryState>,
    Json(data): Json<ForgotPasswordData>,
) -> Result<Response, Error> {
    let recovery_token = Uuid::new_v4().to_string();

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    match set_recovery_token(&data.email, &recovery_token, &connection) {
        Ok(()) => {
            // Stands in for a recovery email. The operator can relay the link.
            tracing::info!(
                "password reset link for {}: {}?token={recovery_token}",
                data.email,
                endpoints::RESET_PASSWORD_API
            );
        }
        Err(Error::NotFound) => {
            tracing::debug!("password reset requested for unknown email {}", data.email);
        }
        Err(error) => return Err(error),
    }

    Ok(Json(json!({ "success": true })).into_response())
}

/// The query parameters for the reset endpoint. The token may arrive here
/// or in the body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordQuery {
    /// The recovery token from the reset link.
    pub token: Option<String>,
}

/// The form data for setting a new password with a recovery token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordData {
    /// The recovery token, if not already given as a query parameter.
    pub token: Option<String>,
    /// The new plain-text password.
    pub new_password: String,
}

/// Handler for setting a new password with a recovery token.
///
/// The token is taken from the query string if present, otherwise from the
/// body. On success the token is consumed, the password replaced, and the
/// caller signed in.
///
/// # Errors
///
/// - [Error::InvalidToken] if no token was supplied or it does not match a
///   registered account.
/// - [Error::TooWeak] if the new password is too easy to guess.
pub async fn post_reset_password(
    State(state): State<RecoveryState>,
    jar: PrivateCookieJar,
    Query(query): Query<ResetPasswordQuery>,
    Json(data): Json<ResetPasswordData>,
) -> Result<Response, Error> {
    let token = query
        .token
        .or(data.token)
        .filter(|token| !token.trim().is_empty())
        .ok_or(Error::InvalidToken)?;

    let validated_password = ValidatedPassword::new(&data.new_password)?;
    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_recovery_token(&token, &connection)?;
    update_password(user.id, &password_hash, &connection)?;

    tracing::info!("password reset for {}", user.email);

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration).map_err(|error| {
        tracing::error!("Could not format cookie expiry: {error}");
        Error::InvalidDateFormat(error.to_string(), "cookie expiry".to_owned())
    })?;

    Ok((jar, Json(json!({ "success": true }))).into_response())
}
