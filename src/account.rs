//! The routes for a logged-in user's own account: fetching the current
//! session's identity and changing the account password.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    log_in::SessionUser,
    profile::get_profile,
    user::{UserID, get_user_by_id, update_password},
};

/// The state needed for the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Handler for fetching the identity behind the current session.
///
/// The auth middleware has already resolved the cookie pair to a [UserID],
/// so reaching this handler means the session is valid.
pub async fn get_session(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;
    let full_name = get_profile(user_id, &connection)
        .map(|profile| profile.full_name)
        .unwrap_or_default();

    Ok(Json(SessionUser {
        email: user.email,
        full_name,
    })
    .into_response())
}

/// The form data for changing the account password.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordData {
    /// The current password, required to authorize the change.
    pub current_password: String,
    /// The new plain-text password.
    pub new_password: String,
}

/// Handler for changing the logged-in user's password via the PUT method.
///
/// # Errors
///
/// - [Error::InvalidCredentials] if the current password is wrong.
/// - [Error::TooWeak] if the new password is too easy to guess.
pub async fn put_account_password(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<ChangePasswordData>,
) -> Result<Response, Error> {
    let validated_password = ValidatedPassword::new(&data.new_password)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;

    let is_password_valid = user
        .password_hash
        .verify(&data.current_password)
        .map_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !is_password_valid {
        return Err(Error::InvalidCredentials);
    }

    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;
    update_password(user.id, &password_hash, &connection)?;

    tracing::info!("password changed for {}", user.email);

    Ok(StatusCode::NO_CONTENT.into_response())
}
