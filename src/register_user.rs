//! The routes for registering a new account and confirming its email
//! address.
//!
//! Registration creates both the identity row and the profile row in one
//! transaction. The account starts unconfirmed; a confirmation token is
//! issued and the confirmation link is written to the server log in place
//! of an outbound mailer. Unconfirmed accounts cannot log in and are not
//! shown in the admin user listing.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword, endpoints,
    profile::insert_profile,
    user::{confirm_user_by_token, insert_user},
};

/// The state needed to register a new account.
#[derive(Debug, Clone)]
pub struct RegisterState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegisterState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for registering a new account.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    /// The account email.
    pub email: String,
    /// The plain-text password.
    pub password: String,
    /// An optional display name for the profile.
    pub full_name: Option<String>,
}

/// Handler for registering a new account via the POST method.
///
/// # Errors
///
/// - [Error::InvalidEmail] if the email is not a valid address.
/// - [Error::TooWeak] if the password is too easy to guess.
/// - [Error::DuplicateEmail] if the email already belongs to an account.
pub async fn register_user(
    State(state): State<RegisterState>,
    Json(register_data): Json<RegisterData>,
) -> Result<Response, Error> {
    let email = EmailAddress::from_str(register_data.email.trim())
        .map_err(|_| Error::InvalidEmail(register_data.email.clone()))?;

    let validated_password = ValidatedPassword::new(&register_data.password)?;
    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;

    let confirmation_token = Uuid::new_v4().to_string();

    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transaction = connection.transaction()?;

    let user = insert_user(
        email.as_str(),
        password_hash,
        &confirmation_token,
        &transaction,
    )?;
    insert_profile(
        user.id,
        email.as_str(),
        register_data.full_name.as_deref(),
        &transaction,
    )?;

    transaction.commit()?;

    // Stands in for a confirmation email. The operator can relay the link.
    tracing::info!(
        "confirmation link for {}: {}?token={confirmation_token}",
        user.email,
        endpoints::CONFIRM_EMAIL
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "email": user.email })),
    )
        .into_response())
}

/// The query parameters for the email confirmation link.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    /// The confirmation token issued at registration.
    pub token: String,
}

/// Handler for the emailed confirmation link.
///
/// Marks the account as confirmed and consumes the token.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token does not match an unconfirmed
/// account.
pub async fn confirm_email(
    State(state): State<RegisterState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = confirm_user_by_token(&query.token, &connection)?;

    tracing::info!("confirmed email for {}", user.email);

    Ok(Json(json!({ "confirmed": true, "email": user.email })).into_response())
}
