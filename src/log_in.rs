//! The route for handling log-in requests. The auth_cookie module handles
//! the lower level cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth_cookie::set_auth_cookie,
    profile::get_profile,
    user::{User, get_user_by_email},
};

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to perform a login.
#[derive(Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials for a log-in request.
#[derive(Debug, Deserialize)]
pub struct LogInData {
    /// The account email.
    pub email: String,
    /// The plain-text password.
    pub password: String,
    /// Whether to keep the session alive for a week instead of the default
    /// duration.
    #[serde(default)]
    pub remember_me: bool,
}

/// The identity returned after a successful log-in, and by the session
/// endpoint. Clients may persist this to avoid a UI flash while a session
/// is being resolved on load.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    /// The account email.
    pub email: String,
    /// The user's display name, if they provided one.
    pub full_name: Option<String>,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in the auth cookie pair is set and the user's
/// display identity is returned.
///
/// # Errors
///
/// - [Error::InvalidCredentials] if the email does not belong to a
///   registered user or the password is wrong. The two cases are
///   deliberately indistinguishable to the client.
/// - [Error::EmailNotConfirmed] if the account exists but the email address
///   was never confirmed.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Json(log_in_data): Json<LogInData>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user: User = match get_user_by_email(&log_in_data.email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return Err(error);
        }
    };

    let is_password_valid = user
        .password_hash
        .verify(&log_in_data.password)
        .map_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !is_password_valid {
        return Err(Error::InvalidCredentials);
    }

    if user.confirmed_at.is_none() {
        return Err(Error::EmailNotConfirmed);
    }

    let cookie_duration = if log_in_data.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, user.id, cookie_duration).map_err(|error| {
        tracing::error!("Could not format cookie expiry: {error}");
        Error::InvalidDateFormat(error.to_string(), "cookie expiry".to_owned())
    })?;

    let full_name = get_profile(user.id, &connection)
        .map(|profile| profile.full_name)
        .unwrap_or_default();

    Ok((
        jar,
        Json(SessionUser {
            email: user.email,
            full_name,
        }),
    )
        .into_response())
}

#[cfg(test)]
mod log_in_tests {
    use axum::{Router, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState, PasswordHash, endpoints,
        user::{confirm_user_by_token, insert_user},
    };

    use super::post_log_in;

    // Pre-computed bcrypt hash of "okon" so tests do not pay for hashing.
    const OKON_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

    fn get_test_server(confirmed: bool) -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "42", "UTC", None).unwrap();

        {
            let connection = state.db_connection.lock().unwrap();
            insert_user(
                "foo@bar.baz",
                PasswordHash::new_unchecked(OKON_HASH),
                "token",
                &connection,
            )
            .unwrap();

            if confirmed {
                confirm_user_by_token("token", &connection).unwrap();
            }
        }

        let router = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(state);

        TestServer::new(router)
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let server = get_test_server(true);

        let response = server
            .post(endpoints::LOG_IN_API)
            .json(&json!({"email": "foo@bar.baz", "password": "okon"}))
            .await;

        response.assert_status_ok();
        assert!(
            response
                .headers()
                .get_all("set-cookie")
                .iter()
                .next()
                .is_some(),
            "log-in should set auth cookies"
        );
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let server = get_test_server(true);

        let response = server
            .post(endpoints::LOG_IN_API)
            .json(&json!({"email": "foo@bar.baz", "password": "wrong"}))
            .await;

        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let server = get_test_server(true);

        let response = server
            .post(endpoints::LOG_IN_API)
            .json(&json!({"email": "nobody@bar.baz", "password": "okon"}))
            .await;

        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn log_in_fails_for_unconfirmed_account() {
        let server = get_test_server(false);

        let response = server
            .post(endpoints::LOG_IN_API)
            .json(&json!({"email": "foo@bar.baz", "password": "okon"}))
            .await;

        response.assert_status_forbidden();
    }
}
