//! Spendbook is a self-hosted web service for tracking personal expenses.
//!
//! Users register an account, record expenses against a fixed set of
//! categories, set a monthly budget, fetch aggregated spending summaries,
//! export their expenses as CSV and keep a simple to-do list. A single
//! configured admin account can list and delete user accounts.
//!
//! This library provides a JSON REST API backed by SQLite.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod admin;
mod app_state;
mod auth_cookie;
mod auth_middleware;
mod budget;
mod category;
mod db;
mod endpoints;
mod expense;
mod export;
mod filter;
mod forgot_password;
mod log_in;
mod log_out;
mod logging;
mod password;
mod profile;
mod register_user;
mod routing;
mod summary;
mod timezone;
mod todo;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{User, UserID, get_user_by_email, update_password};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an email and password combination that does not
    /// match a registered account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The user tried to log in before confirming their email address.
    #[error("the email address has not been confirmed")]
    EmailNotConfirmed,

    /// Either the user ID or expiry cookie is missing from the cookie jar in
    /// the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// There was an error parsing a date string, either from a cookie or a
    /// query parameter.
    ///
    /// Callers should pass in the original error as a string and the date
    /// string that caused the error.
    #[error("could not parse date string \"{1}\": {0}")]
    InvalidDateFormat(String, String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The string used to register an account is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address used to register an account already belongs to a
    /// registered account.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An empty string was used for an expense description.
    #[error("expense description cannot be empty")]
    EmptyDescription,

    /// An empty string was used for a to-do task.
    #[error("task cannot be empty")]
    EmptyTask,

    /// The category label did not match one of the fixed category set.
    #[error("\"{0}\" is not a valid expense category")]
    InvalidCategory(String),

    /// A confirmation or recovery token did not match a registered account.
    #[error("the token is invalid or has already been used")]
    InvalidToken,

    /// The caller is not the configured admin account.
    #[error("this operation requires the admin account")]
    AdminRequired,

    /// No admin email was configured at start-up, so admin operations
    /// cannot be authorized.
    #[error("no admin account has been configured")]
    AdminNotConfigured,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// An error occurred while rendering expenses as CSV.
    #[error("could not render CSV: {0}")]
    CsvError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidCredentials | Error::CookieMissing => StatusCode::UNAUTHORIZED,
            Error::EmailNotConfirmed | Error::AdminRequired => StatusCode::FORBIDDEN,
            Error::InvalidDateFormat(_, _)
            | Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::DuplicateEmail
            | Error::EmptyDescription
            | Error::EmptyTask
            | Error::InvalidCategory(_)
            | Error::InvalidToken => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return render_json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred, check the server logs for more details.",
                );
            }
        };

        render_json_error(status, &self.to_string())
    }
}

/// Build a response with the given status code and a JSON body `{"error": message}`.
fn render_json_error(status_code: StatusCode, message: &str) -> Response {
    (status_code, Json(json!({ "error": message }))).into_response()
}
