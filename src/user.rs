//! Code for creating the user table and fetching users from the database.
//!
//! A user row is the authoritative identity record for an account: it owns
//! the email, password hash and the confirmation and recovery tokens. The
//! per-user display data lives in the profile table (see [crate::profile]).

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered account in the application database.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's email address. Unique across all users.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// When the account was registered.
    pub created_at: OffsetDateTime,
    /// When the user confirmed their email address, or `None` if they have
    /// not confirmed it yet. Unconfirmed users cannot log in and are not
    /// shown in the admin user listing.
    pub confirmed_at: Option<OffsetDateTime>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL,
                confirmed_at TEXT,
                confirmation_token TEXT,
                recovery_token TEXT
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_hash),
        created_at: row.get(3)?,
        confirmed_at: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, email, password, created_at, confirmed_at";

/// Create and insert a new, unconfirmed user into the database.
///
/// `confirmation_token` is the secret the user must present to confirm
/// their email address.
///
/// # Errors
///
/// Returns [Error::DuplicateEmail] if `email` belongs to a registered user,
/// or [Error::SqlError] if some other SQL related error occurred.
pub fn insert_user(
    email: &str,
    password_hash: PasswordHash,
    confirmation_token: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO user (email, password, created_at, confirmation_token) \
        VALUES (?1, ?2, ?3, ?4)",
        (
            email,
            password_hash.as_ref(),
            created_at,
            confirmation_token,
        ),
    )?;

    Ok(User {
        id: UserID::new(connection.last_insert_rowid()),
        email: email.to_owned(),
        password_hash,
        created_at,
        confirmed_at: None,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the database.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an email equal to `email`.
///
/// # Errors
///
/// This function will return an error if:
/// - `email` does not belong to a registered user.
/// - there was an error trying to access the database.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email"
        ))?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| error.into())
}

/// Get up to `limit` users from the database, newest first.
///
/// The limit keeps the admin user listing bounded; a single page is plenty
/// for a single-operator deployment.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn list_users(limit: usize, connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user ORDER BY created_at DESC LIMIT :limit"
        ))?
        .query_map(&[(":limit", &(limit as i64))], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(|error| error.into()))
        .collect()
}

/// Mark the user holding `confirmation_token` as confirmed and consume the token.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if no unconfirmed user holds the token.
pub fn confirm_user_by_token(
    confirmation_token: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let user_id: i64 = connection
        .prepare("SELECT id FROM user WHERE confirmation_token = :token AND confirmed_at IS NULL")?
        .query_row(&[(":token", &confirmation_token)], |row| row.get(0))
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidToken,
            error => error.into(),
        })?;

    connection.execute(
        "UPDATE user SET confirmed_at = ?1, confirmation_token = NULL WHERE id = ?2",
        (OffsetDateTime::now_utc(), user_id),
    )?;

    get_user_by_id(UserID::new(user_id), connection)
}

/// Store a password recovery token for the user with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `email` does not belong to a registered user.
pub fn set_recovery_token(
    email: &str,
    recovery_token: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET recovery_token = ?1 WHERE email = ?2",
        (recovery_token, email),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the user holding `recovery_token`.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if no user holds the token.
pub fn get_user_by_recovery_token(
    recovery_token: &str,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE recovery_token = :token"
        ))?
        .query_row(&[(":token", &recovery_token)], map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidToken,
            error => error.into(),
        })
}

/// Replace the password hash for `user_id` and consume any outstanding
/// recovery token.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, recovery_token = NULL WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the user with `user_id` from the database.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM user WHERE id = ?1", (user_id.as_i64(),))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
