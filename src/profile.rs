//! Code for creating the profile table and reading and writing profile rows.
//!
//! A profile holds the display data for an account (email, optional full
//! name) plus the user's monthly budget. It is created at sign-up and
//! deleted when an admin deletes the account. The profile row is keyed by
//! the owning user's ID but is deliberately not a foreign key: the admin
//! reconciliation logic treats a profile without a matching confirmed user
//! as untrustworthy rather than impossible (see [crate::admin]).

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, user::UserID};

/// The display data and budget for a registered account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    /// The ID of the owning user.
    pub user_id: UserID,
    /// The account email, duplicated from the user row for display.
    pub email: String,
    /// The user's display name, if they provided one.
    pub full_name: Option<String>,
    /// The user's monthly budget. A single overwritable value, no history.
    pub budget: Option<f64>,
    /// When the profile was created.
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Create the profile table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_profile_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS profile (
                user_id INTEGER PRIMARY KEY,
                email TEXT NOT NULL,
                full_name TEXT,
                budget REAL,
                created_at TEXT
                )",
        (),
    )?;

    Ok(())
}

fn map_profile_row(row: &Row) -> Result<Profile, rusqlite::Error> {
    Ok(Profile {
        user_id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        full_name: row.get(2)?,
        budget: row.get(3)?,
        created_at: row.get(4)?,
    })
}

const PROFILE_COLUMNS: &str = "user_id, email, full_name, budget, created_at";

/// Insert a profile row for a newly registered user.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn insert_profile(
    user_id: UserID,
    email: &str,
    full_name: Option<&str>,
    connection: &Connection,
) -> Result<Profile, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO profile (user_id, email, full_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        (user_id.as_i64(), email, full_name, created_at),
    )?;

    Ok(Profile {
        user_id,
        email: email.to_owned(),
        full_name: full_name.map(str::to_owned),
        budget: None,
        created_at: Some(created_at),
    })
}

/// Get the profile for `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` has no profile row.
pub fn get_profile(user_id: UserID, connection: &Connection) -> Result<Profile, Error> {
    connection
        .prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile WHERE user_id = :user_id"
        ))?
        .query_row(&[(":user_id", &user_id.as_i64())], map_profile_row)
        .map_err(|error| error.into())
}

/// Get all profile rows.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn list_profiles(connection: &Connection) -> Result<Vec<Profile>, Error> {
    connection
        .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profile"))?
        .query_map([], map_profile_row)?
        .map(|maybe_profile| maybe_profile.map_err(|error| error.into()))
        .collect()
}

/// Set the monthly budget on the profile row for `user_id`, overwriting any
/// previous value. The old budget is not retained anywhere.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` has no profile row.
pub fn set_budget(user_id: UserID, budget: f64, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE profile SET budget = ?1 WHERE user_id = ?2",
        (budget, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the profile row for `user_id`.
///
/// Deleting a profile that does not exist is not an error: the admin delete
/// flow must succeed when the identity row was removed but the profile was
/// already gone.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_profile(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM profile WHERE user_id = ?1", (user_id.as_i64(),))?;

    Ok(())
}

#[cfg(test)]
mod profile_tests {
    use rusqlite::Connection;

    use crate::{Error, user::UserID};

    use super::{
        create_profile_table, delete_profile, get_profile, insert_profile, list_profiles,
        set_budget,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_profile_table(&conn).expect("Could not create profile table");

        conn
    }

    #[test]
    fn insert_and_get_profile() {
        let conn = get_db_connection();
        let user_id = UserID::new(1);

        let inserted = insert_profile(user_id, "foo@bar.baz", Some("Foo Bar"), &conn).unwrap();
        let retrieved = get_profile(user_id, &conn).unwrap();

        assert_eq!(retrieved, inserted);
        assert_eq!(retrieved.budget, None);
    }

    #[test]
    fn set_budget_overwrites_previous_value() {
        let conn = get_db_connection();
        let user_id = UserID::new(1);
        insert_profile(user_id, "foo@bar.baz", None, &conn).unwrap();

        set_budget(user_id, 1000.0, &conn).unwrap();
        set_budget(user_id, 750.5, &conn).unwrap();

        let profile = get_profile(user_id, &conn).unwrap();
        assert_eq!(profile.budget, Some(750.5));
    }

    #[test]
    fn set_budget_fails_without_profile() {
        let conn = get_db_connection();

        assert_eq!(
            set_budget(UserID::new(42), 1000.0, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_profile_is_idempotent() {
        let conn = get_db_connection();
        let user_id = UserID::new(1);
        insert_profile(user_id, "foo@bar.baz", None, &conn).unwrap();

        delete_profile(user_id, &conn).unwrap();
        // A second delete must not error.
        delete_profile(user_id, &conn).unwrap();

        assert_eq!(get_profile(user_id, &conn), Err(Error::NotFound));
        assert!(list_profiles(&conn).unwrap().is_empty());
    }
}
