//! Database initialization.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, expense::create_expense_table, profile::create_profile_table, todo::create_todo_table,
    user::create_user_table,
};

/// Create the tables for the domain models if they do not already exist.
///
/// All tables are created in a single exclusive transaction so that a
/// partially initialized database is never left behind.
///
/// # Errors
///
/// This function will return an error if any of the SQL queries fail.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_profile_table(&transaction)?;
    create_expense_table(&transaction)?;
    create_todo_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
