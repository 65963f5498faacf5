//! The `Expense` type, its database operations and the API routes for
//! recording and querying expenses.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    category::Category,
    filter::{ExpenseFilter, ExpenseQuery, filter_expenses},
    summary::{CategoryTotal, ExpenseSummary, MonthlyTotal, category_totals, monthly_totals, summarize},
    timezone::get_local_offset,
    user::UserID,
};

/// Alias for the integer type used for expense IDs.
pub type ExpenseId = i64;

/// A single recorded expense, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,

    /// The ID of the user that recorded the expense.
    pub user_id: UserID,

    /// Free-text description of what the money was spent on.
    pub description: String,

    /// The monetary amount. Assumed non-negative in practice but not enforced.
    pub amount: f64,

    /// The category the expense was recorded against.
    pub category: Category,

    /// When the expense was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Create the expense table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let raw_category: String = row.get(4)?;
    let category = Category::from_str(&raw_category).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown category {raw_category}").into(),
        )
    })?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        description: row.get(2)?,
        amount: row.get(3)?,
        category,
        created_at: row.get(5)?,
    })
}

/// Insert a new expense for `user_id`.
///
/// # Errors
///
/// Returns [Error::EmptyDescription] if `description` is empty or
/// whitespace, or [Error::SqlError] if an SQL related error occurred.
pub fn insert_expense(
    user_id: UserID,
    description: &str,
    amount: f64,
    category: Category,
    connection: &Connection,
) -> Result<Expense, Error> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::EmptyDescription);
    }

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO expense (user_id, description, amount, category, created_at) \
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            user_id.as_i64(),
            description,
            amount,
            category.as_str(),
            created_at,
        ),
    )?;

    Ok(Expense {
        id: connection.last_insert_rowid(),
        user_id,
        description: description.to_owned(),
        amount,
        category,
        created_at,
    })
}

/// Update the description, amount and category of the expense `expense_id`
/// owned by `user_id`. The creation timestamp is not changed.
///
/// # Errors
///
/// Returns [Error::NotFound] if the expense does not exist or belongs to
/// another user.
pub fn update_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    description: &str,
    amount: f64,
    category: Category,
    connection: &Connection,
) -> Result<(), Error> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::EmptyDescription);
    }

    let rows_affected = connection.execute(
        "UPDATE expense SET description = ?1, amount = ?2, category = ?3 \
        WHERE id = ?4 AND user_id = ?5",
        (
            description,
            amount,
            category.as_str(),
            expense_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the expense `expense_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the expense does not exist or belongs to
/// another user.
pub fn delete_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM expense WHERE id = ?1 AND user_id = ?2",
        (expense_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete every expense owned by `user_id` and return how many were deleted.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_all_expenses(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let rows_affected =
        connection.execute("DELETE FROM expense WHERE user_id = ?1", (user_id.as_i64(),))?;

    Ok(rows_affected)
}

/// Get all expenses owned by `user_id`, newest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_expenses(user_id: UserID, connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, description, amount, category, created_at FROM expense \
            WHERE user_id = :user_id ORDER BY created_at DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_expense_row)?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// The state needed for the expense endpoints.
#[derive(Debug, Clone)]
pub struct ExpenseState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The form data for creating or editing an expense.
#[derive(Debug, Deserialize)]
pub struct ExpenseData {
    /// Free-text description of the expense.
    pub description: String,
    /// The monetary amount.
    pub amount: f64,
    /// The category label. Must be one of the fixed category set.
    pub category: String,
}

/// The response for the expense listing endpoint: the filtered rows plus the
/// derived views the client renders (summary figures, category and monthly
/// breakdowns).
#[derive(Debug, Serialize)]
pub struct ExpenseListResponse {
    /// The expenses that passed the date-range filter and search term.
    pub expenses: Vec<Expense>,
    /// Total, count, highest and average over the filtered expenses.
    pub summary: ExpenseSummary,
    /// Per-category sums, largest first.
    pub category_totals: Vec<CategoryTotal>,
    /// Per-month sums, oldest month first.
    pub monthly_totals: Vec<MonthlyTotal>,
}

/// Handler for listing the authenticated user's expenses.
///
/// Accepts the date-range filter parameters (`period`, `start`, `end`) and
/// the free-text `search` term, and returns the filtered expenses together
/// with the derived aggregates.
///
/// # Errors
///
/// Returns an error if a date parameter cannot be parsed, the configured
/// timezone is invalid, or the database cannot be read.
pub async fn get_expenses_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezone(state.local_timezone.clone()))?;
    let filter = ExpenseFilter::try_from(query)?;

    let expenses = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        get_expenses(user_id, &connection)?
    };

    let now = OffsetDateTime::now_utc().to_offset(local_offset);
    let filtered = filter_expenses(&expenses, &filter, now);

    let response = ExpenseListResponse {
        summary: summarize(&filtered),
        category_totals: category_totals(&filtered),
        monthly_totals: monthly_totals(&filtered, local_offset),
        expenses: filtered,
    };

    Ok(Json(response).into_response())
}

/// Handler for recording a new expense for the authenticated user.
///
/// # Errors
///
/// Returns an error if the description is empty, the category label is not
/// one of the fixed set, or the database cannot be written.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<ExpenseData>,
) -> Result<Response, Error> {
    let category = Category::from_str(&data.category)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let expense = insert_expense(user_id, &data.description, data.amount, category, &connection)?;

    Ok((StatusCode::CREATED, Json(expense)).into_response())
}

/// Handler for editing an existing expense owned by the authenticated user.
///
/// # Errors
///
/// Returns an error if the expense does not exist or belongs to another
/// user, the description is empty, or the category label is invalid.
pub async fn update_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    Path(expense_id): Path<ExpenseId>,
    Json(data): Json<ExpenseData>,
) -> Result<Response, Error> {
    let category = Category::from_str(&data.category)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    update_expense(
        expense_id,
        user_id,
        &data.description,
        data.amount,
        category,
        &connection,
    )?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for deleting a single expense owned by the authenticated user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the expense does not exist or belongs to
/// another user.
pub async fn delete_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    delete_expense(expense_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for deleting every expense owned by the authenticated user.
///
/// # Errors
///
/// Returns an error if the database cannot be written.
pub async fn delete_all_expenses_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let deleted = delete_all_expenses(user_id, &connection)?;

    tracing::info!("deleted {deleted} expenses for user {user_id}");

    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}
