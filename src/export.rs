//! CSV export of a user's expenses.

use axum::{
    Extension,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use csv::{QuoteStyle, WriterBuilder};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    Error,
    expense::{Expense, ExpenseState, get_expenses},
    filter::{ExpenseFilter, ExpenseQuery, filter_expenses, format_date},
    timezone::get_local_offset,
    user::UserID,
};

/// Render `expenses` as CSV with a header row.
///
/// Text fields are always quoted and embedded double quotes are escaped by
/// doubling, per standard CSV quoting, so descriptions survive a round trip
/// through any compliant CSV parser. Dates are formatted in the local
/// timezone given by `local_offset`.
///
/// # Errors
///
/// Returns [Error::CsvError] if a record cannot be written.
pub fn expenses_to_csv(expenses: &[Expense], local_offset: UtcOffset) -> Result<String, Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    writer
        .write_record(["Description", "Amount", "Category", "Date"])
        .map_err(|error| Error::CsvError(error.to_string()))?;

    for expense in expenses {
        let local_time = expense.created_at.to_offset(local_offset);

        writer
            .write_record([
                expense.description.as_str(),
                &expense.amount.to_string(),
                expense.category.as_str(),
                &format_date(local_time),
            ])
            .map_err(|error| Error::CsvError(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::CsvError(error.to_string()))
}

/// Handler for downloading the authenticated user's expenses as a CSV file.
///
/// Accepts the same filter parameters as the expense listing endpoint, so
/// the export matches whatever the user is currently looking at.
///
/// # Errors
///
/// Returns an error if a date parameter cannot be parsed, the configured
/// timezone is invalid, or the database cannot be read.
pub async fn export_expenses_endpoint(
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
    let csv_content = expenses_to_csv(&filtered, local_offset)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"expenses.csv\"",
            ),
        ],
        csv_content,
    )
        .into_response())
}
