//! The date-range filter policy that decides which expenses are in scope
//! before aggregation.
//!
//! A filter is either a named period relative to "now" (`today`, `week`,
//! `month`, `all`) or an explicit start/end date pair. When either explicit
//! date is supplied it replaces the named period entirely; the two
//! strategies are never merged. An optional free-text search term is
//! applied after date filtering.

use serde::Deserialize;
use time::{
    Date, Duration, OffsetDateTime, format_description::BorrowedFormatItem,
    macros::format_description, macros::time,
};

use crate::{Error, expense::Expense};

/// A named date range relative to the current local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPeriod {
    /// The current local calendar day, from start of day to end of day.
    Today,
    /// The trailing seven days up to and including now.
    Week,
    /// From the first day of the current local calendar month through now.
    Month,
    /// No date bounds.
    #[default]
    All,
}

/// The raw query parameters accepted by the expense listing and export
/// endpoints. Dates are zero-padded `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    /// The named period. Ignored when `start` or `end` is present.
    pub period: Option<FilterPeriod>,
    /// Explicit range start date (inclusive, from start of day).
    pub start: Option<String>,
    /// Explicit range end date (inclusive, through end of day).
    pub end: Option<String>,
    /// Case-insensitive free-text search term.
    pub search: Option<String>,
}

/// A parsed, validated expense filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    /// The named period, used only when no explicit date is set.
    pub period: FilterPeriod,
    /// Explicit range start date.
    pub start: Option<Date>,
    /// Explicit range end date.
    pub end: Option<Date>,
    /// Case-insensitive free-text search term.
    pub search: Option<String>,
}

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

fn parse_date(date_string: &str) -> Result<Date, Error> {
    Date::parse(date_string, DATE_FORMAT)
        .map_err(|error| Error::InvalidDateFormat(error.to_string(), date_string.to_owned()))
}

impl TryFrom<ExpenseQuery> for ExpenseFilter {
    type Error = Error;

    fn try_from(query: ExpenseQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            period: query.period.unwrap_or_default(),
            start: query.start.as_deref().map(parse_date).transpose()?,
            end: query.end.as_deref().map(parse_date).transpose()?,
            search: query
                .search
                .filter(|search_term| !search_term.trim().is_empty()),
        })
    }
}

/// Select the expenses in scope for `filter`.
///
/// `now` must already be in the local timezone: each expense's creation
/// time is converted to `now`'s UTC offset before local-calendar
/// comparisons. The input slice is not modified and the relative order of
/// the selected expenses is preserved.
pub fn filter_expenses(
    expenses: &[Expense],
    filter: &ExpenseFilter,
    now: OffsetDateTime,
) -> Vec<Expense> {
    expenses
        .iter()
        .filter(|expense| {
            let local_time = expense.created_at.to_offset(now.offset());

            let in_range = if filter.start.is_some() || filter.end.is_some() {
                // An explicit range replaces the named period entirely.
                in_explicit_range(local_time, filter.start, filter.end)
            } else {
                in_period(local_time, filter.period, now)
            };

            in_range
                && filter
                    .search
                    .as_deref()
                    .is_none_or(|search_term| matches_search(expense, local_time, search_term))
        })
        .cloned()
        .collect()
}

fn in_explicit_range(local_time: OffsetDateTime, start: Option<Date>, end: Option<Date>) -> bool {
    if let Some(start_date) = start {
        let range_start = start_date.midnight().assume_offset(local_time.offset());
        if local_time < range_start {
            return false;
        }
    }

    if let Some(end_date) = end {
        let range_end = end_date
            .with_time(time!(23:59:59.999_999_999))
            .assume_offset(local_time.offset());
        if local_time > range_end {
            return false;
        }
    }

    true
}

fn in_period(local_time: OffsetDateTime, period: FilterPeriod, now: OffsetDateTime) -> bool {
    match period {
        FilterPeriod::Today => local_time.date() == now.date(),
        FilterPeriod::Week => local_time >= now - Duration::days(7) && local_time <= now,
        FilterPeriod::Month => {
            let first_of_month = now.date().replace_day(1).unwrap_or(now.date());
            local_time.date() >= first_of_month && local_time <= now
        }
        FilterPeriod::All => true,
    }
}

fn matches_search(expense: &Expense, local_time: OffsetDateTime, search_term: &str) -> bool {
    let needle = search_term.to_lowercase();

    expense.description.to_lowercase().contains(&needle)
        || expense.category.as_str().to_lowercase().contains(&needle)
        || expense.amount.to_string().contains(&needle)
        || format_date(local_time).to_lowercase().contains(&needle)
}

/// Human-readable date format used in search matching and CSV export,
/// e.g. "Jan 5, 2026".
const DISPLAY_DATE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[month repr:short] [day padding:none], [year]");

/// Format a date time as a human-readable date, e.g. "Jan 5, 2026".
///
/// Falls back to the ISO calendar date if formatting fails, so callers do
/// not have to thread an error through purely cosmetic code paths.
pub fn format_date(date_time: OffsetDateTime) -> String {
    date_time
        .format(DISPLAY_DATE_FORMAT)
        .unwrap_or_else(|_| date_time.date().to_string())
}

#[cfg(test)]
mod filter_tests {
    use time::{OffsetDateTime, macros::datetime};

    use crate::{category::Category, expense::Expense, user::UserID};

    use super::{ExpenseFilter, ExpenseQuery, FilterPeriod, filter_expenses, format_date};

    fn expense_at(description: &str, amount: f64, created_at: OffsetDateTime) -> Expense {
        Expense {
            id: 1,
            user_id: UserID::new(1),
            description: description.to_owned(),
            amount,
            category: Category::Food,
            created_at,
        }
    }

    const NOW: OffsetDateTime = datetime!(2026-08-15 12:00 UTC);

    #[test]
    fn today_only_keeps_current_calendar_day() {
        let expenses = vec![
            expense_at("early today", 1.0, datetime!(2026-08-15 00:00 UTC)),
            expense_at("late today", 2.0, datetime!(2026-08-15 23:59 UTC)),
            expense_at("yesterday", 3.0, datetime!(2026-08-14 23:59 UTC)),
        ];
        let filter = ExpenseFilter {
            period: FilterPeriod::Today,
            ..Default::default()
        };

        let filtered = filter_expenses(&expenses, &filter, NOW);

        assert_eq!(filtered.len(), 2);
        assert!(
            filtered
                .iter()
                .all(|expense| expense.created_at.date() == NOW.date())
        );
    }

    #[test]
    fn week_is_trailing_seven_days() {
        let expenses = vec![
            expense_at("six days ago", 1.0, datetime!(2026-08-09 12:00 UTC)),
            expense_at("exactly seven days ago", 2.0, datetime!(2026-08-08 12:00 UTC)),
            expense_at("eight days ago", 3.0, datetime!(2026-08-07 12:00 UTC)),
            expense_at("in the future", 4.0, datetime!(2026-08-16 12:00 UTC)),
        ];
        let filter = ExpenseFilter {
            period: FilterPeriod::Week,
            ..Default::default()
        };

        let filtered = filter_expenses(&expenses, &filter, NOW);

        let descriptions: Vec<&str> = filtered
            .iter()
            .map(|expense| expense.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["six days ago", "exactly seven days ago"]);
    }

    #[test]
    fn month_starts_on_the_first() {
        let expenses = vec![
            expense_at("first of month", 1.0, datetime!(2026-08-01 00:00 UTC)),
            expense_at("last of previous month", 2.0, datetime!(2026-07-31 23:59 UTC)),
        ];
        let filter = ExpenseFilter {
            period: FilterPeriod::Month,
            ..Default::default()
        };

        let filtered = filter_expenses(&expenses, &filter, NOW);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].description, "first of month");
    }

    #[test]
    fn explicit_range_is_inclusive_of_day_boundaries() {
        let expenses = vec![
            expense_at("range start midnight", 1.0, datetime!(2026-08-01 00:00 UTC)),
            expense_at("range end last moment", 2.0, datetime!(2026-08-10 23:59:59 UTC)),
            expense_at("before range", 3.0, datetime!(2026-07-31 23:59:59 UTC)),
            expense_at("after range", 4.0, datetime!(2026-08-11 00:00 UTC)),
        ];
        let query = ExpenseQuery {
            start: Some("2026-08-01".to_owned()),
            end: Some("2026-08-10".to_owned()),
            ..Default::default()
        };
        let filter = ExpenseFilter::try_from(query).unwrap();

        let filtered = filter_expenses(&expenses, &filter, NOW);

        let descriptions: Vec<&str> = filtered
            .iter()
            .map(|expense| expense.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec!["range start midnight", "range end last moment"]
        );
    }

    #[test]
    fn explicit_range_replaces_named_period() {
        // An expense months outside "today" must still be returned when an
        // explicit range covers it.
        let expenses = vec![expense_at("old", 1.0, datetime!(2026-01-15 12:00 UTC))];
        let query = ExpenseQuery {
            period: Some(FilterPeriod::Today),
            start: Some("2026-01-01".to_owned()),
            end: Some("2026-01-31".to_owned()),
            ..Default::default()
        };
        let filter = ExpenseFilter::try_from(query).unwrap();

        let filtered = filter_expenses(&expenses, &filter, NOW);

        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn start_only_leaves_upper_bound_open() {
        let expenses = vec![
            expense_at("recent", 1.0, datetime!(2026-08-14 12:00 UTC)),
            expense_at("ancient", 2.0, datetime!(2020-01-01 12:00 UTC)),
        ];
        let query = ExpenseQuery {
            start: Some("2026-08-01".to_owned()),
            ..Default::default()
        };
        let filter = ExpenseFilter::try_from(query).unwrap();

        let filtered = filter_expenses(&expenses, &filter, NOW);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].description, "recent");
    }

    #[test]
    fn invalid_date_string_is_rejected() {
        let query = ExpenseQuery {
            start: Some("01/08/2026".to_owned()),
            ..Default::default()
        };

        let result = ExpenseFilter::try_from(query);

        assert!(matches!(result, Err(crate::Error::InvalidDateFormat(_, _))));
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let expenses = vec![
            expense_at("Weekly groceries", 42.5, datetime!(2026-08-10 12:00 UTC)),
            expense_at("Cinema tickets", 30.0, datetime!(2026-08-11 12:00 UTC)),
        ];

        let by_description = ExpenseFilter {
            search: Some("GROCERIES".to_owned()),
            ..Default::default()
        };
        assert_eq!(filter_expenses(&expenses, &by_description, NOW).len(), 1);

        let by_category = ExpenseFilter {
            search: Some("food".to_owned()),
            ..Default::default()
        };
        assert_eq!(filter_expenses(&expenses, &by_category, NOW).len(), 2);

        let by_amount = ExpenseFilter {
            search: Some("42.5".to_owned()),
            ..Default::default()
        };
        assert_eq!(filter_expenses(&expenses, &by_amount, NOW).len(), 1);

        let by_date = ExpenseFilter {
            search: Some("aug 11".to_owned()),
            ..Default::default()
        };
        let matched = filter_expenses(&expenses, &by_date, NOW);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].description, "Cinema tickets");

        let no_match = ExpenseFilter {
            search: Some("yacht".to_owned()),
            ..Default::default()
        };
        assert!(filter_expenses(&expenses, &no_match, NOW).is_empty());
    }

    #[test]
    fn format_date_is_human_readable() {
        assert_eq!(format_date(datetime!(2026-08-05 12:00 UTC)), "Aug 5, 2026");
    }
}
