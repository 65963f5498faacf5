//! Pure aggregation over a list of expenses: summary figures, per-category
//! sums and per-month sums.
//!
//! Callers filter the expense list first (see [crate::filter]); these
//! functions only fold over whatever they are given and never touch the
//! database. Malformed or empty input yields zeroed/empty aggregates.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::{category::Category, expense::Expense};

/// Headline figures for a list of expenses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    /// The arithmetic sum of all amounts.
    pub total: f64,
    /// The number of expenses.
    pub count: usize,
    /// The largest single amount, or zero for an empty list.
    pub highest: f64,
    /// The mean amount, or zero for an empty list.
    pub average: f64,
}

/// Compute the headline figures for `expenses`.
///
/// An empty list yields all zeros; there are no error conditions.
pub fn summarize(expenses: &[Expense]) -> ExpenseSummary {
    let total: f64 = expenses.iter().map(|expense| expense.amount).sum();
    let count = expenses.len();
    let highest = expenses
        .iter()
        .map(|expense| expense.amount)
        .fold(0.0, f64::max);
    let average = if count == 0 { 0.0 } else { total / count as f64 };

    ExpenseSummary {
        total,
        count,
        highest,
        average,
    }
}

/// The summed amount for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category the amounts were recorded against.
    pub category: Category,
    /// The summed amount for the category.
    pub total: f64,
}

/// Sum `expenses` by category, largest total first.
///
/// Only categories that appear in `expenses` are returned. Ties are broken
/// by category label so the output is deterministic.
pub fn category_totals(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<Category, f64> = HashMap::new();

    for expense in expenses {
        *totals.entry(expense.category).or_insert(0.0) += expense.amount;
    }

    let mut totals: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    totals.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });

    totals
}

/// The summed amount for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    /// Zero-padded `YYYY-MM` key. Lexicographic order on these keys is
    /// chronological order.
    pub key: String,
    /// Human-readable label, e.g. "January 2026".
    pub label: String,
    /// The summed amount for the month.
    pub total: f64,
}

/// Sum `expenses` by local calendar month, oldest month first.
///
/// Each expense is assigned to the year and month of its creation time in
/// the timezone given by `local_offset`.
pub fn monthly_totals(expenses: &[Expense], local_offset: UtcOffset) -> Vec<MonthlyTotal> {
    // BTreeMap keeps the zero-padded keys in lexicographic, and therefore
    // chronological, order.
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for expense in expenses {
        let local_time = expense.created_at.to_offset(local_offset);
        *totals.entry(month_key(local_time)).or_insert(0.0) += expense.amount;
    }

    totals
        .into_iter()
        .map(|(key, total)| MonthlyTotal {
            label: month_label(&key),
            key,
            total,
        })
        .collect()
}

fn month_key(date_time: OffsetDateTime) -> String {
    format!("{:04}-{:02}", date_time.year(), date_time.month() as u8)
}

fn month_label(key: &str) -> String {
    const MONTH_NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    let (year, month) = match key.split_once('-') {
        Some(parts) => parts,
        None => return key.to_owned(),
    };

    match month.parse::<usize>() {
        Ok(month_number @ 1..=12) => format!("{} {year}", MONTH_NAMES[month_number - 1]),
        _ => key.to_owned(),
    }
}
