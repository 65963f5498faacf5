//! The fixed set of expense categories.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A category for grouping expenses, e.g., 'Food', 'Transport'.
///
/// The category set is closed: labels outside this set are rejected at the
/// API boundary with [Error::InvalidCategory].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Category {
    /// Groceries and eating out.
    Food,
    /// Public transport, fuel and vehicle costs.
    Transport,
    /// Movies, games, events.
    Entertainment,
    /// Clothing and general retail.
    Shopping,
    /// Power, water, internet, phone.
    Utilities,
    /// Medical, dental and pharmacy costs.
    Health,
    /// Courses, books, tuition.
    Education,
    /// Anything that does not fit the other categories.
    Other,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Shopping,
        Category::Utilities,
        Category::Health,
        Category::Education,
        Category::Other,
    ];

    /// The category's label as stored in the database and shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Entertainment => "Entertainment",
            Category::Shopping => "Shopping",
            Category::Utilities => "Utilities",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| Error::InvalidCategory(s.to_string()))
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
