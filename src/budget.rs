//! API routes for reading and setting the user's monthly budget.
//!
//! The budget is a single numeric value stored on the profile row. Writing
//! a new value overwrites the old one; no history is kept and the previous
//! budget cannot be recovered.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    profile::{get_profile, set_budget},
    user::UserID,
};

/// The state needed for the budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The budget value returned by the budget read endpoint.
#[derive(Debug, Serialize)]
pub struct BudgetData {
    /// The monthly budget, or `None` if the user has not set one.
    pub budget: Option<f64>,
}

/// The budget value accepted by the budget write endpoint.
#[derive(Debug, Deserialize)]
pub struct SetBudgetData {
    /// The new monthly budget.
    pub budget: f64,
}

/// Handler for reading the authenticated user's monthly budget.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has no profile row.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let profile = get_profile(user_id, &connection)?;

    Ok(Json(BudgetData {
        budget: profile.budget,
    })
    .into_response())
}

/// Handler for setting the authenticated user's monthly budget, overwriting
/// any previous value.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has no profile row.
pub async fn put_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<SetBudgetData>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    set_budget(user_id, data.budget, &connection)?;

    Ok(Json(BudgetData {
        budget: Some(data.budget),
    })
    .into_response())
}
