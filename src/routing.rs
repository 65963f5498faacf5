//! Assembles the app's routes into a router.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    account::{get_session, put_account_password},
    admin::{delete_admin_user, get_admin_users},
    auth_middleware::auth_guard,
    budget::{get_budget_endpoint, put_budget_endpoint},
    endpoints,
    expense::{
        create_expense_endpoint, delete_all_expenses_endpoint, delete_expense_endpoint,
        get_expenses_endpoint, update_expense_endpoint,
    },
    export::export_expenses_endpoint,
    forgot_password::{post_forgot_password, post_reset_password},
    log_in::post_log_in,
    log_out::get_log_out,
    logging::logging_middleware,
    register_user::{confirm_email, register_user},
    todo::{
        create_todo_endpoint, delete_all_todos_endpoint, delete_todo_endpoint, get_todos_endpoint,
        update_todo_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// The admin routes get a permissive CORS layer so operator tooling hosted
/// on another origin can call them. Requests to a known path with the wrong
/// method answer 405 and unknown paths answer 404 with a JSON body.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::CONFIRM_EMAIL, get(confirm_email))
        .route(endpoints::FORGOT_PASSWORD_API, post(post_forgot_password))
        .route(endpoints::RESET_PASSWORD_API, post(post_reset_password));

    let protected_routes = Router::new()
        .route(endpoints::SESSION, get(get_session))
        .route(endpoints::ACCOUNT_PASSWORD, put(put_account_password))
        .route(
            endpoints::EXPENSES_API,
            get(get_expenses_endpoint)
                .post(create_expense_endpoint)
                .delete(delete_all_expenses_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            put(update_expense_endpoint).delete(delete_expense_endpoint),
        )
        .route(endpoints::EXPENSES_EXPORT, get(export_expenses_endpoint))
        .route(
            endpoints::BUDGET_API,
            get(get_budget_endpoint).put(put_budget_endpoint),
        )
        .route(
            endpoints::TODOS_API,
            get(get_todos_endpoint)
                .post(create_todo_endpoint)
                .delete(delete_all_todos_endpoint),
        )
        .route(
            endpoints::TODO,
            put(update_todo_endpoint).delete(delete_todo_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let admin_routes = Router::new()
        .route(endpoints::ADMIN_USERS, get(get_admin_users))
        .route(endpoints::ADMIN_DELETE_USER, post(delete_admin_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .layer(CorsLayer::permissive());

    protected_routes
        .merge(unprotected_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(logging_middleware))
        .fallback(get_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, Html("I'm a teapot")).into_response()
}

async fn get_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}
