//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/expenses/{expense_id}',
//! use [format_endpoint].

/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";
/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register a new account.
pub const USERS: &str = "/api/users";
/// The route for confirming a new account's email address.
pub const CONFIRM_EMAIL: &str = "/api/confirm";
/// The route for requesting a password reset email.
pub const FORGOT_PASSWORD_API: &str = "/api/forgot_password";
/// The route for setting a new password with a recovery token.
pub const RESET_PASSWORD_API: &str = "/api/reset_password";
/// The route for fetching the current session's user.
pub const SESSION: &str = "/api/session";
/// The route for a logged-in user to change their password.
pub const ACCOUNT_PASSWORD: &str = "/api/account/password";
/// The route to access expenses.
pub const EXPENSES_API: &str = "/api/expenses";
/// The route to access a single expense.
pub const EXPENSE: &str = "/api/expenses/{expense_id}";
/// The route to download expenses as CSV.
pub const EXPENSES_EXPORT: &str = "/api/expenses/export";
/// The route to read and set the monthly budget.
pub const BUDGET_API: &str = "/api/budget";
/// The route to access to-do items.
pub const TODOS_API: &str = "/api/todos";
/// The route to access a single to-do item.
pub const TODO: &str = "/api/todos/{todo_id}";
/// The admin route for listing confirmed user accounts.
pub const ADMIN_USERS: &str = "/api/admin/users";
/// The admin route for deleting a user account.
pub const ADMIN_DELETE_USER: &str = "/api/admin/users/delete";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/todos/{todo_id}', '{todo_id}' is
/// the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::COFFEE,
            endpoints::LOG_IN_API,
            endpoints::LOG_OUT,
            endpoints::USERS,
            endpoints::CONFIRM_EMAIL,
            endpoints::FORGOT_PASSWORD_API,
            endpoints::RESET_PASSWORD_API,
            endpoints::SESSION,
            endpoints::ACCOUNT_PASSWORD,
            endpoints::EXPENSES_API,
            endpoints::EXPENSES_EXPORT,
            endpoints::BUDGET_API,
            endpoints::TODOS_API,
            endpoints::ADMIN_USERS,
            endpoints::ADMIN_DELETE_USER,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }

        for parameterized_endpoint in [endpoints::EXPENSE, endpoints::TODO] {
            assert_endpoint_is_valid_uri(&format_endpoint(parameterized_endpoint, 42));
        }
    }

    #[test]
    fn format_endpoint_replaces_parameter() {
        assert_eq!(format_endpoint(endpoints::TODO, 7), "/api/todos/7");
    }

    #[test]
    fn format_endpoint_without_parameter_is_identity() {
        assert_eq!(format_endpoint(endpoints::TODOS_API, 7), endpoints::TODOS_API);
    }
}
