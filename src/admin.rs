//! The admin routes for listing and deleting user accounts.
//!
//! The listing reconciles identity rows with profile rows: a profile is
//! shown only when a confirmed identity backs it, matched by user ID or,
//! failing that, by case-insensitive email. Deleting an account removes the
//! identity first and aborts if that fails, so a failed delete never leaves
//! an orphaned identity that can still log in.
//!
//! Both routes answer with an envelope of the shape
//! `{"success": bool, "users"?: [...], "error"?: "..."}` and are served
//! with a permissive CORS policy so operator tooling on other origins can
//! call them.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use time::serde::rfc3339;

use crate::{
    AppState, Error,
    profile::{Profile, delete_profile, list_profiles},
    user::{User, UserID, delete_user, get_user_by_id, list_users},
};

/// The maximum number of identity rows fetched per reconciliation pass.
pub const IDENTITY_PAGE_SIZE: usize = 1000;

/// The state needed for the admin endpoints.
#[derive(Debug, Clone)]
pub struct AdminState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The email of the account allowed to use the admin endpoints, if one
    /// was configured at start-up.
    pub admin_email: Option<String>,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            admin_email: state.admin_email.clone(),
        }
    }
}

/// A user account as shown in the admin listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminUser {
    /// The ID of the user.
    pub id: UserID,
    /// The account email.
    pub email: String,
    /// The user's display name, if they provided one.
    pub full_name: Option<String>,
    /// The user's monthly budget, if they set one.
    pub budget: Option<f64>,
    /// When the profile was created. Falls back to the identity's creation
    /// time when the profile row has no timestamp.
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Keep the profiles that are backed by a confirmed identity and order them
/// newest first.
///
/// A profile matches an identity by user ID, or by case-insensitive email
/// when the IDs diverge (e.g. a profile imported from another system).
/// Profiles without a creation timestamp sort as if created at the Unix
/// epoch, i.e. last.
pub fn reconcile_users(identities: &[User], profiles: Vec<Profile>) -> Vec<AdminUser> {
    let mut users: Vec<AdminUser> = profiles
        .into_iter()
        .filter_map(|profile| {
            let identity = identities.iter().find(|identity| {
                identity.id == profile.user_id
                    || identity.email.eq_ignore_ascii_case(&profile.email)
            })?;

            if identity.confirmed_at.is_none() {
                return None;
            }

            Some(AdminUser {
                id: identity.id,
                email: profile.email,
                full_name: profile.full_name,
                budget: profile.budget,
                created_at: profile.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            })
        })
        .collect();

    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    users
}

fn authorize_admin(state: &AdminState, user: &User) -> Result<(), Error> {
    let admin_email = state.admin_email.as_deref().ok_or(Error::AdminNotConfigured)?;

    if !user.email.eq_ignore_ascii_case(admin_email) {
        return Err(Error::AdminRequired);
    }

    Ok(())
}

fn envelope_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

fn envelope_from(error: Error) -> Response {
    match error {
        Error::AdminNotConfigured => {
            envelope_error(StatusCode::FORBIDDEN, "admin access is not configured")
        }
        Error::AdminRequired => envelope_error(StatusCode::FORBIDDEN, "admin access required"),
        Error::NotFound => envelope_error(StatusCode::NOT_FOUND, "no such user"),
        error => {
            tracing::error!("Unhandled error in admin endpoint: {error}");
            envelope_error(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
        }
    }
}

/// Handler for the admin listing of user accounts.
pub async fn get_admin_users(
    State(state): State<AdminState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let result = (|| {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        let caller = get_user_by_id(user_id, &connection)?;
        authorize_admin(&state, &caller)?;

        let identities = list_users(IDENTITY_PAGE_SIZE, &connection)?;
        let profiles = list_profiles(&connection)?;

        Ok(reconcile_users(&identities, profiles))
    })();

    match result {
        Ok(users) => Json(json!({ "success": true, "users": users })).into_response(),
        Err(error) => envelope_from(error),
    }
}

/// The body of an admin delete request.
#[derive(Debug, Deserialize)]
pub struct DeleteUserData {
    /// The ID of the user to delete.
    pub id: Option<i64>,
}

/// Delete a user's identity row and then their profile row.
///
/// The identity is removed first so that a partial failure can never leave
/// an account that can still log in. If the identity delete fails, the
/// profile is left untouched.
pub fn delete_user_account(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    delete_user(user_id, connection)?;
    delete_profile(user_id, connection)?;

    Ok(())
}

/// Handler for the admin delete of a user account via the POST method.
///
/// A missing body or a missing `user_id` field answers 400 with the error
/// envelope rather than a bare rejection.
pub async fn delete_admin_user(
    State(state): State<AdminState>,
    Extension(user_id): Extension<UserID>,
    body: Option<Json<DeleteUserData>>,
) -> Response {
    let Some(Json(DeleteUserData {
        id: Some(target_id),
    })) = body
    else {
        return envelope_error(StatusCode::BAD_REQUEST, "id is required");
    };

    let result = (|| {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        let caller = get_user_by_id(user_id, &connection)?;
        authorize_admin(&state, &caller)?;

        delete_user_account(UserID::new(target_id), &connection)
    })();

    match result {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(error) => envelope_from(error),
    }
}


#[cfg(test)]
mod admin_endpoint_tests {
    use axum::{
        Router, middleware,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        AppState, PasswordHash,
        auth_middleware::auth_guard,
        endpoints,
        log_in::post_log_in,
        profile::{get_profile, insert_profile},
        user::{UserID, confirm_user_by_token, get_user_by_id, insert_user},
    };

    use super::{delete_admin_user, delete_user_account, get_admin_users};

    // Pre-computed bcrypt hash of "okon" so tests do not pay for hashing.
    const OKON_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

    fn get_test_server(admin_email: Option<&str>) -> (TestServer, AppState) {
        let conn = Connection::open_in_memory().unwrap();
        let state =
            AppState::new(conn, "42", "UTC", admin_email.map(ToOwned::to_owned)).unwrap();

        {
            let connection = state.db_connection.lock().unwrap();

            let admin = insert_user(
                "admin@example.com",
                PasswordHash::new_unchecked(OKON_HASH),
                "admin-token",
                &connection,
            )
            .unwrap();
            insert_profile(admin.id, "admin@example.com", Some("Admin"), &connection).unwrap();
            confirm_user_by_token("admin-token", &connection).unwrap();

            let member = insert_user(
                "member@example.com",
                PasswordHash::new_unchecked(OKON_HASH),
                "member-token",
                &connection,
            )
            .unwrap();
            insert_profile(member.id, "member@example.com", None, &connection).unwrap();
            confirm_user_by_token("member-token", &connection).unwrap();
        }

        let router = Router::new()
            .route(endpoints::ADMIN_USERS, get(get_admin_users))
            .route(endpoints::ADMIN_DELETE_USER, post(delete_admin_user))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(state.clone());

        let mut server = TestServer::new(router);
        server.save_cookies();

        (server, state)
    }

    async fn log_in(server: &TestServer, email: &str) {
        server
            .post(endpoints::LOG_IN_API)
            .json(&json!({"email": email, "password": "okon"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn admin_listing_returns_confirmed_users() {
        let (server, _) = get_test_server(Some("admin@example.com"));
        log_in(&server, "admin@example.com").await;

        let response = server.get(endpoints::ADMIN_USERS).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["users"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_listing_rejects_non_admin() {
        let (server, _) = get_test_server(Some("admin@example.com"));
        log_in(&server, "member@example.com").await;

        let response = server.get(endpoints::ADMIN_USERS).await;

        response.assert_status_forbidden();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn admin_listing_rejects_when_not_configured() {
        let (server, _) = get_test_server(None);
        log_in(&server, "admin@example.com").await;

        let response = server.get(endpoints::ADMIN_USERS).await;

        response.assert_status_forbidden();
    }

    #[tokio::test]
    async fn admin_listing_rejects_post() {
        let (server, _) = get_test_server(Some("admin@example.com"));
        log_in(&server, "admin@example.com").await;

        let response = server.post(endpoints::ADMIN_USERS).await;

        response.assert_status(axum::http::StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn admin_delete_removes_identity_and_profile() {
        let (server, state) = get_test_server(Some("admin@example.com"));
        log_in(&server, "admin@example.com").await;

        let response = server
            .post(endpoints::ADMIN_DELETE_USER)
            .json(&json!({"id": 2}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(true));

        let connection = state.db_connection.lock().unwrap();
        assert!(get_user_by_id(UserID::new(2), &connection).is_err());
        assert!(get_profile(UserID::new(2), &connection).is_err());
    }

    #[tokio::test]
    async fn admin_delete_requires_id() {
        let (server, _) = get_test_server(Some("admin@example.com"));
        log_in(&server, "admin@example.com").await;

        let response = server.post(endpoints::ADMIN_DELETE_USER).json(&json!({})).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn admin_delete_unknown_user_reports_not_found() {
        let (server, _) = get_test_server(Some("admin@example.com"));
        log_in(&server, "admin@example.com").await;

        let response = server
            .post(endpoints::ADMIN_DELETE_USER)
            .json(&json!({"id": 999}))
            .await;

        response.assert_status_not_found();
    }

    #[test]
    fn failed_identity_delete_leaves_profile_untouched() {
        let connection = Connection::open_in_memory().unwrap();
        crate::db::initialize(&connection).unwrap();

        let user = insert_user(
            "a@example.com",
            PasswordHash::new_unchecked("dummy"),
            "token",
            &connection,
        )
        .unwrap();
        insert_profile(user.id, "a@example.com", None, &connection).unwrap();

        // Deleting a nonexistent identity must fail before the profile step.
        let result = delete_user_account(UserID::new(999), &connection);

        assert!(result.is_err());
        assert!(get_profile(user.id, &connection).is_ok());
    }
}
