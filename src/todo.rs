//! The `Todo` type, its database operations and the API routes for the
//! to-do list.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, user::UserID};

/// Alias for the integer type used for to-do IDs.
pub type TodoId = i64;

/// A single to-do item, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Todo {
    /// The ID of the to-do item.
    pub id: TodoId,

    /// The ID of the user that created the item.
    pub user_id: UserID,

    /// The task text.
    pub task: String,

    /// Whether the task has been completed.
    pub completed: bool,

    /// When the item was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the item was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Create the todo table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_todo_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS todo (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                task TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_todo_row(row: &Row) -> Result<Todo, rusqlite::Error> {
    Ok(Todo {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        task: row.get(2)?,
        completed: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a new, incomplete to-do item for `user_id`.
///
/// # Errors
///
/// Returns [Error::EmptyTask] if `task` is empty or whitespace, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn insert_todo(user_id: UserID, task: &str, connection: &Connection) -> Result<Todo, Error> {
    let task = task.trim();
    if task.is_empty() {
        return Err(Error::EmptyTask);
    }

    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO todo (user_id, task, completed, created_at, updated_at) \
        VALUES (?1, ?2, 0, ?3, ?3)",
        (user_id.as_i64(), task, now),
    )?;

    Ok(Todo {
        id: connection.last_insert_rowid(),
        user_id,
        task: task.to_owned(),
        completed: false,
        created_at: now,
        updated_at: now,
    })
}

/// Update the task text and completion flag of the to-do item `todo_id`
/// owned by `user_id`, bumping the updated timestamp.
///
/// # Errors
///
/// Returns [Error::NotFound] if the item does not exist or belongs to
/// another user, or [Error::EmptyTask] if `task` is empty.
pub fn update_todo(
    todo_id: TodoId,
    user_id: UserID,
    task: &str,
    completed: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let task = task.trim();
    if task.is_empty() {
        return Err(Error::EmptyTask);
    }

    let rows_affected = connection.execute(
        "UPDATE todo SET task = ?1, completed = ?2, updated_at = ?3 \
        WHERE id = ?4 AND user_id = ?5",
        (
            task,
            completed,
            OffsetDateTime::now_utc(),
            todo_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the to-do item `todo_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the item does not exist or belongs to
/// another user.
pub fn delete_todo(todo_id: TodoId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM todo WHERE id = ?1 AND user_id = ?2",
        (todo_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete every to-do item owned by `user_id` and return how many were deleted.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_all_todos(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let rows_affected =
        connection.execute("DELETE FROM todo WHERE user_id = ?1", (user_id.as_i64(),))?;

    Ok(rows_affected)
}

/// Get all to-do items owned by `user_id`, newest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_todos(user_id: UserID, connection: &Connection) -> Result<Vec<Todo>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, task, completed, created_at, updated_at FROM todo \
            WHERE user_id = :user_id ORDER BY created_at DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_todo_row)?
        .map(|maybe_todo| maybe_todo.map_err(|error| error.into()))
        .collect()
}

/// The state needed for the to-do endpoints.
#[derive(Debug, Clone)]
pub struct TodoState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TodoState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating a to-do item.
#[derive(Debug, Deserialize)]
pub struct NewTodoData {
    /// The task text.
    pub task: String,
}

/// The form data for editing a to-do item.
#[derive(Debug, Deserialize)]
pub struct UpdateTodoData {
    /// The task text.
    pub task: String,
    /// Whether the task has been completed.
    pub completed: bool,
}

/// Handler for listing the authenticated user's to-do items, newest first.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub async fn get_todos_endpoint(
    State(state): State<TodoState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let todos = get_todos(user_id, &connection)?;

    Ok(Json(todos).into_response())
}

/// Handler for creating a to-do item for the authenticated user.
///
/// # Errors
///
/// Returns [Error::EmptyTask] if the task text is empty.
pub async fn create_todo_endpoint(
    State(state): State<TodoState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<NewTodoData>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let todo = insert_todo(user_id, &data.task, &connection)?;

    Ok((StatusCode::CREATED, Json(todo)).into_response())
}

/// Handler for editing a to-do item owned by the authenticated user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the item does not exist or belongs to
/// another user, or [Error::EmptyTask] if the task text is empty.
pub async fn update_todo_endpoint(
    State(state): State<TodoState>,
    Extension(user_id): Extension<UserID>,
    Path(todo_id): Path<TodoId>,
    Json(data): Json<UpdateTodoData>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    update_todo(todo_id, user_id, &data.task, data.completed, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for deleting a single to-do item owned by the authenticated user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the item does not exist or belongs to
/// another user.
pub async fn delete_todo_endpoint(
    State(state): State<TodoState>,
    Extension(user_id): Extension<UserID>,
    Path(todo_id): Path<TodoId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    delete_todo(todo_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for deleting every to-do item owned by the authenticated user.
///
/// # Errors
///
/// Returns an error if the database cannot be written.
pub async fn delete_all_todos_endpoint(
    State(state): State<TodoState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let deleted = delete_all_todos(user_id, &connection)?;

    tracing::info!("deleted {deleted} todos for user {user_id}");

    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}

#[cfg(test)]
mod todo_tests {
    use rusqlite::Connection;

    use crate::{Error, user::UserID};

    use super::{
        create_todo_table, delete_all_todos, delete_todo, get_todos, insert_todo, update_todo,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_todo_table(&conn).expect("Could not create todo table");

        conn
    }

    #[test]
    fn insert_creates_incomplete_todo() {
        let conn = get_db_connection();

        let todo = insert_todo(UserID::new(1), "buy milk", &conn).unwrap();

        assert!(!todo.completed);
        assert_eq!(todo.created_at, todo.updated_at);
    }

    #[test]
    fn insert_rejects_empty_task() {
        let conn = get_db_connection();

        assert_eq!(
            insert_todo(UserID::new(1), "  ", &conn),
            Err(Error::EmptyTask)
        );
    }

    #[test]
    fn update_toggles_completion() {
        let conn = get_db_connection();
        let user_id = UserID::new(1);
        let todo = insert_todo(user_id, "buy milk", &conn).unwrap();

        update_todo(todo.id, user_id, "buy milk", true, &conn).unwrap();

        let todos = get_todos(user_id, &conn).unwrap();
        assert!(todos[0].completed);
    }

    #[test]
    fn update_is_scoped_to_owner() {
        let conn = get_db_connection();
        let todo = insert_todo(UserID::new(1), "buy milk", &conn).unwrap();

        let result = update_todo(todo.id, UserID::new(2), "buy milk", true, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_and_clear_all_are_scoped_to_owner() {
        let conn = get_db_connection();
        let todo = insert_todo(UserID::new(1), "buy milk", &conn).unwrap();
        insert_todo(UserID::new(1), "walk dog", &conn).unwrap();
        insert_todo(UserID::new(2), "other user task", &conn).unwrap();

        assert_eq!(
            delete_todo(todo.id, UserID::new(2), &conn),
            Err(Error::NotFound)
        );

        let deleted = delete_all_todos(UserID::new(1), &conn).unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(get_todos(UserID::new(2), &conn).unwrap().len(), 1);
    }
}
