//! Middleware for logging requests and responses.

use axum::{extract::Request, http::header::CONTENT_TYPE, middleware::Next, response::Response};
use serde_json::Value;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated
/// and the full body logged at the `debug` level. Password fields in JSON
/// request bodies are redacted before logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body_text) = extract_parts_and_body_text_from_request(request).await;

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        log_request(&parts, &redact_password_fields(&body_text));
    } else {
        log_request(&parts, &body_text);
    }

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body_text) = extract_parts_and_body_text_from_response(response).await;
    log_response(&parts, &body_text);

    Response::from_parts(parts, body_text.into())
}

/// Replace the value of every top-level JSON field whose key mentions
/// "password". Non-JSON text is returned unchanged.
fn redact_password_fields(body_text: &str) -> String {
    let Ok(Value::Object(mut fields)) = serde_json::from_str(body_text) else {
        return body_text.to_string();
    };

    for (key, value) in fields.iter_mut() {
        if key.to_ascii_lowercase().contains("password") {
            *value = Value::String("********".to_owned());
        }
    }

    Value::Object(fields).to_string()
}

async fn extract_parts_and_body_text_from_request(
    request: Request,
) -> (axum::http::request::Parts, String) {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn extract_parts_and_body_text_from_response(
    response: Response,
) -> (axum::http::response::Parts, String) {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Shorten `body` to at most [LOG_BODY_LENGTH_LIMIT] bytes without cutting
/// through a multi-byte character.
fn truncate_body_for_log(body: &str) -> &str {
    let mut limit = LOG_BODY_LENGTH_LIMIT.min(body.len());

    while !body.is_char_boundary(limit) {
        limit -= 1;
    }

    &body[..limit]
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {:}...",
            parts.method,
            parts.uri,
            truncate_body_for_log(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {:}...",
            parts.status,
            truncate_body_for_log(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}

#[cfg(test)]
mod logging_tests {
    use super::{LOG_BODY_LENGTH_LIMIT, redact_password_fields, truncate_body_for_log};

    #[test]
    fn redacts_password_fields_in_json() {
        let body = r#"{"email":"foo@bar.baz","password":"hunter2","new_password":"hunter3"}"#;

        let redacted = redact_password_fields(body);

        assert!(!redacted.contains("hunter2"));
        assert!(!redacted.contains("hunter3"));
        assert!(redacted.contains("foo@bar.baz"));
    }

    #[test]
    fn leaves_non_json_untouched() {
        assert_eq!(redact_password_fields("plain text"), "plain text");
    }

    #[test]
    fn truncation_never_splits_multibyte_characters() {
        // The euro sign straddles the length limit, so a byte-offset slice
        // would land mid-character and panic.
        let body = format!("{}€ lunch and a long tail", "a".repeat(LOG_BODY_LENGTH_LIMIT - 1));

        let truncated = truncate_body_for_log(&body);

        assert!(truncated.len() <= LOG_BODY_LENGTH_LIMIT);
        assert!(body.starts_with(truncated));
        assert_eq!(truncated, "a".repeat(LOG_BODY_LENGTH_LIMIT - 1));
    }

    #[test]
    fn short_bodies_are_not_truncated() {
        assert_eq!(truncate_body_for_log("short"), "short");
    }
}
