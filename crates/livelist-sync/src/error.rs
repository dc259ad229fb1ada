// File: livelist-sync/src/error.rs
// Purpose: Error type shared by page loads, admin actions and the push transport

use serde_json::Value;
use std::time::Duration;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the synchronizer's collaborators.
///
/// Push decode failures never leave the synchronizer as errors; they are
/// logged and reported as an `ApplyOutcome::Malformed` instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The backend could not be reached (DNS, refused connection, TLS...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request attempt exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-2xx status
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// A response or push frame was not the JSON we expected
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A binary push frame could not be inflated
    #[error("failed to decompress frame: {0}")]
    Decompress(#[from] std::io::Error),

    /// Caller-side validation failed before anything was sent
    #[error("invalid request: {0}")]
    Validation(String),

    /// The push connection failed
    #[error("push transport error: {0}")]
    Transport(String),

    /// Configuration could not be used as given
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether retrying the same request may succeed.
    ///
    /// Client errors (4xx) and local validation failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => true,
            SyncError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build a `Server` error from a status code and the raw response body.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<Value>(body) {
            Ok(value) => extract_error_message(&value),
            Err(_) if body.trim().is_empty() => format!("request failed with status {}", status),
            Err(_) => body.trim().to_string(),
        };
        SyncError::Server { status, message }
    }
}

const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Reduce a backend error body to one human-readable line.
///
/// Understands the shapes the payments API produces: `{"detail": ...}`,
/// `{"message"|"error"|"msg": ...}`, field error maps such as
/// `{"email": ["This field is required"]}` and `non_field_errors` lists.
pub fn extract_error_message(value: &Value) -> String {
    match value {
        Value::Null => UNKNOWN_ERROR.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(extract_error_message)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => {
            for key in ["detail", "message", "error", "msg"] {
                if let Some(inner) = map.get(key).filter(|v| is_truthy(v)) {
                    return extract_error_message(inner);
                }
            }

            let field_errors = map
                .iter()
                .filter_map(|(key, value)| match value {
                    Value::Array(items) if !items.is_empty() => {
                        let messages = items.iter().map(plain).collect::<Vec<_>>().join(", ");
                        if matches!(key.as_str(), "non_field_errors" | "__all__") {
                            Some(messages)
                        } else {
                            Some(format!("{}: {}", title_case(key), messages))
                        }
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("; ");

            if !field_errors.is_empty() {
                return field_errors;
            }

            let values = map
                .values()
                .map(|v| match v {
                    Value::Array(items) => items.iter().map(plain).collect::<Vec<_>>().join(" "),
                    other => plain(other),
                })
                .collect::<Vec<_>>()
                .join(" ");

            if values.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                values
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `user_uid` -> `User Uid`
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"detail": "Authentication credentials were not provided."}), "Authentication credentials were not provided.")]
    #[case(json!({"message": "Transaction not found"}), "Transaction not found")]
    #[case(json!({"error": "boom"}), "boom")]
    #[case(json!("already a string"), "already a string")]
    #[case(json!(null), "An unknown error occurred")]
    #[case(json!({"non_field_errors": ["Invalid credentials"]}), "Invalid credentials")]
    #[case(json!({"user_uid": ["This field is required."]}), "User Uid: This field is required.")]
    #[case(json!(["first", "second"]), "first second")]
    fn test_extract_error_message(#[case] body: Value, #[case] expected: &str) {
        assert_eq!(extract_error_message(&body), expected);
    }

    #[test]
    fn test_field_errors_are_joined() {
        let body = json!({
            "reason": ["This field may not be blank."],
            "amount": ["Must be positive.", "Too large."]
        });
        let message = extract_error_message(&body);
        assert!(message.contains("Reason: This field may not be blank."));
        assert!(message.contains("Amount: Must be positive., Too large."));
        assert!(message.contains("; "));
    }

    #[test]
    fn test_from_response_body() {
        let err = SyncError::from_response_body(404, r#"{"detail": "Not found."}"#);
        match &err {
            SyncError::Server { status, message } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "Not found.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());

        let err = SyncError::from_response_body(502, "<html>Bad Gateway</html>");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "<html>Bad Gateway</html> (HTTP 502)");

        let err = SyncError::from_response_body(500, "");
        assert_eq!(err.to_string(), "request failed with status 500 (HTTP 500)");
    }
}
