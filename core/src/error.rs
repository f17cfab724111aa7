//! Error types for the todo client.
//!
//! # Design
//! Three layers, matching where a failure can originate:
//! - `ApiError`: anything between building a request and parsing its
//!   response. Non-2xx responses keep the raw status and body so the
//!   server-provided `detail` message can be shown verbatim.
//! - `SecretStoreError`: persisting the auth token.
//! - `Error`: what session and store operations return. Adds local
//!   validation failures, which never reach the network.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors produced by the request/response layer and transports.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a status other than the one the operation expects.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connection refused, DNS, TLS).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The `detail` string of a JSON error payload, if the server sent one.
    pub fn detail(&self) -> Option<String> {
        let ApiError::Http { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get("detail")? {
            serde_json::Value::String(s) => Some(s.clone()),
            // Framework validation errors come back as a list of objects.
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string),
            _ => None,
        }
    }

    /// Server message when present, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or_else(|| fallback.to_string())
    }
}

/// Errors from a `SecretStore` backend.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secret file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to resolve app data dir")]
    NoDataDir,
}

/// Field name to human-readable message. Only the first error per field is
/// kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already has one.
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

const GENERIC_FALLBACK: &str = "Try again.";
const LOGIN_FALLBACK: &str = "Invalid credentials. Please try again.";

/// Errors returned by session and todo store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local input check failed; nothing was sent.
    #[error("invalid input: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The credentials exchange itself failed.
    #[error("login failed: {0}")]
    Login(ApiError),

    #[error("secret store: {0}")]
    SecretStore(#[from] SecretStoreError),

    /// The id is not present in the cached todo list.
    #[error("todo {0} is not in the cached list")]
    UnknownTodo(i64),
}

impl Error {
    /// Message suitable for an alert. When the server did not explain itself
    /// this falls back to a generic per-operation message.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(errors) => errors.to_string(),
            Error::Api(e) => e.user_message(GENERIC_FALLBACK),
            Error::Login(e) => e.user_message(LOGIN_FALLBACK),
            Error::SecretStore(_) => "Could not access secure storage.".to_string(),
            Error::UnknownTodo(_) => GENERIC_FALLBACK.to_string(),
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
