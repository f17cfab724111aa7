//! Client core for the mobile todo app.
//!
//! # Overview
//! Everything below the screens: building and parsing API requests, the
//! bearer-token store, the auth session state machine, and the todo list
//! cache with its optimistic mutation protocol.
//!
//! # Design
//! - `TodoClient` is stateless and never touches the network: each operation
//!   is a `build_*` / `parse_*` pair (host-does-IO). Native hosts can drive
//!   it directly through the FFI crate.
//! - `Transport` is the async I/O seam; `ApiClient` pairs it with the
//!   `SecretStore` to attach the bearer token.
//! - `SessionManager` and `TodoStore` share one `ApiClient` and are handed
//!   to consumers explicitly through `AppContext`, never through globals.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod secret;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiClient;
pub use app::AppContext;
pub use cache::{QueryCache, QueryKey};
pub use client::TodoClient;
pub use config::Config;
pub use error::{ApiError, Error, FieldErrors, SecretStoreError};
pub use filter::Filter;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use secret::{FileSecretStore, MemorySecretStore, SecretStore};
pub use session::{SessionManager, SessionStatus};
pub use store::{ListState, TodoStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{AuthToken, CreateTodo, Credentials, Todo, UpdateTodo, User};
