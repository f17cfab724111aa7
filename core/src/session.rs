//! Auth session state machine.
//!
//! `Restoring → {Authenticated, Unauthenticated}`. The session owns the only
//! copy of the current user; the bearer token lives in the secret store and
//! is read by `ApiClient` on each call.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::api::ApiClient;
use crate::error::Error;
use crate::transport::Transport;
use crate::types::User;
use crate::validation::{validate_login, validate_signup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Restoring,
    Authenticated(User),
    Unauthenticated,
}

pub struct SessionManager<T> {
    api: Arc<ApiClient<T>>,
    status: Mutex<SessionStatus>,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(api: Arc<ApiClient<T>>) -> Self {
        Self {
            api,
            status: Mutex::new(SessionStatus::Restoring),
        }
    }

    fn slot(&self) -> MutexGuard<'_, SessionStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: SessionStatus) {
        match &next {
            SessionStatus::Authenticated(user) => info!("session authenticated as {}", user.username),
            SessionStatus::Unauthenticated => info!("session unauthenticated"),
            SessionStatus::Restoring => info!("restoring session"),
        }
        *self.slot() = next;
    }

    pub fn status(&self) -> SessionStatus {
        self.slot().clone()
    }

    pub fn user(&self) -> Option<User> {
        match &*self.slot() {
            SessionStatus::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.slot(), SessionStatus::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.slot(), SessionStatus::Restoring)
    }

    /// Restore a session from a stored token. Never fails: an unreadable or
    /// rejected token is dropped and the session ends up unauthenticated.
    pub async fn bootstrap(&self) -> SessionStatus {
        self.transition(SessionStatus::Restoring);

        let token = match self.api.secrets().get() {
            Ok(token) => token,
            Err(err) => {
                warn!("could not read stored token, discarding it: {err}");
                self.forget_token();
                None
            }
        };
        if token.is_none() {
            self.transition(SessionStatus::Unauthenticated);
            return self.status();
        }

        match self.api.me().await {
            Ok(user) => self.transition(SessionStatus::Authenticated(user)),
            Err(err) => {
                warn!("stored session is no longer valid: {err}");
                self.forget_token();
                self.transition(SessionStatus::Unauthenticated);
            }
        }
        self.status()
    }

    /// Exchange credentials for a token, store it, and load the user. A
    /// failed attempt leaves the session unauthenticated.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let result = self.authenticate(username, password).await;
        if result.is_err() {
            let mut status = self.slot();
            if *status == SessionStatus::Restoring {
                *status = SessionStatus::Unauthenticated;
            }
        }
        result
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<User, Error> {
        let credentials = validate_login(username, password).map_err(Error::Validation)?;
        let token = self.api.login(&credentials).await.map_err(|err| match err {
            Error::Api(e) => Error::Login(e),
            other => other,
        })?;
        self.api.secrets().set(&token.access_token)?;

        match self.api.me().await {
            Ok(user) => {
                self.transition(SessionStatus::Authenticated(user.clone()));
                Ok(user)
            }
            Err(err) => {
                self.forget_token();
                self.transition(SessionStatus::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Create an account. The caller logs in separately afterwards.
    pub async fn signup(&self, username: &str, password: &str) -> Result<User, Error> {
        let credentials = validate_signup(username, password).map_err(Error::Validation)?;
        let user = self.api.register(&credentials).await?;
        info!("registered {}", user.username);
        Ok(user)
    }

    pub fn logout(&self) {
        self.forget_token();
        self.transition(SessionStatus::Unauthenticated);
    }

    /// Re-fetch the current user. Errors leave the session as it was.
    pub async fn refresh_me(&self) -> Result<User, Error> {
        let user = self.api.me().await?;
        let mut status = self.slot();
        if let SessionStatus::Authenticated(current) = &mut *status {
            *current = user.clone();
        }
        Ok(user)
    }

    fn forget_token(&self) {
        if let Err(err) = self.api.secrets().clear() {
            warn!("could not clear stored token: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SecretStoreError;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::secret::{FileSecretStore, MemorySecretStore, SecretStore};
    use crate::testing::{detail, json, FakeTransport};

    fn ada() -> User {
        User {
            id: 1,
            username: "ada".to_string(),
            is_active: true,
        }
    }

    /// Accepts ada/secret1 and token "good".
    fn backend() -> FakeTransport {
        FakeTransport::new(|req| {
            let path = req.path.trim_start_matches("http://api.test");
            match (req.method, path) {
                (HttpMethod::Post, "/auth/login") => {
                    if req.body.as_deref() == Some("username=ada&password=secret1") {
                        json(200, &serde_json::json!({"access_token": "good", "token_type": "bearer"}))
                    } else {
                        detail(401, "Incorrect username or password")
                    }
                }
                (HttpMethod::Post, "/auth/register") => {
                    let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                    if body["username"] == "ada" {
                        detail(400, "Username already registered")
                    } else {
                        json(201, &serde_json::json!({"id": 2, "username": body["username"], "is_active": true}))
                    }
                }
                (HttpMethod::Get, "/auth/me") => match req.header("authorization") {
                    Some("Bearer good") => json(200, &ada()),
                    _ => detail(401, "Could not validate credentials"),
                },
                _ => detail(404, "Not Found"),
            }
        })
    }

    fn manager(secrets: Arc<dyn SecretStore>, transport: FakeTransport) -> SessionManager<FakeTransport> {
        SessionManager::new(Arc::new(ApiClient::new("http://api.test", transport, secrets)))
    }

    #[tokio::test]
    async fn starts_restoring() {
        let session = manager(Arc::new(MemorySecretStore::new()), backend());
        assert!(session.is_loading());
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn bootstrap_without_token_skips_network() {
        let session = manager(Arc::new(MemorySecretStore::new()), backend());
        assert_eq!(session.bootstrap().await, SessionStatus::Unauthenticated);
        assert!(session.api.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_valid_token_authenticates() {
        let session = manager(Arc::new(MemorySecretStore::with_token("good")), backend());
        assert_eq!(session.bootstrap().await, SessionStatus::Authenticated(ada()));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn bootstrap_with_rejected_token_clears_it() {
        let secrets = Arc::new(MemorySecretStore::with_token("expired"));
        let session = manager(secrets.clone(), backend());
        assert_eq!(session.bootstrap().await, SessionStatus::Unauthenticated);
        assert_eq!(secrets.get().unwrap(), None);
    }

    #[tokio::test]
    async fn bootstrap_survives_transport_failure() {
        let secrets = Arc::new(MemorySecretStore::with_token("good"));
        let offline = FakeTransport::new(|_| Err(crate::ApiError::Transport("connection refused".to_string())));
        let session = manager(secrets.clone(), offline);
        assert_eq!(session.bootstrap().await, SessionStatus::Unauthenticated);
        assert_eq!(secrets.get().unwrap(), None);
    }

    #[tokio::test]
    async fn login_stores_token_and_loads_user() {
        let secrets = Arc::new(MemorySecretStore::new());
        let session = manager(secrets.clone(), backend());
        session.bootstrap().await;

        let user = session.login("ada", "secret1").await.unwrap();
        assert_eq!(user, ada());
        assert_eq!(secrets.get().unwrap().as_deref(), Some("good"));
        assert_eq!(session.status(), SessionStatus::Authenticated(ada()));
    }

    #[tokio::test]
    async fn rejected_login_surfaces_server_message() {
        let secrets = Arc::new(MemorySecretStore::new());
        let session = manager(secrets.clone(), backend());
        session.bootstrap().await;

        let err = session.login("ada", "wrong-password").await.unwrap_err();
        assert_eq!(err.user_message(), "Incorrect username or password");
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(secrets.get().unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_login_form_is_rejected_locally() {
        let session = manager(Arc::new(MemorySecretStore::new()), backend());
        let err = session.login("", "123").await.unwrap_err();
        let errors = err.field_errors().unwrap();
        assert!(errors.get("username").is_some());
        assert!(errors.get("password").is_some());
        assert!(session.api.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn login_with_failing_me_leaves_no_token() {
        let secrets = Arc::new(MemorySecretStore::new());
        let transport = FakeTransport::new(|req| {
            if req.path.ends_with("/auth/login") {
                json(200, &serde_json::json!({"access_token": "good"}))
            } else {
                detail(500, "boom")
            }
        });
        let session = manager(secrets.clone(), transport);
        session.bootstrap().await;

        assert!(session.login("ada", "secret1").await.is_err());
        assert_eq!(secrets.get().unwrap(), None);
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn signup_does_not_authenticate() {
        let secrets = Arc::new(MemorySecretStore::new());
        let session = manager(secrets.clone(), backend());
        session.bootstrap().await;

        let user = session.signup("grace", "hopper1").await.unwrap();
        assert_eq!(user.username, "grace");
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(secrets.get().unwrap(), None);

        let err = session.signup("ada", "secret1").await.unwrap_err();
        assert_eq!(err.user_message(), "Username already registered");
    }

    #[tokio::test]
    async fn logout_then_bootstrap_goes_straight_to_unauthenticated() {
        let secrets = Arc::new(MemorySecretStore::with_token("good"));
        let session = manager(secrets.clone(), backend());
        session.bootstrap().await;
        assert!(session.is_authenticated());

        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(secrets.get().unwrap(), None);

        let before = session.api.transport().requests().len();
        assert_eq!(session.bootstrap().await, SessionStatus::Unauthenticated);
        assert_eq!(session.api.transport().requests().len(), before);
    }

    struct BrokenStore;

    impl SecretStore for BrokenStore {
        fn get(&self) -> Result<Option<String>, SecretStoreError> {
            Ok(Some("good".to_string()))
        }
        fn set(&self, _token: &str) -> Result<(), SecretStoreError> {
            Err(SecretStoreError::NoDataDir)
        }
        fn clear(&self) -> Result<(), SecretStoreError> {
            Err(SecretStoreError::NoDataDir)
        }
    }

    #[tokio::test]
    async fn logout_succeeds_even_if_store_fails() {
        let session = manager(Arc::new(BrokenStore), backend());
        session.bootstrap().await;
        assert!(session.is_authenticated());
        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn refresh_me_updates_user_and_keeps_state_on_error() {
        let secrets = Arc::new(MemorySecretStore::with_token("good"));
        let session = manager(secrets.clone(), backend());
        session.bootstrap().await;

        assert_eq!(session.refresh_me().await.unwrap(), ada());
        assert!(session.is_authenticated());

        secrets.set("revoked").unwrap();
        let err = session.refresh_me().await.unwrap_err();
        assert!(matches!(&err, Error::Api(e) if e.is_unauthorized()));
        assert_eq!(session.status(), SessionStatus::Authenticated(ada()));
    }

    #[tokio::test]
    async fn unreadable_token_file_is_discarded_and_login_works() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::in_dir(dir.path());
        std::fs::write(store.path(), "{truncated").unwrap();
        let secrets = Arc::new(store.clone());
        let session = manager(secrets, backend());

        assert_eq!(session.bootstrap().await, SessionStatus::Unauthenticated);
        assert!(!store.path().exists());
        assert!(session.api.transport().requests().is_empty());

        assert_eq!(session.login("ada", "secret1").await.unwrap(), ada());
        assert_eq!(store.get().unwrap().as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn login_rejection_without_detail_uses_credentials_message() {
        let transport = FakeTransport::new(|_| Ok(HttpResponse::new(401, "Unauthorized")));
        let session = manager(Arc::new(MemorySecretStore::new()), transport);
        session.bootstrap().await;

        let err = session.login("ada", "secret1").await.unwrap_err();
        assert!(matches!(&err, Error::Login(e) if e.is_unauthorized()));
        assert_eq!(err.user_message(), "Invalid credentials. Please try again.");
    }

    #[tokio::test]
    async fn failed_login_before_bootstrap_settles_unauthenticated() {
        let session = manager(Arc::new(MemorySecretStore::new()), backend());
        assert!(session.is_loading());

        session.login("ada", "wrong-password").await.unwrap_err();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }
}
