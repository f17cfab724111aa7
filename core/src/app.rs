//! Wiring: one `ApiClient` shared by the session and the todo store.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Error;
use crate::secret::{FileSecretStore, SecretStore};
use crate::session::{SessionManager, SessionStatus};
use crate::store::TodoStore;
use crate::transport::{ReqwestTransport, Transport};

pub struct AppContext<T> {
    pub session: SessionManager<T>,
    pub todos: TodoStore<T>,
}

impl AppContext<ReqwestTransport> {
    /// Production wiring: file-backed token, reqwest transport.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secrets: Arc<dyn SecretStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileSecretStore::in_dir(dir)),
            None => Arc::new(FileSecretStore::in_app_data_dir()?),
        };
        Ok(Self::new(&config.api_base_url, ReqwestTransport::new(), secrets))
    }
}

impl<T: Transport> AppContext<T> {
    pub fn new(base_url: &str, transport: T, secrets: Arc<dyn SecretStore>) -> Self {
        let api = Arc::new(ApiClient::new(base_url, transport, secrets));
        Self {
            session: SessionManager::new(api.clone()),
            todos: TodoStore::new(api),
        }
    }

    /// Restore the session and, if that worked, load the list.
    pub async fn start(&self) -> SessionStatus {
        let status = self.session.bootstrap().await;
        if matches!(status, SessionStatus::Authenticated(_)) {
            // A failed first load is recorded in the list state.
            let _ = self.todos.refresh().await;
        }
        status
    }

    /// End the session and drop the previous user's cached list.
    pub fn logout(&self) {
        self.session.logout();
        self.todos.clear();
    }
}
