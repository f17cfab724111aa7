//! Async API client: `TodoClient` + a `Transport` + the token store.
//!
//! The token is read from the secret store on every call and attached as a
//! bearer header when present. Nothing is retried or refreshed here.

use std::sync::Arc;

use crate::client::TodoClient;
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::secret::SecretStore;
use crate::transport::Transport;
use crate::types::{AuthToken, CreateTodo, Credentials, Todo, UpdateTodo, User};

pub struct ApiClient<T> {
    client: TodoClient,
    transport: T,
    secrets: Arc<dyn SecretStore>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(base_url: &str, transport: T, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            client: TodoClient::new(base_url),
            transport,
            secrets,
        }
    }

    pub fn secrets(&self) -> &Arc<dyn SecretStore> {
        &self.secrets
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let request = match self.secrets.get()? {
            Some(token) => request.with_bearer(&token),
            None => request,
        };
        Ok(self.transport.execute(request).await?)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthToken, Error> {
        let response = self.send(self.client.build_login(credentials)).await?;
        Ok(self.client.parse_login(response)?)
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<User, Error> {
        let request = self.client.build_register(credentials)?;
        let response = self.send(request).await?;
        Ok(self.client.parse_register(response)?)
    }

    pub async fn me(&self) -> Result<User, Error> {
        let response = self.send(self.client.build_me()).await?;
        Ok(self.client.parse_me(response)?)
    }

    pub async fn list_todos(&self) -> Result<Vec<Todo>, Error> {
        let response = self.send(self.client.build_list_todos()).await?;
        Ok(self.client.parse_list_todos(response)?)
    }

    pub async fn create_todo(&self, input: &CreateTodo) -> Result<Todo, Error> {
        let request = self.client.build_create_todo(input)?;
        let response = self.send(request).await?;
        Ok(self.client.parse_create_todo(response)?)
    }

    pub async fn update_todo(&self, id: i64, input: &UpdateTodo) -> Result<Todo, Error> {
        let request = self.client.build_update_todo(id, input)?;
        let response = self.send(request).await?;
        Ok(self.client.parse_update_todo(response)?)
    }
}
