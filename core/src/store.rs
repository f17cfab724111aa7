//! Todo list cache and mutation coordinator.
//!
//! # Design
//! The list lives in a `QueryCache` under `TODOS`. Mutations follow two
//! policies:
//! - create patches the cache: the server's echo is prepended, no refetch.
//! - completion changes are optimistic: cancel any in-flight refetch,
//!   snapshot, write the flipped value, call the server, restore the
//!   snapshot on failure, then always refetch to reconcile.
//!
//! Concurrent toggles each keep their own snapshot. Whichever restore lands
//! last wins until the trailing refetch replaces the list with server truth.

use std::sync::Arc;

use log::{debug, warn};

use crate::api::ApiClient;
use crate::cache::{QueryCache, QueryKey};
use crate::error::Error;
use crate::filter::{filter_todos, remaining_count, Filter};
use crate::transport::Transport;
use crate::types::{Todo, UpdateTodo};
use crate::validation::validate_todo_create;

pub const TODOS: QueryKey = QueryKey::new("todos");

/// What a list screen renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    pub todos: Vec<Todo>,
    /// First load, nothing to show yet.
    pub loading: bool,
    /// Background refetch while previous data is still shown.
    pub refreshing: bool,
    pub error: Option<String>,
}

pub struct TodoStore<T> {
    api: Arc<ApiClient<T>>,
    cache: QueryCache<Vec<Todo>>,
}

impl<T: Transport> TodoStore<T> {
    pub fn new(api: Arc<ApiClient<T>>) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
        }
    }

    pub fn state(&self) -> ListState {
        let status = self.cache.status(TODOS);
        let has_data = status.data.is_some();
        ListState {
            todos: status.data.unwrap_or_default(),
            loading: status.fetching && !has_data,
            refreshing: status.fetching && has_data,
            error: status.error,
        }
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.cache.get(TODOS).unwrap_or_default()
    }

    pub fn filtered(&self, filter: Filter) -> Vec<Todo> {
        filter_todos(&self.todos(), filter)
    }

    pub fn remaining(&self) -> usize {
        remaining_count(&self.todos())
    }

    /// Fetch the full list and replace the cache, unless a newer fetch or a
    /// cancellation superseded this one in the meantime.
    pub async fn refresh(&self) -> Result<Vec<Todo>, Error> {
        let ticket = self.cache.begin_fetch(TODOS);
        match self.api.list_todos().await {
            Ok(todos) => {
                if self.cache.finish_fetch(TODOS, ticket, todos.clone()) {
                    debug!("cached {} todos", todos.len());
                }
                Ok(todos)
            }
            Err(err) => {
                warn!("failed to load todos: {err}");
                self.cache.fail_fetch(TODOS, ticket, err.user_message());
                Err(err)
            }
        }
    }

    /// Validate locally, create on the server, prepend the result.
    pub async fn create(&self, title: &str, description: Option<&str>) -> Result<Todo, Error> {
        let input = validate_todo_create(title, description).map_err(Error::Validation)?;
        let created = self.api.create_todo(&input).await.inspect_err(|err| {
            warn!("create todo failed: {err}");
        })?;

        self.cache.update(TODOS, |old| {
            let mut next = Vec::with_capacity(old.map_or(1, |o| o.len() + 1));
            next.push(created.clone());
            next.extend(old.into_iter().flatten().cloned());
            Some(next)
        });
        Ok(created)
    }

    /// Flip `completed` for a cached todo.
    pub async fn toggle_completed(&self, id: i64) -> Result<Todo, Error> {
        let current = self
            .cache
            .get(TODOS)
            .and_then(|list| list.iter().find(|t| t.id == id).map(|t| t.completed))
            .ok_or(Error::UnknownTodo(id))?;
        self.set_completed(id, !current).await
    }

    /// Optimistically set `completed`, then reconcile with the server.
    pub async fn set_completed(&self, id: i64, completed: bool) -> Result<Todo, Error> {
        self.cache.cancel(TODOS);
        let snapshot = self.cache.get(TODOS);
        self.cache.update(TODOS, |old| {
            old.map(|list| {
                list.iter()
                    .map(|t| {
                        if t.id == id {
                            Todo {
                                completed,
                                ..t.clone()
                            }
                        } else {
                            t.clone()
                        }
                    })
                    .collect()
            })
        });

        let result = self
            .api
            .update_todo(id, &UpdateTodo::completed(completed))
            .await;
        if let Err(err) = &result {
            warn!("update of todo {id} failed, restoring snapshot: {err}");
            self.cache.restore(TODOS, snapshot);
        }

        if let Err(err) = self.refresh().await {
            debug!("reconciling refetch after todo {id} failed: {err}");
        }
        result
    }

    /// Forget the cached list, e.g. when the session ends.
    pub fn clear(&self) {
        self.cache.remove(TODOS);
    }
}
