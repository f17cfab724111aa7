//! Scripted in-process transport for unit tests.
//!
//! Requests are answered by a handler closure over the request. Routes can be
//! gated: a gated request records itself and then waits until the test
//! releases it, which lets tests observe state while a call is in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::Todo;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync>;

pub(crate) struct FakeTransport {
    handler: Handler,
    log: Mutex<Vec<HttpRequest>>,
    gates: Mutex<HashMap<(HttpMethod, String), Arc<Semaphore>>>,
}

impl FakeTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Hold every `method` request whose path ends with `suffix` until
    /// `release` is called on the returned gate.
    pub(crate) fn gate(&self, method: HttpMethod, suffix: &str) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert((method, suffix.to_string()), semaphore.clone());
        Gate(semaphore)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: HttpMethod, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }

    fn gate_for(&self, request: &HttpRequest) -> Option<Arc<Semaphore>> {
        self.gates
            .lock()
            .unwrap()
            .iter()
            .find(|((method, suffix), _)| *method == request.method && request.path.ends_with(suffix.as_str()))
            .map(|(_, s)| s.clone())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(gate) = self.gate_for(&request) {
            gate.acquire().await.unwrap().forget();
        }
        (self.handler)(&request)
    }
}

pub(crate) struct Gate(Arc<Semaphore>);

impl Gate {
    pub(crate) fn release(&self) {
        self.0.add_permits(1);
    }
}

pub(crate) fn todo(id: i64, title: &str, completed: bool) -> Todo {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    Todo {
        id,
        title: title.to_string(),
        description: None,
        completed,
        created_at: at,
        updated_at: at,
    }
}

pub(crate) fn json<T: serde::Serialize>(status: u16, value: &T) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::new(status, serde_json::to_string(value).unwrap()))
}

pub(crate) fn detail(status: u16, message: &str) -> Result<HttpResponse, ApiError> {
    json(status, &serde_json::json!({ "detail": message }))
}
