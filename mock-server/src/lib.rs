use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct Backend {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, i64>,
    todos: Vec<(i64, Todo)>,
    next_user_id: i64,
    next_todo_id: i64,
}

pub type Db = Arc<RwLock<Backend>>;

/// JSON error body in the `{"detail": "..."}` shape the client surfaces.
pub struct ApiError(StatusCode, &'static str);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "detail": self.1 }))).into_response()
    }
}

const TITLE_MAX: usize = 200;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Backend::default()));
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", patch(update_todo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// The user behind the request's bearer token.
pub struct CurrentUser(pub User);

impl FromRequestParts<Db> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let unauthorized = ApiError(StatusCode::UNAUTHORIZED, "Could not validate credentials");
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(unauthorized)?;

        let backend = db.read().await;
        backend
            .tokens
            .get(token)
            .and_then(|id| backend.accounts.values().find(|a| a.user.id == *id))
            .map(|a| CurrentUser(a.user.clone()))
            .ok_or(ApiError(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let mut backend = db.write().await;
    if backend.accounts.contains_key(&input.username) {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Username already registered"));
    }
    backend.next_user_id += 1;
    let user = User {
        id: backend.next_user_id,
        username: input.username.clone(),
        is_active: true,
    };
    backend.accounts.insert(
        input.username,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    log::info!("registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(State(db): State<Db>, Form(input): Form<Credentials>) -> Result<Json<Token>, ApiError> {
    let mut backend = db.write().await;
    let user_id = backend
        .accounts
        .get(&input.username)
        .filter(|a| a.password == input.password)
        .map(|a| a.user.id)
        .ok_or(ApiError(StatusCode::UNAUTHORIZED, "Incorrect username or password"))?;

    let token = Uuid::new_v4().simple().to_string();
    backend.tokens.insert(token.clone(), user_id);
    Ok(Json(Token {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn list_todos(State(db): State<Db>, CurrentUser(user): CurrentUser) -> Json<Vec<Todo>> {
    let backend = db.read().await;
    let mut todos: Vec<Todo> = backend
        .todos
        .iter()
        .filter(|(owner, _)| *owner == user.id)
        .map(|(_, t)| t.clone())
        .collect();
    todos.sort_by(|a, b| b.id.cmp(&a.id));
    Json(todos)
}

async fn create_todo(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    check_title(&input.title)?;
    let mut backend = db.write().await;
    backend.next_todo_id += 1;
    let now = Utc::now();
    let todo = Todo {
        id: backend.next_todo_id,
        title: input.title,
        description: input.description,
        completed: input.completed,
        created_at: now,
        updated_at: now,
    };
    backend.todos.push((user.id, todo.clone()));
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, ApiError> {
    if let Some(title) = &input.title {
        check_title(title)?;
    }
    let mut backend = db.write().await;
    let todo = backend
        .todos
        .iter_mut()
        .find(|(owner, t)| *owner == user.id && t.id == id)
        .map(|(_, t)| t)
        .ok_or(ApiError(StatusCode::NOT_FOUND, "Todo not found"))?;
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(description) = input.description {
        todo.description = Some(description);
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    todo.updated_at = Utc::now();
    Ok(Json(todo.clone()))
}

fn check_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len == 0 || len > TITLE_MAX {
        return Err(ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Title must be between 1 and 200 characters",
        ));
    }
    Ok(())
}
