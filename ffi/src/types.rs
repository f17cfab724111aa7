//! C layouts for requests, todos, users and parse results.
//!
//! Strings cross as NUL-terminated heap pointers, lists as pointer + length,
//! and enums carry fixed discriminants so the generated header stays stable.
//! Everything allocated here is released by the `todo_free_*` functions.

use std::ffi::CString;
use std::os::raw::c_char;

use todo_mobile_core::error::ApiError;
use todo_mobile_core::http::HttpMethod;
use todo_mobile_core::{Todo, User};

/// Opaque client handle; holds the base URL.
pub struct FfiTodoClient {
    pub(crate) inner: todo_mobile_core::TodoClient,
}

/// Move a Rust string onto the C heap. Interior NULs cannot be represented
/// and yield an empty string.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

fn opt_into_c_string(s: Option<String>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), into_c_string)
}

// ---------------------------------------------------------------------------
// Outgoing requests
// ---------------------------------------------------------------------------

#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Patch = 2,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Patch => FfiHttpMethod::Patch,
        }
    }
}

/// One `name: value` header pair.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A request for the host to send. `body` is null for GET; `headers` is
/// null when `headers_len` is zero.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: todo_mobile_core::HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: into_c_string(k),
                    value: into_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            path: into_c_string(req.path),
            headers,
            headers_len,
            body: opt_into_c_string(req.body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Incoming responses
// ---------------------------------------------------------------------------

/// Status and body the host received. Owned by the host; only borrowed for
/// the duration of a `todo_parse_*` call.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Parse results
// ---------------------------------------------------------------------------

#[repr(C)]
pub enum FfiErrorCode {
    Ok = 0,
    Http = 1,
    Transport = 2,
    Deserialization = 3,
    Serialization = 4,
    Panic = 5,
    NullArg = 6,
}

/// What `FfiTodoResult::data` holds.
#[repr(C)]
pub enum FfiDataTag {
    None = 0,
    Todo = 1,
    TodoList = 2,
    User = 3,
    /// `data` is a NUL-terminated access token.
    Token = 4,
}

/// A single todo item exposed to C. `description` may be null; timestamps
/// are RFC 3339 strings.
#[repr(C)]
pub struct FfiTodo {
    pub id: i64,
    pub title: *mut c_char,
    pub description: *mut c_char,
    pub completed: bool,
    pub created_at: *mut c_char,
    pub updated_at: *mut c_char,
}

impl FfiTodo {
    fn from_core(todo: Todo) -> Self {
        FfiTodo {
            id: todo.id,
            title: into_c_string(todo.title),
            description: opt_into_c_string(todo.description),
            completed: todo.completed,
            created_at: into_c_string(todo.created_at.to_rfc3339()),
            updated_at: into_c_string(todo.updated_at.to_rfc3339()),
        }
    }
}

#[repr(C)]
pub struct FfiTodoList {
    pub items: *mut FfiTodo,
    pub len: u32,
}

#[repr(C)]
pub struct FfiUser {
    pub id: i64,
    pub username: *mut c_char,
    pub is_active: bool,
}

/// Outcome of a `todo_parse_*` call. Exactly one of `data` and
/// `error_message` is non-null. `http_status` is set for `Http` errors only.
#[repr(C)]
pub struct FfiTodoResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut std::ffi::c_void,
}

impl FfiTodoResult {
    fn ok(data_tag: FfiDataTag, data: *mut std::ffi::c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiTodoResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data_tag,
            data,
        }))
    }

    fn err(error_code: FfiErrorCode, http_status: u16, msg: String) -> *mut Self {
        Box::into_raw(Box::new(FfiTodoResult {
            error_code,
            error_message: into_c_string(msg),
            http_status,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn ok_todo(todo: Todo) -> *mut Self {
        let ffi_todo = Box::new(FfiTodo::from_core(todo));
        Self::ok(FfiDataTag::Todo, Box::into_raw(ffi_todo) as *mut std::ffi::c_void)
    }

    pub(crate) fn ok_todo_list(todos: Vec<Todo>) -> *mut Self {
        let len = todos.len() as u32;
        let items = if todos.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_todos: Box<[FfiTodo]> = todos.into_iter().map(FfiTodo::from_core).collect();
            Box::into_raw(ffi_todos) as *mut FfiTodo
        };
        let ffi_list = Box::new(FfiTodoList { items, len });
        Self::ok(FfiDataTag::TodoList, Box::into_raw(ffi_list) as *mut std::ffi::c_void)
    }

    pub(crate) fn ok_user(user: User) -> *mut Self {
        let ffi_user = Box::new(FfiUser {
            id: user.id,
            username: into_c_string(user.username),
            is_active: user.is_active,
        });
        Self::ok(FfiDataTag::User, Box::into_raw(ffi_user) as *mut std::ffi::c_void)
    }

    pub(crate) fn ok_token(token: String) -> *mut Self {
        Self::ok(FfiDataTag::Token, into_c_string(token) as *mut std::ffi::c_void)
    }

    /// Build an error result from an `ApiError`. HTTP failures carry the
    /// server's `detail` message when there is one.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        match &err {
            ApiError::Http { status, .. } => {
                Self::err(FfiErrorCode::Http, *status, err.user_message("Try again."))
            }
            ApiError::Transport(_) => Self::err(FfiErrorCode::Transport, 0, err.to_string()),
            ApiError::Deserialization(_) => Self::err(FfiErrorCode::Deserialization, 0, err.to_string()),
            ApiError::Serialization(_) => Self::err(FfiErrorCode::Serialization, 0, err.to_string()),
        }
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::err(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::err(FfiErrorCode::Panic, 0, msg.to_string())
    }
}
