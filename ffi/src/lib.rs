//! C ABI for native mobile shells that do their own networking.
//!
//! The shell asks for a request (`todo_build_*`), sends it with its platform
//! HTTP stack, and hands status + body back (`todo_parse_*`). It keeps the
//! bearer token in its own keychain and passes it to each builder that needs
//! one. No async runtime is linked.
//!
//! Panics are caught at every entry point. Every returned pointer belongs to
//! the caller until it is passed to the matching `todo_free_*`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use todo_mobile_core::error::ApiError;
use todo_mobile_core::validation;
use todo_mobile_core::{Credentials, HttpRequest, HttpResponse, TodoClient, UpdateTodo};

use types::*;

/// Read a nullable C string. Invalid UTF-8 reads as empty.
fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or(""))
    }
}

/// Read a required C string; null or invalid UTF-8 gives `None`.
fn utf8_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }
}

fn authorized(req: HttpRequest, token: *const c_char) -> HttpRequest {
    match opt_str(token) {
        Some(token) if !token.is_empty() => req.with_bearer(token),
        _ => req,
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Route the library's `log` output to stderr. `RUST_LOG` overrides the
/// default level (debug in debug builds, info otherwise). Calling more than
/// once is harmless.
#[unsafe(no_mangle)]
pub extern "C" fn todo_init_logging() {
    let _ = catch_unwind(|| {
        let _ = env_logger::Builder::new()
            .filter_level(if cfg!(debug_assertions) {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            })
            .parse_default_env()
            .try_init();
    });
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Allocate a client for `base_url`; null on a null URL. Release with
/// `todo_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_client_new(base_url: *const c_char) -> *mut FfiTodoClient {
    catch_unwind(|| {
        let Some(url) = opt_str(base_url) else {
            return std::ptr::null_mut();
        };
        let client = TodoClient::new(url);
        log::debug!("ffi client created for {}", client.base_url());
        Box::into_raw(Box::new(FfiTodoClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn todo_client_free(client: *mut FfiTodoClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Form-encoded `POST /auth/login`. Null if any argument is null or not
/// valid UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_login(
    client: *const FfiTodoClient,
    username: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let (Some(username), Some(password)) = (utf8_str(username), utf8_str(password)) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        let req = client.inner.build_login(&Credentials::new(username, password));
        FfiHttpRequest::from_core(req)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a JSON registration request.
///
/// Returns null if any argument is null or not valid UTF-8, or if
/// serialization fails.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_register(
    client: *const FfiTodoClient,
    username: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let (Some(username), Some(password)) = (utf8_str(username), utf8_str(password)) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        match client.inner.build_register(&Credentials::new(username, password)) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for the signed-in user's profile.
///
/// `token` may be null, in which case no `Authorization` header is sent.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_me(
    client: *const FfiTodoClient,
    token: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(authorized(client.inner.build_me(), token))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// `GET /todos`, newest first.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_list_todos(
    client: *const FfiTodoClient,
    token: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(authorized(client.inner.build_list_todos(), token))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// `POST /todos`. `description` may be null. Returns null if `client` or
/// `title` is null or if the input fails validation; `todo_validate_todo`
/// says which field was rejected.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_create_todo(
    client: *const FfiTodoClient,
    token: *const c_char,
    title: *const c_char,
    description: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(title) = opt_str(title) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        let Ok(input) = validation::validate_todo_create(title, opt_str(description)) else {
            return std::ptr::null_mut();
        };
        match client.inner.build_create_todo(&input) {
            Ok(req) => FfiHttpRequest::from_core(authorized(req, token)),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// `PATCH /todos/{id}`. Null `title`/`description` are left unchanged;
/// `completed` is -1 to skip, 0 or 1 to set.
#[unsafe(no_mangle)]
pub extern "C" fn todo_build_update_todo(
    client: *const FfiTodoClient,
    token: *const c_char,
    id: i64,
    title: *const c_char,
    description: *const c_char,
    completed: i32,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let completed = match completed {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        };
        let input = UpdateTodo {
            title: opt_str(title).map(str::to_string),
            description: opt_str(description).map(str::to_string),
            completed,
        };
        match client.inner.build_update_todo(id, &input) {
            Ok(req) => FfiHttpRequest::from_core(authorized(req, token)),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn field_errors_json(result: Result<(), todo_mobile_core::FieldErrors>) -> *mut c_char {
    match result {
        Ok(()) => std::ptr::null_mut(),
        Err(errors) => match serde_json::to_string(errors.as_map()) {
            Ok(json) => into_c_string(json),
            Err(_) => std::ptr::null_mut(),
        },
    }
}

/// Validate a new todo's fields.
///
/// Returns null when the input is acceptable, otherwise a JSON object
/// mapping field name to message, e.g. `{"title":"Title is required"}`.
/// A null `title` is treated as empty. Free the string with
/// `todo_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_validate_todo(
    title: *const c_char,
    description: *const c_char,
) -> *mut c_char {
    catch_unwind(|| {
        let title = opt_str(title).unwrap_or("");
        field_errors_json(validation::validate_todo_create(title, opt_str(description)).map(|_| ()))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Validate sign-up credentials. Same return convention as
/// `todo_validate_todo`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_validate_signup(
    username: *const c_char,
    password: *const c_char,
) -> *mut c_char {
    catch_unwind(|| {
        let username = opt_str(username).unwrap_or("");
        let password = opt_str(password).unwrap_or("");
        field_errors_json(validation::validate_signup(username, password).map(|_| ()))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body is
/// read as an empty string.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    HttpResponse::new(resp.status, opt_str(resp.body).unwrap_or(""))
}

/// Shared null checks, conversion and panic guard for the parse functions.
fn parse_with<T>(
    name: &str,
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
    parse: impl FnOnce(&TodoClient, HttpResponse) -> Result<T, ApiError>,
    ok: impl FnOnce(T) -> *mut FfiTodoResult,
) -> *mut FfiTodoResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiTodoResult::null_arg("client");
        }
        if response.is_null() {
            return FfiTodoResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match parse(&client.inner, ffi_response_to_core(resp)) {
            Ok(value) => ok(value),
            Err(e) => {
                log::debug!("{name}: {e}");
                FfiTodoResult::from_error(e)
            }
        }
    }))
    .unwrap_or_else(|_| FfiTodoResult::panic(&format!("panic in {name}")))
}

/// On success `data_tag = Token` and `data` is the access token string.
#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_login(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with("todo_parse_login", client, response, TodoClient::parse_login, |token| {
        FfiTodoResult::ok_token(token.access_token)
    })
}

/// Expects 201; `data_tag = User`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_register(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with(
        "todo_parse_register",
        client,
        response,
        TodoClient::parse_register,
        FfiTodoResult::ok_user,
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_me(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with("todo_parse_me", client, response, TodoClient::parse_me, FfiTodoResult::ok_user)
}

/// `data_tag = TodoList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_list_todos(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with(
        "todo_parse_list_todos",
        client,
        response,
        TodoClient::parse_list_todos,
        FfiTodoResult::ok_todo_list,
    )
}

/// Expects 201; `data_tag = Todo`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_create_todo(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with(
        "todo_parse_create_todo",
        client,
        response,
        TodoClient::parse_create_todo,
        FfiTodoResult::ok_todo,
    )
}

/// `data_tag = Todo` on success.
#[unsafe(no_mangle)]
pub extern "C" fn todo_parse_update_todo(
    client: *const FfiTodoClient,
    response: *const FfiHttpResponse,
) -> *mut FfiTodoResult {
    parse_with(
        "todo_parse_update_todo",
        client,
        response,
        TodoClient::parse_update_todo,
        FfiTodoResult::ok_todo,
    )
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Release a request from any `todo_build_*`. Null is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.path);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Vec::from_raw_parts(req.headers, req.headers_len as usize, req.headers_len as usize)
            };
            for h in headers {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Release a result from any `todo_parse_*`, including its payload.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_result(result: *mut FfiTodoResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Todo => {
                let todo = unsafe { Box::from_raw(result.data as *mut FfiTodo) };
                free_ffi_todo_fields(&todo);
            }
            FfiDataTag::TodoList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiTodoList) };
                if !list.items.is_null() && list.len > 0 {
                    let items = unsafe {
                        Vec::from_raw_parts(list.items, list.len as usize, list.len as usize)
                    };
                    for item in &items {
                        free_ffi_todo_fields(item);
                    }
                }
            }
            FfiDataTag::User => {
                let user = unsafe { Box::from_raw(result.data as *mut FfiUser) };
                free_c_string(user.username);
            }
            FfiDataTag::Token => free_c_string(result.data as *mut c_char),
            FfiDataTag::None => {}
        }
    });
}

fn free_ffi_todo_fields(todo: &FfiTodo) {
    free_c_string(todo.title);
    free_c_string(todo.description);
    free_c_string(todo.created_at);
    free_c_string(todo.updated_at);
}

/// Release a string returned by `todo_validate_*`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
