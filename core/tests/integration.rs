//! Full auth + todo lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the stateless
//! `TodoClient` over real HTTP using ureq, the way a native host would:
//! build, attach the token, execute, parse. Validates request building and
//! response parsing end-to-end against the actual server.

use todo_mobile_core::{
    CreateTodo, Credentials, HttpMethod, HttpRequest, HttpResponse, TodoClient, UpdateTodo,
};

/// Execute an `HttpRequest` using ureq and return an `HttpResponse`.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data rather than `Err`, letting the core
/// client handle status interpretation.
fn execute(req: HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = match req.method {
        HttpMethod::Get => {
            let mut builder = agent.get(&req.path);
            for (k, v) in &req.headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            builder.call()
        }
        HttpMethod::Post | HttpMethod::Patch => {
            let mut builder = if req.method == HttpMethod::Post {
                agent.post(&req.path)
            } else {
                agent.patch(&req.path)
            };
            for (k, v) in &req.headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            match req.body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    HttpResponse {
        status,
        headers: Vec::new(),
        body,
    }
}

fn start_server() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

#[test]
fn auth_and_todo_lifecycle() {
    let addr = start_server();
    let client = TodoClient::new(&format!("http://{addr}"));
    let creds = Credentials::new("ada", "secret1");

    // Step 1: no token: me and list are rejected.
    let err = client.parse_me(execute(client.build_me())).unwrap_err();
    assert!(err.is_unauthorized());
    let err = client
        .parse_list_todos(execute(client.build_list_todos()))
        .unwrap_err();
    assert!(err.is_unauthorized());

    // Step 2: register, twice.
    let req = client.build_register(&creds).unwrap();
    let user = client.parse_register(execute(req)).unwrap();
    assert_eq!(user.username, "ada");
    let req = client.build_register(&creds).unwrap();
    let err = client.parse_register(execute(req)).unwrap_err();
    assert_eq!(err.detail().as_deref(), Some("Username already registered"));

    // Step 3: wrong password, then login.
    let req = client.build_login(&Credentials::new("ada", "wrong-one"));
    let err = client.parse_login(execute(req)).unwrap_err();
    assert_eq!(err.user_message("Invalid credentials."), "Incorrect username or password");
    let token = client
        .parse_login(execute(client.build_login(&creds)))
        .unwrap()
        .access_token;

    // Step 4: me.
    let me = client
        .parse_me(execute(client.build_me().with_bearer(&token)))
        .unwrap();
    assert_eq!(me, user);

    // Step 5: list: empty.
    let req = client.build_list_todos().with_bearer(&token);
    assert!(client.parse_list_todos(execute(req)).unwrap().is_empty());

    // Step 6: create two todos.
    let input = CreateTodo {
        title: "Integration test".to_string(),
        description: None,
        completed: false,
    };
    let req = client.build_create_todo(&input).unwrap().with_bearer(&token);
    let first = client.parse_create_todo(execute(req)).unwrap();
    assert_eq!(first.title, "Integration test");
    assert!(first.description.is_none());

    let input = CreateTodo {
        title: "Second".to_string(),
        description: Some("with notes".to_string()),
        completed: false,
    };
    let req = client.build_create_todo(&input).unwrap().with_bearer(&token);
    let second = client.parse_create_todo(execute(req)).unwrap();

    // Step 7: list: newest first, parsed exactly as created.
    let req = client.build_list_todos().with_bearer(&token);
    let todos = client.parse_list_todos(execute(req)).unwrap();
    assert_eq!(todos, vec![second.clone(), first.clone()]);

    // Step 8: complete the first.
    let req = client
        .build_update_todo(first.id, &UpdateTodo::completed(true))
        .unwrap()
        .with_bearer(&token);
    let updated = client.parse_update_todo(execute(req)).unwrap();
    assert!(updated.completed);
    assert_eq!(updated.title, first.title);

    // Step 9: unknown id.
    let req = client
        .build_update_todo(9_999, &UpdateTodo::completed(true))
        .unwrap()
        .with_bearer(&token);
    let err = client.parse_update_todo(execute(req)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.detail().as_deref(), Some("Todo not found"));
}
