use axum::http::StatusCode;
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use tasktally_server::{server, storage};

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle) = match start_server(&db_path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PATCH" => self.client.patch(&url),
            "DELETE" => self.client.delete(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }

    /// Creates an account and returns its bearer token and user id.
    async fn signup_and_login(&self, email: &str, username: &str) -> (String, String) {
        self.request_expect(
            "POST",
            "/api/users/signup",
            None,
            Some(json!({
                "email": email,
                "username": username,
                "full_name": "Test User",
                "password": "s3cret!",
            })),
            StatusCode::CREATED,
        )
        .await;
        let body = self
            .request_expect(
                "POST",
                "/api/users/login",
                None,
                Some(json!({"identifier": username, "password": "s3cret!"})),
                StatusCode::OK,
            )
            .await;
        let token = body
            .get("token")
            .and_then(|v| v.as_str())
            .expect("token missing from login response")
            .to_string();
        let user_id = body
            .pointer("/user/user_id")
            .and_then(|v| v.as_str())
            .expect("user_id missing from login response")
            .to_string();
        (token, user_id)
    }

    async fn create_task(
        &self,
        token: &str,
        name: &str,
        target: i64,
        days: &[&str],
    ) -> String {
        let body = self
            .request_expect(
                "POST",
                "/api/tasks",
                Some(token),
                Some(json!({
                    "task_name": name,
                    "target_count": target,
                    "days_of_week": days,
                })),
                StatusCode::CREATED,
            )
            .await;
        body.pointer("/task/task_id")
            .and_then(|v| v.as_str())
            .expect("task_id missing from create response")
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    tmp_db: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let config = server::AppConfig {
        jwt_secret: "testsecret".into(),
        dev_cors_origin: None,
        listen_port: None,
    };

    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");

    let state = server::AppState::new(config, store);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server
        .request_expect("GET", "/healthz", None, None, StatusCode::OK)
        .await;
    let categories = server
        .request_expect("GET", "/api/categories", None, None, StatusCode::OK)
        .await;
    assert!(categories.get("categories").unwrap().as_array().unwrap().is_empty());

    let (token, _) = server.signup_and_login("alice@example.com", "alice").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn signup_and_login_validation() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };

    let invalid_signups = [
        json!({"email": "not-an-email", "username": "bob", "full_name": "Bob", "password": "s3cret!"}),
        json!({"email": "bob@example.com", "username": "ab", "full_name": "Bob", "password": "s3cret!"}),
        json!({"email": "bob@example.com", "username": "bob!", "full_name": "Bob", "password": "s3cret!"}),
        json!({"email": "bob@example.com", "username": "bob", "full_name": "  ", "password": "s3cret!"}),
        json!({"email": "bob@example.com", "username": "bob", "full_name": "Bob", "password": "short"}),
    ];
    for body in invalid_signups {
        server
            .request_expect(
                "POST",
                "/api/users/signup",
                None,
                Some(body),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }

    server.signup_and_login("bob@example.com", "bob").await;

    // Duplicate email, then duplicate username
    let dup_email = server
        .request_expect(
            "POST",
            "/api/users/signup",
            None,
            Some(json!({
                "email": "bob@example.com",
                "username": "otherbob",
                "full_name": "Bob",
                "password": "s3cret!",
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(
        dup_email
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("Email")
    );
    server
        .request_expect(
            "POST",
            "/api/users/signup",
            None,
            Some(json!({
                "email": "bob2@example.com",
                "username": "bob",
                "full_name": "Bob",
                "password": "s3cret!",
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;

    // Login works by email too, and wrong password is rejected
    server
        .request_expect(
            "POST",
            "/api/users/login",
            None,
            Some(json!({"identifier": "bob@example.com", "password": "s3cret!"})),
            StatusCode::OK,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/users/login",
            None,
            Some(json!({"identifier": "bob", "password": "wrongpw"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let id = "11111111-1111-4111-8111-111111111111";
    let cases: Vec<(&str, String, Option<Value>)> = vec![
        ("POST", "/api/categories".into(), Some(json!({"category_name": "x"}))),
        ("PATCH", format!("/api/categories/{id}"), Some(json!({"category_name": "y"}))),
        ("DELETE", format!("/api/categories/{id}"), None),
        ("GET", "/api/tasks".into(), None),
        ("POST", "/api/tasks".into(), Some(json!({"task_name": "x", "target_count": 1, "days_of_week": ["mon"]}))),
        ("PATCH", format!("/api/tasks/{id}"), Some(json!({"task_name": "y"}))),
        ("DELETE", format!("/api/tasks/{id}"), None),
        ("GET", "/api/tasks/by-date?date=2024-01-01".into(), None),
        ("POST", "/api/tasks/progress".into(), Some(json!({"task_id": id, "completed_count": 1, "date": "2024-01-01"}))),
    ];
    for (method, path, body) in cases.iter() {
        server
            .request_expect(method, path, None, body.clone(), StatusCode::UNAUTHORIZED)
            .await;
    }

    // Garbage token is as good as none
    server
        .request_expect(
            "GET",
            "/api/tasks",
            Some("not-a-jwt"),
            None,
            StatusCode::UNAUTHORIZED,
        )
        .await;
}

#[tokio::test]
async fn category_crud() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let (token, user_id) = server.signup_and_login("carol@example.com", "carol").await;
    let (other_token, _) = server.signup_and_login("dave@example.com", "dave").await;

    let created = server
        .request_expect(
            "POST",
            "/api/categories",
            Some(&token),
            Some(json!({"category_name": "Fitness", "category_emoji": "💪"})),
            StatusCode::CREATED,
        )
        .await;
    let category_id = created
        .pointer("/category/category_id")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    assert_eq!(
        created.pointer("/category/user_id").and_then(|v| v.as_str()).unwrap(),
        user_id
    );
    assert_eq!(
        created.pointer("/category/category_emoji").and_then(|v| v.as_str()).unwrap(),
        "💪"
    );

    // Name is globally unique
    server
        .request_expect(
            "POST",
            "/api/categories",
            Some(&other_token),
            Some(json!({"category_name": "Fitness"})),
            StatusCode::CONFLICT,
        )
        .await;

    // Emoji must be a single grapheme
    server
        .request_expect(
            "POST",
            "/api/categories",
            Some(&token),
            Some(json!({"category_name": "Books", "category_emoji": "📚📚"})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    // Public listing sees it without auth
    let listed = server
        .request_expect("GET", "/api/categories", None, None, StatusCode::OK)
        .await;
    assert_eq!(listed.get("categories").unwrap().as_array().unwrap().len(), 1);

    // Patch with no fields is rejected
    server
        .request_expect(
            "PATCH",
            &format!("/api/categories/{category_id}"),
            Some(&token),
            Some(json!({})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    // Rename, then clear the emoji with an explicit null
    let patched = server
        .request_expect(
            "PATCH",
            &format!("/api/categories/{category_id}"),
            Some(&token),
            Some(json!({"category_name": "Health", "category_emoji": null})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        patched.pointer("/category/category_name").and_then(|v| v.as_str()).unwrap(),
        "Health"
    );
    assert!(patched.pointer("/category/category_emoji").unwrap().is_null());

    // Only the creator may edit or delete
    server
        .request_expect(
            "PATCH",
            &format!("/api/categories/{category_id}"),
            Some(&other_token),
            Some(json!({"category_name": "Hijacked"})),
            StatusCode::NOT_FOUND,
        )
        .await;
    server
        .request_expect(
            "DELETE",
            &format!("/api/categories/{category_id}"),
            Some(&other_token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;

    let deleted = server
        .request_expect(
            "DELETE",
            &format!("/api/categories/{category_id}"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        deleted.pointer("/deleted/category_name").and_then(|v| v.as_str()).unwrap(),
        "Health"
    );
    server
        .request_expect(
            "DELETE",
            &format!("/api/categories/{category_id}"),
            Some(&token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn task_crud_and_validation() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let (token, _) = server.signup_and_login("erin@example.com", "erin").await;

    let invalid_tasks = [
        json!({"task_name": "  ", "target_count": 3, "days_of_week": ["mon"]}),
        json!({"task_name": "Run", "target_count": 0, "days_of_week": ["mon"]}),
        json!({"task_name": "Run", "target_count": -2, "days_of_week": ["mon"]}),
        json!({"task_name": "Run", "target_count": 3, "days_of_week": []}),
        json!({"task_name": "Run", "target_count": 3, "days_of_week": ["mon", "funday"]}),
        json!({"task_name": "Run", "target_count": 3, "days_of_week": ["mon"], "category_id": "nope"}),
    ];
    for body in invalid_tasks {
        server
            .request_expect(
                "POST",
                "/api/tasks",
                Some(&token),
                Some(body),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }

    // Unknown category is rejected
    server
        .request_expect(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({
                "task_name": "Run",
                "target_count": 3,
                "days_of_week": ["mon"],
                "category_id": "22222222-2222-4222-8222-222222222222",
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;

    let category = server
        .request_expect(
            "POST",
            "/api/categories",
            Some(&token),
            Some(json!({"category_name": "Sport"})),
            StatusCode::CREATED,
        )
        .await;
    let category_id = category
        .pointer("/category/category_id")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    let created = server
        .request_expect(
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({
                "task_name": "Run",
                "target_count": 3,
                "days_of_week": ["Mon", "Weds", "FRI"],
                "category_id": category_id,
            })),
            StatusCode::CREATED,
        )
        .await;
    let task_id = created
        .pointer("/task/task_id")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    // Day strings are stored as supplied
    assert_eq!(
        created.pointer("/task/days_of_week").unwrap(),
        &json!(["Mon", "Weds", "FRI"])
    );

    // Listing joins category info
    let listed = server
        .request_expect("GET", "/api/tasks", Some(&token), None, StatusCode::OK)
        .await;
    let tasks = listed.get("tasks").unwrap().as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0].get("category_name").and_then(|v| v.as_str()).unwrap(),
        "Sport"
    );

    // Partial update: bump the target, detach the category
    let patched = server
        .request_expect(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&token),
            Some(json!({"target_count": 5, "category_id": null})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        patched.pointer("/task/target_count").and_then(|v| v.as_i64()).unwrap(),
        5
    );
    assert!(patched.pointer("/task/category_id").unwrap().is_null());

    server
        .request_expect(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&token),
            Some(json!({})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    let deleted = server
        .request_expect(
            "DELETE",
            &format!("/api/tasks/{task_id}"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        deleted.pointer("/deleted/task_id").and_then(|v| v.as_str()).unwrap(),
        task_id
    );
    server
        .request_expect(
            "DELETE",
            &format!("/api/tasks/{task_id}"),
            Some(&token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

// 2024-01-01 is a Monday, 2024-01-02 a Tuesday, 2024-01-03 a Wednesday.

#[tokio::test]
async fn progress_reconciliation() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let (token, _) = server.signup_and_login("fay@example.com", "fay").await;
    let (other_token, _) = server.signup_and_login("gus@example.com", "gus").await;

    let task_id = server.create_task(&token, "Stretch", 5, &["Mon", "Wed"]).await;

    // First submission creates
    let first = server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 3, "date": "2024-01-01"})),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(first.get("status").and_then(|v| v.as_str()).unwrap(), "created");
    assert_eq!(
        first.pointer("/progress/completed_count").and_then(|v| v.as_i64()).unwrap(),
        3
    );
    let first_id = first.pointer("/progress/progress_id").and_then(|v| v.as_i64()).unwrap();

    // Identical resubmission updates the same record
    let second = server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 3, "date": "2024-01-01"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(second.get("status").and_then(|v| v.as_str()).unwrap(), "updated");
    assert_eq!(
        second.pointer("/progress/progress_id").and_then(|v| v.as_i64()).unwrap(),
        first_id
    );
    assert_eq!(
        second.pointer("/progress/completed_count").and_then(|v| v.as_i64()).unwrap(),
        3
    );

    // Boundary: count == target succeeds, target + 1 fails
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 5, "date": "2024-01-01"})),
            StatusCode::OK,
        )
        .await;
    let over = server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 6, "date": "2024-01-01"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(
        over.get("message")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("target_count")
    );

    // Weekday not in the allowed set, message lists the allowed days
    let tuesday = server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 1, "date": "2024-01-02"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    let message = tuesday.get("message").and_then(|v| v.as_str()).unwrap();
    assert!(message.contains("Mon, Wed"), "{message}");
    assert!(message.contains("Tue"), "{message}");

    // Malformed and impossible dates
    for date in ["2024-02-30", "2024-1-1", "01-01-2024", "yesterday"] {
        server
            .request_expect(
                "POST",
                "/api/tasks/progress",
                Some(&token),
                Some(json!({"task_id": task_id, "completed_count": 1, "date": date})),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }

    // Negative count and malformed task id
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": -1, "date": "2024-01-01"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": "not-a-uuid", "completed_count": 1, "date": "2024-01-01"})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    // Unknown task vs someone else's task: 404 vs 403
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({
                "task_id": "33333333-3333-4333-8333-333333333333",
                "completed_count": 1,
                "date": "2024-01-01",
            })),
            StatusCode::NOT_FOUND,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&other_token),
            Some(json!({"task_id": task_id, "completed_count": 1, "date": "2024-01-01"})),
            StatusCode::FORBIDDEN,
        )
        .await;
}

#[tokio::test]
async fn tasks_by_date() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let (token, _) = server.signup_and_login("hana@example.com", "hana").await;
    let (other_token, _) = server.signup_and_login("ivan@example.com", "ivan").await;

    let stretch = server.create_task(&token, "Stretch", 5, &["Mon", "Weds"]).await;
    let journal = server.create_task(&token, "Journal", 1, &["Tuesday"]).await;
    // Another user's Monday task must never show up
    server.create_task(&other_token, "Swim", 2, &["Mon"]).await;

    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": stretch, "completed_count": 3, "date": "2024-01-01"})),
            StatusCode::CREATED,
        )
        .await;

    // Monday: only the stretch task, with its logged count
    let monday = server
        .request_expect(
            "GET",
            "/api/tasks/by-date?date=2024-01-01",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let tasks = monday.get("tasks").unwrap().as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].get("task_id").and_then(|v| v.as_str()).unwrap(), stretch);
    assert_eq!(tasks[0].get("completed_count").and_then(|v| v.as_i64()).unwrap(), 3);

    // Tuesday: only the journal task, count defaults to zero
    let tuesday = server
        .request_expect(
            "GET",
            "/api/tasks/by-date?date=2024-01-02",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let tasks = tuesday.get("tasks").unwrap().as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].get("task_id").and_then(|v| v.as_str()).unwrap(), journal);
    assert_eq!(tasks[0].get("completed_count").and_then(|v| v.as_i64()).unwrap(), 0);

    // Wednesday: "Weds" normalizes like any other alias, and the Monday
    // count does not leak onto other dates
    let wednesday = server
        .request_expect(
            "GET",
            "/api/tasks/by-date?date=2024-01-03",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let tasks = wednesday.get("tasks").unwrap().as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].get("task_id").and_then(|v| v.as_str()).unwrap(), stretch);
    assert_eq!(tasks[0].get("completed_count").and_then(|v| v.as_i64()).unwrap(), 0);

    // Date is required and strict
    server
        .request_expect(
            "GET",
            "/api/tasks/by-date",
            Some(&token),
            None,
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "GET",
            "/api/tasks/by-date?date=2024-02-30",
            Some(&token),
            None,
            StatusCode::BAD_REQUEST,
        )
        .await;
}

#[tokio::test]
async fn task_delete_cascades_progress() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let (token, _) = server.signup_and_login("july@example.com", "july").await;

    let task_id = server.create_task(&token, "Read", 2, &["mon"]).await;
    server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": task_id, "completed_count": 2, "date": "2024-01-01"})),
            StatusCode::CREATED,
        )
        .await;
    server
        .request_expect(
            "DELETE",
            &format!("/api/tasks/{task_id}"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;

    // Recreate a Monday task; the old record must be gone, so a fresh
    // submission reports "created" again
    let new_task = server.create_task(&token, "Read", 2, &["mon"]).await;
    let resubmitted = server
        .request_expect(
            "POST",
            "/api/tasks/progress",
            Some(&token),
            Some(json!({"task_id": new_task, "completed_count": 1, "date": "2024-01-01"})),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(
        resubmitted.get("status").and_then(|v| v.as_str()).unwrap(),
        "created"
    );
}
