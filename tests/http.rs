use once_cell::sync::Lazy;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const BOOTSTRAP_ADMIN: &str = "owner@tracker.test";

#[derive(Debug, Deserialize)]
struct Progress {
    total: f64,
    percentage: f64,
    goal_met: bool,
}

#[derive(Debug, Deserialize)]
struct ExpenseSummary {
    total: f64,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
    is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    user: Option<SessionUser>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("daily_tracker_http_{}_{}", std::process::id(), nanos));
    path.push("tracker.json");
    path.to_string_lossy().to_string()
}

fn unique_email(label: &str) -> String {
    format!("{label}-{}@tracker.test", uuid::Uuid::new_v4().simple())
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/session")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_daily_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("APP_BOOTSTRAP_ADMIN", BOOTSTRAP_ADMIN)
        .env("APP_SECURE_COOKIES", "false")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

fn browser() -> Client {
    Client::builder().cookie_store(true).build().unwrap()
}

async fn signed_up(server: &TestServer, email: &str) -> (Client, SessionInfo) {
    let client = browser();
    let response = client
        .post(server.url("/api/auth/sign-up"))
        .json(&json!({ "email": email, "password": "secret123", "full_name": "Test User" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let info: SessionInfo = response.json().await.unwrap();
    (client, info)
}

/// The bootstrap account is shared by every test on the server, so whichever
/// test runs first creates it and the rest sign in.
async fn owner_session(server: &TestServer) -> (Client, SessionInfo) {
    let client = browser();
    let credentials = json!({ "email": BOOTSTRAP_ADMIN, "password": "secret123" });
    let response = client
        .post(server.url("/api/auth/sign-up"))
        .json(&credentials)
        .send()
        .await
        .unwrap();
    let response = if response.status() == StatusCode::CONFLICT {
        client
            .post(server.url("/api/auth/sign-in"))
            .json(&credentials)
            .send()
            .await
            .unwrap()
    } else {
        response
    };
    assert!(response.status().is_success());
    let info: SessionInfo = response.json().await.unwrap();
    (client, info)
}

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn http_anonymous_requests_are_gated() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    let client = Client::builder().redirect(Policy::none()).build().unwrap();
    let response = client.get(server.url("/api/expenses")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(response).await, "Sign in required");

    let response = client.get(server.url("/water")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/auth");

    let session: SessionInfo = client
        .get(server.url("/api/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(session.user.is_none());
}

#[tokio::test]
async fn http_sign_in_rejects_wrong_password_and_duplicate_email() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let email = unique_email("dup");
    let (_client, info) = signed_up(&server, &email).await;
    assert!(!info.user.unwrap().is_admin);

    let client = browser();
    let response = client
        .post(server.url("/api/auth/sign-up"))
        .json(&json!({ "email": email.to_uppercase(), "password": "another1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(server.url("/api/auth/sign-in"))
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(server.url("/api/auth/sign-in"))
        .json(&json!({ "email": email, "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(server.url("/api/auth/sign-out"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = client.get(server.url("/api/dashboard")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_expense_add_and_delete_round_trip() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("expense")).await;

    let response = client
        .post(server.url("/api/expenses"))
        .json(&json!({ "item_name": "Tea", "category": "Tea", "amount": 20, "date": "2024-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 20.0);
    let id = body["expenses"][0]["id"].as_str().unwrap().to_string();

    let summary: ExpenseSummary = client
        .get(server.url("/api/expenses?date=2024-01-01"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.total, 20.0);
    assert_eq!(summary.count, 1);

    let response = client
        .post(server.url("/api/expenses"))
        .json(&json!({ "item_name": "Refund", "category": "Tea", "amount": -5, "date": "2024-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let summary: ExpenseSummary = client
        .delete(server.url(&format!("/api/expenses/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.total, 0.0);
    assert_eq!(summary.count, 0);
}

#[tokio::test]
async fn http_records_are_private_to_their_owner() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (alice, _) = signed_up(&server, &unique_email("alice")).await;
    let (bob, _) = signed_up(&server, &unique_email("bob")).await;

    let body: Value = alice
        .post(server.url("/api/notes"))
        .json(&json!({ "content": "secret plan", "date": "2024-03-03" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["tasks"][0]["id"].as_str().unwrap().to_string();

    let seen: Value = bob
        .get(server.url("/api/notes?date=2024-03-03"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["tasks"].as_array().unwrap().len(), 0);

    let response = bob
        .delete(server.url(&format!("/api/notes/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_water_reports_goal_crossing() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("water")).await;

    let body: Value = client
        .post(server.url("/api/water"))
        .json(&json!({ "amount_ml": 3900, "date": "2024-05-05" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["goal_reached"], false);

    let body: Value = client
        .post(server.url("/api/water"))
        .json(&json!({ "amount_ml": 250, "date": "2024-05-05" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["goal_reached"], true);
    let progress: Progress = serde_json::from_value(body["progress"].clone()).unwrap();
    assert_eq!(progress.total, 4150.0);
    assert!(progress.goal_met);
    assert_eq!(body["glasses"], 16);

    let response = client
        .post(server.url("/api/water"))
        .json(&json!({ "amount_ml": 0, "date": "2024-05-05" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_protein_uses_food_factor() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("protein")).await;

    let foods: Vec<Value> = client
        .get(server.url("/api/foods"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let food = &foods[0];
    let per_unit = food["protein_per_unit"].as_f64().unwrap();

    let body: Value = client
        .post(server.url("/api/protein"))
        .json(&json!({ "food_id": food["id"], "quantity": 2, "date": "2024-06-01" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let progress: Progress = serde_json::from_value(body["progress"].clone()).unwrap();
    assert!((progress.total - per_unit * 2.0).abs() < 1e-9);
    assert!((progress.percentage - per_unit * 2.0).abs() < 1e-9);
    assert_eq!(body["by_food"][0]["food_name"], food["name"]);

    let response = client
        .post(server.url("/api/protein"))
        .json(&json!({ "food_id": uuid::Uuid::new_v4(), "date": "2024-06-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Unknown food");
}

#[tokio::test]
async fn http_notes_toggle_and_reset_keeps_notes() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("notes")).await;

    let body: Value = client
        .post(server.url("/api/notes"))
        .json(&json!({ "content": "Stretch", "type": "task" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["tasks"][0]["id"].as_str().unwrap().to_string();

    let body: Value = client
        .post(server.url(&format!("/api/notes/{id}/toggle")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["completed_tasks"], 1);
    assert_eq!(body["completion_ratio"], 1.0);

    client
        .post(server.url("/api/expenses"))
        .json(&json!({ "item_name": "Milk", "category": "Milk", "amount": 30 }))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .post(server.url("/api/reset-today"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["expense_total"], 0.0);
    assert_eq!(body["total_tasks"], 1);
}

#[tokio::test]
async fn http_analysis_marks_active_days() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("analysis")).await;

    client
        .post(server.url("/api/water"))
        .json(&json!({ "amount_ml": 500, "date": "2024-02-10" }))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .get(server.url("/api/analysis?month=2024-02&day=2024-02-10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["days"].as_array().unwrap().len(), 29);
    assert_eq!(body["totals"]["active_days"], 1);
    assert_eq!(body["selected"]["water"], 500);
    assert_eq!(body["selected"]["has_data"], true);

    let response = client
        .get(server.url("/api/analysis?month=2024-13"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_form_errors_become_notices() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = browser();

    let page = client
        .post(server.url("/auth/sign-up"))
        .form(&[("email", unique_email("form").as_str()), ("password", "secret123")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Welcome!"));
    assert!(page.contains("Dashboard"));

    let page = client
        .post(server.url("/expenses"))
        .form(&[("item_name", "Tea"), ("category", "Tea"), ("amount", "")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Amount is required"));

    let page = client
        .post(server.url("/expenses"))
        .form(&[("item_name", "Tea"), ("category", "Tea"), ("amount", "20")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Expense added"));
    assert!(page.contains("₹20 for Tea"));

    let page = client.get(server.url("/admin")).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Access Denied"));
    assert!(page.contains("You do not have admin privileges."));
}

#[tokio::test]
async fn http_admin_manages_roles() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let member_email = unique_email("member");
    let (member, member_info) = signed_up(&server, &member_email).await;
    let member_id = member_info.user.unwrap().id;

    let response = member
        .get(server.url("/api/admin/categories"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (owner, owner_info) = owner_session(&server).await;
    let owner_user = owner_info.user.unwrap();
    assert!(owner_user.is_admin);

    let response = owner
        .post(server.url("/api/admin/admins"))
        .json(&json!({ "email": "nobody@tracker.test" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        error_message(response).await,
        "User not found: they must sign up first"
    );

    let response = owner
        .post(server.url("/api/admin/admins"))
        .json(&json!({ "email": member_email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = owner
        .post(server.url("/api/admin/admins"))
        .json(&json!({ "email": member_email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_message(response).await, "User is already an admin");

    let response = owner
        .delete(server.url(&format!("/api/admin/admins/{}", owner_user.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Cannot remove yourself");

    let admins: Vec<Value> = owner
        .delete(server.url(&format!("/api/admin/admins/{member_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0]["email"], BOOTSTRAP_ADMIN);

    let food: Value = owner
        .post(server.url("/api/admin/foods"))
        .json(&json!({ "name": "Tempeh", "protein_per_unit": 19 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(food["unit"], "100g");
    let foods: Vec<Value> = owner
        .get(server.url("/api/admin/foods"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(food["sort_order"], foods.len());
}

#[tokio::test]
async fn http_admin_edits_reference_data_without_cascading() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (owner, _) = owner_session(&server).await;
    let (member, _) = signed_up(&server, &unique_email("spender")).await;

    let response = owner
        .post(server.url("/api/admin/categories"))
        .json(&json!({ "name": "Climbing", "emoji": "🧗", "group_name": "Health" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: Value = response.json().await.unwrap();
    let id = category["id"].as_str().unwrap().to_string();

    let updated: Value = owner
        .put(server.url(&format!("/api/admin/categories/{id}")))
        .json(&json!({ "name": "Bouldering", "group_name": "Fitness" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Bouldering");
    assert_eq!(updated["emoji"], "📦");
    assert_eq!(updated["group_name"], "Fitness");

    let response = member
        .post(server.url("/api/expenses"))
        .json(&json!({ "item_name": "Day pass", "category": "Bouldering", "amount": 450 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = owner
        .delete(server.url(&format!("/api/admin/categories/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = owner
        .delete(server.url(&format!("/api/admin/categories/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(response).await, "Category not found");

    let response = owner
        .put(server.url(&format!("/api/admin/categories/{id}")))
        .json(&json!({ "name": "Ghost", "group_name": "Nowhere" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let expenses: Value = member
        .get(server.url("/api/expenses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(expenses["expenses"][0]["category"], "Bouldering");
    let page = member
        .get(server.url("/expenses"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Bouldering"));
    assert!(!page.contains("🧗"));

    let food: Value = owner
        .post(server.url("/api/admin/foods"))
        .json(&json!({ "name": "Seitan", "protein_per_unit": 25 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let food_id = food["id"].as_str().unwrap().to_string();
    let updated: Value = owner
        .put(server.url(&format!("/api/admin/foods/{food_id}")))
        .json(&json!({ "name": "Seitan strips", "protein_per_unit": 7.5, "unit": "piece" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["unit"], "piece");
    assert_eq!(updated["protein_per_unit"], 7.5);
    let response = owner
        .delete(server.url(&format!("/api/admin/foods/{food_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn http_malformed_json_gets_an_error_body() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let (client, _) = signed_up(&server, &unique_email("typo")).await;

    let response = client
        .post(server.url("/api/water"))
        .header("content-type", "application/json")
        .body(r#"{"amount_ml": "#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!error_message(response).await.is_empty());

    let response = client
        .post(server.url("/api/expenses"))
        .json(&json!({ "item_name": "Tea", "category": "Tea" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("amount"));
}
