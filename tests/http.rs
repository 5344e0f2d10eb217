use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct DayView {
    day: u16,
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    completed: usize,
    remaining: i64,
    streak: u32,
    completion_percent: u8,
}

#[derive(Debug, Deserialize)]
struct SessionView {
    status: String,
    email: Option<String>,
    day: Option<DayView>,
    stats: Option<StatsResponse>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static ACCOUNT_SEQ: AtomicUsize = AtomicUsize::new(0);

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

fn unique_path(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("daily_reader_http_{name}_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

fn unique_email() -> String {
    let seq = ACCOUNT_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("reader{seq}-{}@example.com", std::process::id())
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
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
    // Today is plan day 10.
    let start = chrono::Local::now().date_naive() - chrono::Duration::days(9);
    let child = Command::new(env!("CARGO_BIN_EXE_daily_reader"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_path("records"))
        .env("APP_ACCOUNTS_PATH", unique_path("accounts"))
        .env("APP_READINGS_PATH", unique_path("readings"))
        .env("PLAN_START_DATE", start.to_string())
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

async fn session(client: &Client, base_url: &str) -> SessionView {
    client
        .get(format!("{base_url}/api/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn wait_for_status(client: &Client, base_url: &str, status: &str) -> SessionView {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let view = session(client, base_url).await;
        if view.status == status {
            return view;
        }
        if Instant::now() > deadline {
            panic!("session never reached {status}, last seen {}", view.status);
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn sign_up(client: &Client, base_url: &str) -> (String, SessionView) {
    let email = unique_email();
    let response = client
        .post(format!("{base_url}/api/auth/signup"))
        .json(&serde_json::json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let view = wait_for_status(client, base_url, "active").await;
    (email, view)
}

async fn sign_out(client: &Client, base_url: &str) {
    let response = client
        .post(format!("{base_url}/api/auth/signout"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    wait_for_status(client, base_url, "signed_out").await;
}

#[tokio::test]
async fn http_toggle_updates_progress_and_persists() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (email, view) = sign_up(&client, &server.base_url).await;
    assert_eq!(view.email.as_deref(), Some(email.as_str()));
    let day = view.day.expect("active session shows a day");
    assert_eq!(day.day, 10);
    assert!(!day.completed);

    let toggled: SessionView = client
        .post(format!("{}/api/day/toggle", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(toggled.day.unwrap().completed);
    let stats = toggled.stats.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.remaining, 357);
    assert_eq!(stats.streak, 1);
    assert_eq!(stats.completion_percent, 0);

    sign_out(&client, &server.base_url).await;
    let response = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&serde_json::json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let view = wait_for_status(&client, &server.base_url, "active").await;
    assert_eq!(view.stats.unwrap().completed, 1);
    assert!(view.day.unwrap().completed);

    sign_out(&client, &server.base_url).await;
}

#[tokio::test]
async fn http_rejects_bad_input_without_side_effects() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/day/toggle", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&serde_json::json!({ "email": "ghost@example.com", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await.unwrap(), "Invalid email or password");

    sign_up(&client, &server.base_url).await;

    let response = client
        .post(format!("{}/api/settings/start-date", server.base_url))
        .json(&serde_json::json!({ "start_date": "not a date" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/settings/mark-past", server.base_url))
        .json(&serde_json::json!({ "confirm": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(
        response.text().await.unwrap(),
        "This will mark days 1-10 as complete. Are you sure?"
    );

    let view = session(&client, &server.base_url).await;
    assert_eq!(view.stats.unwrap().completed, 0);

    sign_out(&client, &server.base_url).await;
}

#[tokio::test]
async fn http_mark_past_and_sign_out_clears_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    sign_up(&client, &server.base_url).await;

    let view: SessionView = client
        .post(format!("{}/api/settings/mark-past", server.base_url))
        .json(&serde_json::json!({ "confirm": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let stats = view.stats.unwrap();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.streak, 10);
    assert_eq!(stats.completion_percent, 3);

    let view: SessionView = client
        .post(format!("{}/api/day/navigate", server.base_url))
        .json(&serde_json::json!({ "delta": -20 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view.day.unwrap().day, 10);

    sign_out(&client, &server.base_url).await;
    let view = session(&client, &server.base_url).await;
    assert!(view.day.is_none());
    assert!(view.stats.is_none());
    assert!(view.email.is_none());
}
