//! Integration tests for the session lifecycle

use scheduler_client::storage::{ACCESS_TOKEN_KEY, REFRESH_COOKIE_KEY};
use scheduler_client::{
    ApiClient, ClientError, FileStorage, History, LogoutOutcome, MemoryStorage, Navigator,
    RefreshOutcome, Route, SessionManager, SessionStore, Storage, TokenRefresher,
};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Log output collected by a thread-local subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a buffer until the guard is dropped
fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

async fn token_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/api/v1/users/token")
        .count()
}

fn session(server: &MockServer, storage: Arc<dyn Storage>) -> (SessionManager, Arc<History>) {
    init_tracing();
    let client = ApiClient::new(server.uri()).unwrap();
    let history = Arc::new(History::new());
    let navigator: Arc<dyn Navigator> = history.clone();
    let manager = SessionManager::new(client, Arc::new(SessionStore::new(storage)), navigator);
    (manager, history)
}

fn memory_session(server: &MockServer) -> (SessionManager, Arc<History>) {
    session(server, Arc::new(MemoryStorage::new()))
}

async fn mount_token(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users/token"))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "A1"}))
                .insert_header("set-cookie", "refresh-token=R1; Path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_stores_new_token() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "T1"})),
    )
    .await;

    let (manager, _) = memory_session(&mock_server);
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Refreshed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_refresh_accepts_legacy_token_field() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "legacy"})),
    )
    .await;

    let (manager, _) = memory_session(&mock_server);
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Refreshed);
    assert_eq!(manager.store().access_token().as_deref(), Some("legacy"));
}

#[tokio::test]
async fn test_refresh_failure_keeps_previous_token() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, ResponseTemplate::new(500)).await;

    let (manager, _) = memory_session(&mock_server);
    manager.store().begin("T0").unwrap();

    assert_eq!(manager.refresh_token().await, RefreshOutcome::Failed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T0"));
}

#[tokio::test]
async fn test_refresh_with_garbage_body_keeps_previous_token() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
    )
    .await;

    let (manager, _) = memory_session(&mock_server);
    manager.store().begin("T0").unwrap();

    assert_eq!(manager.refresh_token().await, RefreshOutcome::Failed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T0"));
}

#[tokio::test]
async fn test_refresh_network_error_keeps_previous_token() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    drop(mock_server);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let client = ApiClient::builder()
        .base_url(uri)
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let store = Arc::new(SessionStore::new(storage));
    store.begin("T0").unwrap();
    let manager = SessionManager::new(client, store, Arc::new(History::new()));

    assert_eq!(manager.refresh_token().await, RefreshOutcome::Failed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T0"));
}

#[tokio::test]
async fn test_logout_without_token_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (manager, history) = memory_session(&mock_server);
    assert_eq!(manager.logout().await, LogoutOutcome::NotLoggedIn);
    assert_eq!(history.visits(), vec![Route::Login]);
}

#[tokio::test]
async fn test_logout_clears_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (manager, history) = memory_session(&mock_server);
    manager.store().begin("A1").unwrap();
    history.navigate(Route::Settings);

    assert_eq!(manager.logout().await, LogoutOutcome::LoggedOut);
    assert_eq!(manager.store().access_token(), None);
    assert!(!manager.is_authenticated());
    assert_eq!(history.current(), Route::Login);
}

#[tokio::test]
async fn test_logout_failure_leaves_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (manager, history) = memory_session(&mock_server);
    manager.store().begin("A1").unwrap();
    history.navigate(Route::Settings);

    assert_eq!(
        manager.logout().await,
        LogoutOutcome::Failed { status: Some(500) }
    );
    assert_eq!(manager.store().access_token().as_deref(), Some("A1"));
    assert_eq!(history.current(), Route::Settings);
}

#[tokio::test]
async fn test_refresh_arriving_after_logout_is_discarded() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "late"}))
            .set_delay(Duration::from_millis(300)),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let (manager, _) = memory_session(&mock_server);
    manager.store().begin("A1").unwrap();

    let refreshing = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.refresh_token().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(manager.logout().await, LogoutOutcome::LoggedOut);
    assert_eq!(refreshing.await.unwrap(), RefreshOutcome::Discarded);
    assert_eq!(manager.store().access_token(), None);
}

#[tokio::test]
async fn test_late_refresh_cookie_does_not_revive_session() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "late"}))
            .insert_header("set-cookie", "refresh-token=R2; Path=/; HttpOnly")
            .set_delay(Duration::from_millis(300)),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let (manager, _) = memory_session(&mock_server);
    manager.store().begin("A1").unwrap();

    let refreshing = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.refresh_token().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(manager.logout().await, LogoutOutcome::LoggedOut);
    assert_eq!(refreshing.await.unwrap(), RefreshOutcome::Discarded);
    assert_eq!(manager.client().refresh_cookie(), None);
    assert_eq!(manager.store().refresh_cookie(), None);

    // The next tick sends nothing and the session stays closed
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Skipped);
    assert_eq!(manager.store().access_token(), None);
    assert!(!manager.is_authenticated());
    assert_eq!(token_requests(&mock_server).await, 1);
}

#[tokio::test]
async fn test_login_after_logout_resumes_refresh() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "T2"})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let (manager, _) = memory_session(&mock_server);
    manager.login("ada@example.com", "hunter22").await.unwrap();
    assert_eq!(manager.logout().await, LogoutOutcome::LoggedOut);
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Skipped);

    manager.login("ada@example.com", "hunter22").await.unwrap();
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Refreshed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_failed_refresh_is_logged() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, ResponseTemplate::new(500)).await;

    let (manager, _) = memory_session(&mock_server);
    let (logs, _guard) = capture_logs();

    assert_eq!(manager.refresh_token().await, RefreshOutcome::Failed);

    let output = logs.contents();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("Failed to refresh token"), "{output}");
}

#[tokio::test]
async fn test_rejected_refresh_cookie_logs_warning() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(401).set_body_string("Refresh token expired"),
    )
    .await;

    let (manager, _) = memory_session(&mock_server);
    manager.store().begin("T0").unwrap();
    let (logs, _guard) = capture_logs();

    assert_eq!(manager.refresh_token().await, RefreshOutcome::Failed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T0"));

    let output = logs.contents();
    assert!(output.contains("WARN"), "{output}");
    assert!(!output.contains("ERROR"), "{output}");
    assert!(output.contains("Failed to refresh token"), "{output}");
}

#[tokio::test]
async fn test_logout_without_token_is_logged() {
    let mock_server = MockServer::start().await;

    let (manager, _) = memory_session(&mock_server);
    let (logs, _guard) = capture_logs();

    assert_eq!(manager.logout().await, LogoutOutcome::NotLoggedIn);

    let output = logs.contents();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("Cannot log out"), "{output}");
}

#[tokio::test]
async fn test_login_starts_session() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;

    let (manager, history) = memory_session(&mock_server);
    manager.login("ada@example.com", "hunter22").await.unwrap();

    assert!(manager.is_authenticated());
    assert_eq!(manager.store().access_token().as_deref(), Some("A1"));
    assert_eq!(history.current(), Route::Settings);

    let mirrored = manager.store().refresh_cookie().unwrap();
    assert!(mirrored.starts_with("refresh-token=R1;expires="));
}

#[tokio::test]
async fn test_failed_login_stores_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/login"))
        .respond_with(ResponseTemplate::new(404).set_body_string("User with email not found"))
        .mount(&mock_server)
        .await;

    let (manager, history) = memory_session(&mock_server);
    let result = manager.login("nobody@example.com", "whatever1").await;

    assert!(matches!(result, Err(ClientError::NotFound(_))));
    assert!(!manager.is_authenticated());
    assert_eq!(history.current(), Route::Login);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/token"))
        .and(header("cookie", "refresh-token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T2"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let storage_path = temp_dir.path().join("session.json");

    {
        let storage = Arc::new(FileStorage::open(&storage_path).unwrap());
        let (manager, _) = session(&mock_server, storage);
        manager.login("ada@example.com", "hunter22").await.unwrap();
    }

    let storage = Arc::new(FileStorage::open(&storage_path).unwrap());
    assert_eq!(
        storage.get_item(ACCESS_TOKEN_KEY).unwrap().as_deref(),
        Some("A1")
    );
    assert!(storage.get_item(REFRESH_COOKIE_KEY).unwrap().is_some());

    let (manager, _) = session(&mock_server, storage);
    assert_eq!(manager.client().refresh_cookie().as_deref(), Some("R1"));
    assert_eq!(manager.refresh_token().await, RefreshOutcome::Refreshed);
    assert_eq!(manager.store().access_token().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_change_password_requires_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/users/password"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (manager, _) = memory_session(&mock_server);
    let result = manager.change_password("new-password").await;
    assert!(matches!(result, Err(ClientError::NotLoggedIn)));

    manager.store().begin("A1").unwrap();
    manager.change_password("new-password").await.unwrap();
}

#[tokio::test]
async fn test_refresh_loop_runs_immediately_and_periodically() {
    let mock_server = MockServer::start().await;
    mount_token(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "T1"})),
    )
    .await;

    let (manager, _) = memory_session(&mock_server);
    let handle = TokenRefresher::spawn(manager.clone(), Duration::from_millis(100));
    assert!(handle.is_running());

    tokio::time::sleep(Duration::from_millis(350)).await;
    handle.shutdown().await;

    let requests = mock_server.received_requests().await.unwrap().len();
    assert!(requests >= 2, "expected at least 2 refreshes, got {requests}");
    assert_eq!(manager.store().access_token().as_deref(), Some("T1"));

    tokio::time::sleep(Duration::from_millis(250)).await;
    let after_shutdown = mock_server.received_requests().await.unwrap().len();
    assert_eq!(requests, after_shutdown);
}

#[tokio::test]
async fn test_dropping_handle_stops_loop() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, ResponseTemplate::new(500)).await;

    let (manager, _) = memory_session(&mock_server);
    let handle = TokenRefresher::spawn(manager, Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(75)).await;
    drop(handle);

    // Let any in-flight tick finish before counting
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = mock_server.received_requests().await.unwrap().len();
    assert!(before >= 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = mock_server.received_requests().await.unwrap().len();
    assert_eq!(before, after);
}
