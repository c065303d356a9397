use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config. Providers are disabled so nothing
/// reaches the network.
fn minimal_config(port: u16, storage_dir: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[storage]
dir = "{}"

[providers.plex]
enabled = false

[providers.animethemes]
enabled = false
"#,
        port,
        storage_dir.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_showtunes"))
        .env("SHOWTUNES_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let storage = TempDir::new().unwrap();
    let temp_file = write_config(&minimal_config(port, storage.path()));

    let mut server = spawn_server(temp_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_hides_api_key() {
    let port = get_available_port();
    let storage = TempDir::new().unwrap();
    let config = format!(
        "{}\n[sonarr]\nurl = \"http://127.0.0.1:1\"\napi_key = \"super-secret\"\n",
        minimal_config(port, storage.path())
    );
    let temp_file = write_config(&config);

    let mut server = spawn_server(temp_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let text = response.text().await.expect("Failed to read body");
    assert!(!text.contains("super-secret"));

    let json: serde_json::Value = serde_json::from_str(&text).expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["sonarr"]["api_key_configured"], true);

    server.kill().await.ok();
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_flushes_store() {
    let port = get_available_port();
    let storage = TempDir::new().unwrap();
    let temp_file = write_config(&minimal_config(port, storage.path()));

    let mut server = spawn_server(temp_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    // A show with a folder but no enabled providers loads the store and
    // resolves to nothing.
    let show_dir = storage.path().join("Nowhere");
    std::fs::create_dir(&show_dir).unwrap();
    let client = Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/webhook/sonarr", port))
        .json(&serde_json::json!({
            "eventType": "Download",
            "series": {"id": 1, "title": "Nowhere", "path": show_dir}
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 202);
    sleep(Duration::from_millis(200)).await;

    let pid = server.id().expect("Server has no pid");
    let killed = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(killed.success());

    let status = timeout(Duration::from_secs(5), server.wait())
        .await
        .expect("Server did not stop in time")
        .expect("Failed to wait for server");
    assert!(status.success());

    // Final flush wrote the snapshot even though nothing was marked.
    let snapshot = std::fs::read_to_string(storage.path().join("theme-songs")).unwrap();
    assert_eq!(snapshot.trim(), "{}");
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_showtunes"))
            .env("SHOWTUNES_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_quota_exits_with_error() {
    let config = r#"
[server]
port = 8080

[quotas.plex]
concurrency = 0
"#;
    let temp_file = write_config(config);

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_showtunes"))
            .env("SHOWTUNES_CONFIG", temp_file.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
