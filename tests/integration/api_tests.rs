//! API integration tests against a running server

use reqwest::Client;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8080/api/v1";

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_list_bestsellers() {
    let client = Client::new();

    let response = client
        .get(format!("{}/bestsellers", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let genres = body.as_array().expect("Expected an array");
    assert!(genres.iter().all(|g| g["genre"] != "UNKNOWN"));
}

#[tokio::test]
#[ignore]
async fn test_refresh_bestsellers() {
    let client = Client::new();

    let response = client
        .post(format!("{}/bestsellers/refresh", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    // 409 when a scheduled run happens to be in progress
    assert!(response.status() == 202 || response.status() == 409);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["started"].is_boolean());
}
