//! Common helpers for the wiremock-backed integration tests

#![allow(dead_code)]

use anaplan_tasks::{AuthMethod, Client, Config};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WORKSPACE: &str = "ws1";
pub const MODEL: &str = "model1";
pub const TOKEN: &str = "tok-abc";

/// Path of the test model under the mock server
pub fn model_path(rest: &str) -> String {
    format!("/2/0/workspaces/{WORKSPACE}/models/{MODEL}/{rest}")
}

/// Config pointing both APIs at the mock server, with fast polling
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{}/2/0", server.uri());
    config.api.auth_url = server.uri();
    config.api.request_timeout = Duration::from_secs(5);
    config.poll.interval = Duration::from_millis(10);
    config.retry.initial_delay = Duration::from_millis(10);
    config
}

pub fn basic_auth() -> AuthMethod {
    AuthMethod::Basic {
        username: "planner@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

/// Mount the authenticate and validate endpoints
pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token/authenticate"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "SUCCESS",
            "statusMessage": "Login successful",
            "tokenInfo": {
                "tokenId": "id-1",
                "tokenValue": TOKEN,
                "expiresAt": 4_102_444_800_000_i64,
                "refreshTokenId": "r-1"
            }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/token/validate"))
        .and(header("Authorization", format!("AnaplanAuthToken {TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"statusMessage": "Token validated"})),
        )
        .mount(server)
        .await;
}

/// Authenticated client against the mock server
pub async fn connect(server: &MockServer) -> Client {
    mount_auth(server).await;
    Client::connect(test_config(server), basic_auth())
        .await
        .expect("client should authenticate against the mock server")
}

/// Mount a files listing with one entry
pub async fn mount_file_listing(server: &MockServer, file_id: &str, chunk_count: i64) {
    Mock::given(method("GET"))
        .and(path(model_path("files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"schema": "file"},
            "status": {"code": 200, "message": "Success"},
            "files": [{"id": file_id, "name": "data.csv", "chunkCount": chunk_count}]
        })))
        .mount(server)
        .await;
}
