mod common;

use clinrefine::domain::models::{EvalError, ServerConfig};
use clinrefine::domain::ports::DiagnosisService;
use clinrefine::infrastructure::diagnosis::DiagnosisClient;
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn server_config(url: String, max_retries: u32) -> ServerConfig {
    ServerConfig {
        url,
        request_timeout_secs: 5,
        control_timeout_secs: 5,
        max_retries,
        initial_backoff_ms: 10,
        max_backoff_ms: 50,
    }
}

#[tokio::test]
async fn test_diagnose_ranks_predictions() {
    let mut server = Server::new_async().await;
    let body = json!({
        "diagnoses": [
            {"rank": 2, "diagnosis": "b", "icd10_code": "J20.9", "explanation": "second"},
            {"rank": 1, "diagnosis": "a", "icd10_code": "J18.9", "explanation": "first"},
            {"rank": 3, "diagnosis": "c", "icd10_code": "", "explanation": "no code"}
        ]
    });
    let mock = server
        .mock("POST", "/diagnose")
        .match_body(Matcher::PartialJson(json!({"symptoms": "кашель, температура 39"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 0)).expect("client");
    let response = client.diagnose("кашель, температура 39").await.expect("diagnose");
    let (codes, explanation) = response.predictions();

    assert_eq!(codes, vec!["J18.9", "J20.9"]);
    assert_eq!(explanation.as_deref(), Some("first"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_diagnose_retries_transient_status() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("POST", "/diagnose")
        .with_status(503)
        .with_body("warming up")
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/diagnose")
        .with_status(200)
        .with_body(common::diagnose_body(&["I10"]))
        .expect(1)
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 1)).expect("client");
    let response = client.diagnose("headache").await.expect("diagnose after retry");

    assert_eq!(response.predictions().0, vec!["I10"]);
    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_attempt_latency_excludes_backoff() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/diagnose")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/diagnose")
        .with_status(200)
        .with_body(common::diagnose_body(&["I10"]))
        .expect(1)
        .create_async()
        .await;

    let config = ServerConfig {
        initial_backoff_ms: 500,
        max_backoff_ms: 500,
        ..server_config(server.url(), 1)
    };
    let client = DiagnosisClient::new(&config).expect("client");
    let started = std::time::Instant::now();
    let response = client.diagnose("headache").await.expect("diagnose after retry");

    assert!(started.elapsed() >= Duration::from_millis(500));
    let attempt = response.attempt_latency.expect("attempt latency recorded");
    assert!(attempt < Duration::from_millis(500));
}

#[tokio::test]
async fn test_diagnose_gives_up_with_status_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/diagnose")
        .with_status(500)
        .with_body("boom")
        .expect(2)
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 1)).expect("client");
    let err = client.diagnose("q").await.unwrap_err();

    assert_eq!(err, EvalError::Status(500, "boom".into()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/diagnose")
        .with_status(422)
        .with_body("symptoms missing")
        .expect(1)
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 3)).expect("client");
    let err = client.diagnose("").await.unwrap_err();

    assert!(matches!(err, EvalError::Status(422, _)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/diagnose")
        .with_status(200)
        .with_body("<html>proxy error</html>")
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 0)).expect("client");
    let err = client.diagnose("q").await.unwrap_err();

    assert!(matches!(err, EvalError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    // port 9 (discard) is closed on test machines
    let client = DiagnosisClient::new(&server_config("http://127.0.0.1:9".into(), 0)).expect("client");
    let err = client.diagnose("q").await.unwrap_err();

    assert!(matches!(err, EvalError::Transport(_) | EvalError::Timeout));
}

#[tokio::test]
async fn test_reload_and_health() {
    let mut server = Server::new_async().await;
    let reload = server
        .mock("POST", "/admin/reload-prompts")
        .with_status(200)
        .with_body(r#"{"status": "reloaded", "version": 7, "keys": ["diagnosis_system", "symptom_extraction_system"]}"#)
        .expect(1)
        .create_async()
        .await;
    let health = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(common::health_body(false))
        .expect(1)
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(format!("{}/", server.url()), 0)).expect("client");

    let ack = client.reload_prompts().await.expect("reload");
    assert_eq!(ack.version, Some(7));
    assert_eq!(ack.keys.len(), 2);

    let report = client.health().await.expect("health");
    assert!(!report.rag.loaded);
    assert_eq!(report.rag.total_vectors, 1200);
    assert_eq!(report.prompts.version, Some(3));

    reload.assert_async().await;
    health.assert_async().await;
}

#[tokio::test]
async fn test_failed_health_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = DiagnosisClient::new(&server_config(server.url(), 0)).expect("client");
    assert!(client.health().await.is_err());
}
