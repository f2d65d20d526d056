//! Executor adapter integration tests against a mock backend.

use std::collections::BTreeMap;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use renderpay_executor::{hmac_sha256_hex, ExecutorClient, ExecutorError, JobEnvelope, StagedInput, SIGNATURE_HEADER};

const SECRET: &str = "test-signing-secret";

fn envelope() -> JobEnvelope {
    JobEnvelope {
        job_id: "01J8ZZZZZZZZZZZZZZZZZZZZZZ".into(),
        telegram_id: "tg:42".into(),
        model: "kling-video".into(),
        prompt: "a storm over the harbor".into(),
        params: BTreeMap::new(),
        inputs: vec![StagedInput {
            kind: "image".into(),
            signed_url: "https://blobs.example/signed/first-frame".into(),
        }],
        style: Some("cinematic".into()),
        counter: 1,
        prompt_ai: false,
    }
}

fn client(server: &MockServer, timeout: Duration) -> ExecutorClient {
    ExecutorClient::new(format!("{}/generate", server.uri()), SECRET, timeout)
}

/// Matches only when the signature header is a valid HMAC of the exact body.
struct ValidSignature;

impl Match for ValidSignature {
    fn matches(&self, request: &Request) -> bool {
        let Some(header) = request.headers.get(SIGNATURE_HEADER) else {
            return false;
        };
        let Ok(received) = header.to_str() else {
            return false;
        };
        received == hmac_sha256_hex(SECRET, &request.body)
    }
}

#[tokio::test]
async fn success_response_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(ValidSignature)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "output_url": "https://cdn.example/out.mp4",
            "meta": {"render_ms": 54000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5))
        .invoke(&envelope())
        .await
        .unwrap();

    assert_eq!(result.output_url, "https://cdn.example/out.mp4");
    assert_eq!(
        result.meta,
        Some(serde_json::json!({"render_ms": 54000}))
    );
}

#[tokio::test]
async fn unsigned_requests_never_leave_the_adapter_unsigned() {
    // The mock only matches requests whose signature verifies; if the
    // adapter signed anything other than the exact body bytes, this mock
    // would not match and invoke() would see a 404.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(ValidSignature)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "output_url": "https://cdn.example/out.png"
        })))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5)).invoke(&envelope()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn remote_failure_passes_code_and_message_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false,
            "error": {"code": "nsfw_content", "message": "prompt rejected by safety filter"}
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .invoke(&envelope())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExecutorError::Remote {
            code: "nsfw_content".into(),
            message: "prompt rejected by safety filter".into(),
        }
    );
    assert_eq!(err.code(), "nsfw_content");
}

#[tokio::test]
async fn non_success_status_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .invoke(&envelope())
        .await
        .unwrap_err();

    assert_eq!(err, ExecutorError::Http { status: 502 });
    assert_eq!(err.code(), "http_error");
}

#[tokio::test]
async fn missing_discriminator_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output_url": "https://cdn.example/out.png"
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .invoke(&envelope())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid_response");
}

#[tokio::test]
async fn ok_true_without_output_url_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .invoke(&envelope())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid_response");
}

#[tokio::test]
async fn slow_executor_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(serde_json::json!({"ok": true, "output_url": "late"})),
        )
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_millis(200))
        .invoke(&envelope())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "timeout");
}

#[tokio::test]
async fn unreachable_executor_is_transport_error() {
    // Nothing is listening on this port.
    let client = ExecutorClient::new(
        "http://127.0.0.1:1/generate",
        SECRET,
        Duration::from_secs(2),
    );

    let err = client.invoke(&envelope()).await.unwrap_err();
    assert_eq!(err.code(), "transport_error");
}
