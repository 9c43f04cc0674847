use serde_json::json;
use std::time::Duration;
use switchboard_core::{ChannelKind, MessageEnvelope, SwitchboardError, FALLBACK_REPLY_TEXT};
use switchboard_dialogue::{DialogueConfig, DialogueEngine, RestDialogueClient};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RestDialogueClient {
    RestDialogueClient::new(DialogueConfig::with_base_url(server.uri()))
}

#[tokio::test]
async fn test_send_forwards_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/rest/webhook"))
        .and(body_partial_json(json!({
            "sender": "telegram_42",
            "message": "hello",
            "metadata": {"channel": "telegram", "language": "en", "is_voice": false, "username": "ada"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"recipient_id": "telegram_42", "text": "Hi Ada!", "intent": "greet", "confidence": 0.98}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = MessageEnvelope::new("telegram_42", "hello", ChannelKind::Telegram, "en")
        .with_identifier("username", "ada");
    let reply = client_for(&server).send(&envelope).await.unwrap();
    assert_eq!(reply.text, "Hi Ada!");
    assert_eq!(reply.intent.as_deref(), Some("greet"));
}

#[tokio::test]
async fn test_empty_reply_list_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/rest/webhook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let envelope = MessageEnvelope::new("web_1", "asdf", ChannelKind::Web, "en");
    let reply = client_for(&server).send(&envelope).await.unwrap();
    assert_eq!(reply.text, FALLBACK_REPLY_TEXT);
}

#[tokio::test]
async fn test_non_success_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let envelope = MessageEnvelope::new("web_1", "hi", ChannelKind::Web, "en");
    let err = client_for(&server).send(&envelope).await.unwrap_err();
    assert!(matches!(err, SwitchboardError::Upstream { status: Some(500), .. }));
}

#[tokio::test]
async fn test_voice_bound_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"text": "late"}]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = DialogueConfig {
        base_url: server.uri(),
        chat_timeout_ms: 5_000,
        voice_timeout_ms: 100,
    };
    let client = RestDialogueClient::new(config);
    let envelope = MessageEnvelope::new("twilio_CA1", "hi", ChannelKind::Twilio, "en").voice();
    let err = client.send(&envelope).await.unwrap_err();
    assert!(matches!(err, SwitchboardError::UpstreamTimeout(_)), "{err}");

    // The chat bound is wider, so the same delay succeeds.
    let envelope = MessageEnvelope::new("web_1", "hi", ChannelKind::Web, "en");
    assert_eq!(client.send(&envelope).await.unwrap().text, "late");
}

#[tokio::test]
async fn test_unreachable_engine_is_unavailable() {
    // Nothing listens on port 9 on the loopback interface.
    let client = RestDialogueClient::new(DialogueConfig::with_base_url("http://127.0.0.1:9"));
    let envelope = MessageEnvelope::new("web_1", "hi", ChannelKind::Web, "en");
    let err = client.send(&envelope).await.unwrap_err();
    assert!(matches!(err, SwitchboardError::UpstreamUnavailable(_)), "{err}");
}

#[tokio::test]
async fn test_status_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_file": "20240101-model.tar.gz",
            "num_active_training_jobs": 0
        })))
        .mount(&server)
        .await;

    let status = client_for(&server).status().await.unwrap();
    assert_eq!(status.version, "unknown");
    assert_eq!(status.model_file.as_deref(), Some("20240101-model.tar.gz"));
}
