use serde_json::json;
use switchboard_channels::{
    Channel, OutboundMessage, TelegramChannel, TelegramConfig, WhatsAppChannel, WhatsAppConfig,
};
use switchboard_core::SwitchboardError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOT_TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw1";

fn telegram(server: &MockServer) -> TelegramChannel {
    TelegramChannel::new(TelegramConfig {
        bot_token: BOT_TOKEN.into(),
        api_base: server.uri(),
        ..TelegramConfig::default()
    })
}

#[tokio::test]
async fn test_telegram_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/sendMessage")))
        .and(body_json(json!({"chat_id": "42", "text": "Hi *there*", "parse_mode": "Markdown"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    telegram(&server)
        .send(OutboundMessage::new("42", "Hi *there*"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_telegram_api_error_is_redacted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": format!("Bad Request: token {BOT_TOKEN} rejected")
        })))
        .mount(&server)
        .await;

    let err = telegram(&server)
        .send(OutboundMessage::new("42", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::Channel(_)));
    assert!(!err.to_string().contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw1"));
}

#[tokio::test]
async fn test_telegram_answer_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/answerCallbackQuery")))
        .and(body_json(json!({"callback_query_id": "cb-9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
        .expect(1)
        .mount(&server)
        .await;

    telegram(&server).answer_callback_query("cb-9").await.unwrap();
}

#[tokio::test]
async fn test_whatsapp_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PN1/messages"))
        .and(header("authorization", "Bearer wa-access-token"))
        .and(body_json(json!({
            "messaging_product": "whatsapp",
            "to": "2348012345678",
            "type": "text",
            "text": {"body": "Hello from the gateway"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": [{"id": "wamid.9"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let channel = WhatsAppChannel::new(WhatsAppConfig {
        phone_number_id: "PN1".into(),
        access_token: "wa-access-token".into(),
        graph_base: server.uri(),
        ..WhatsAppConfig::default()
    });
    channel
        .send(OutboundMessage::new("2348012345678", "Hello from the gateway"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_whatsapp_send_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid OAuth access token.", "code": 190}
        })))
        .mount(&server)
        .await;

    let channel = WhatsAppChannel::new(WhatsAppConfig {
        phone_number_id: "PN1".into(),
        access_token: "expired".into(),
        graph_base: server.uri(),
        ..WhatsAppConfig::default()
    });
    let err = channel
        .send(OutboundMessage::new("2348012345678", "hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}
