use mailcast::ai::{AIError, DraftBranding, DraftComposer, DraftLanguage, DraftRequest, GoogleProvider};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn composer(server: &MockServer) -> DraftComposer {
    let provider = GoogleProvider::new(
        "gemini-key".to_string(),
        "gemini-2.5-flash".to_string(),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_api_base(server.uri());
    DraftComposer::new(Arc::new(provider), DraftBranding::default())
}

fn gemini_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

#[tokio::test]
async fn test_fenced_reply_becomes_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(body_string_contains("こんにちは、XROMEDAです。"))
        .respond_with(gemini_reply(
            "```json\n{\"subject\": \"新機能のお知らせ\", \"body\": \"<p>こんにちは、XROMEDAです。</p>\"}\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let draft = composer(&server)
        .compose(&DraftRequest::new("announce the new feature", DraftLanguage::Japanese))
        .await
        .unwrap();

    assert_eq!(draft.subject, "新機能のお知らせ");
    assert!(draft.body.starts_with("<p>こんにちは"));
}

#[tokio::test]
async fn test_reply_without_object_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(gemini_reply("Sorry, I can only help with emails."))
        .mount(&server)
        .await;

    let err = composer(&server)
        .compose(&DraftRequest::new("anything", DraftLanguage::English))
        .await
        .unwrap_err();

    assert!(matches!(err, AIError::DraftParseFailed { .. }));
}

#[tokio::test]
async fn test_provider_outage_is_not_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = composer(&server)
        .compose(&DraftRequest::new("anything", DraftLanguage::Korean))
        .await
        .unwrap_err();

    assert!(matches!(err, AIError::ProviderUnavailable { .. }));
}
