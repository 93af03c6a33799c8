//! Wire-level tests for the vision endpoint client against a local mock server.

use ganesha_pilot::{
    ActionKind, DecisionError, HardBounds, HttpVisionModel, VisionDecisionClient, VisionSettings,
};
use mockito::Matcher;
use serde_json::json;

const PATH: &str = "/v1/chat/completions";

fn settings(server: &mockito::ServerGuard) -> VisionSettings {
    VisionSettings {
        endpoint: format!("{}{}", server.url(), PATH),
        api_key_env: "GANESHA_PILOT_TEST_KEY_UNSET".to_string(),
        timeout_secs: 5,
        ..VisionSettings::default()
    }
}

fn client(settings: VisionSettings) -> VisionDecisionClient {
    let model = HttpVisionModel::new(&settings).unwrap();
    VisionDecisionClient::new(Box::new(model), settings, HardBounds::default())
}

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_decide_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "response_format": { "type": "json_object" },
                "max_tokens": 300
            })),
            Matcher::Regex("data:image/png;base64,".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(
            r#"{"reasoning":"play the cheapest card","action":"drag_start","x":420,"y":540}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let proposal = client(settings(&server)).decide(b"\x89PNG").await.unwrap();
    assert_eq!(proposal.action, ActionKind::DragStart);
    assert_eq!((proposal.x, proposal.y), (420, 540));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_bearer_key_is_sent() {
    std::env::set_var("GANESHA_PILOT_TEST_KEY_SET", "sk-test");
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body(completion(
            r#"{"reasoning":"hover","action":"move","x":1,"y":1}"#,
        ))
        .create_async()
        .await;

    let settings = VisionSettings {
        api_key_env: "GANESHA_PILOT_TEST_KEY_SET".to_string(),
        ..settings(&server)
    };
    assert!(client(settings).decide(b"png").await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_error_fails_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(500)
        .with_body("model crashed")
        .expect(1)
        .create_async()
        .await;

    let err = client(settings(&server)).decide(b"png").await.unwrap_err();
    match err {
        DecisionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("unexpected error: {}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_prose_content_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(completion("I think you should click the end turn button."))
        .expect(1)
        .create_async()
        .await;

    let err = client(settings(&server)).decide(b"png").await.unwrap_err();
    assert!(matches!(err, DecisionError::MalformedResponse(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fenced_content_is_recovered() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(completion(
            "```json\n{\"reasoning\":\"end turn\",\"action\":\"click\",\"x\":850,\"y\":280}\n```",
        ))
        .create_async()
        .await;

    let proposal = client(settings(&server)).decide(b"png").await.unwrap();
    assert_eq!(proposal.action, ActionKind::Click);
}

#[tokio::test]
async fn test_missing_choices_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(r#"{"error": "no choices"}"#)
        .create_async()
        .await;

    let err = client(settings(&server)).decide(b"png").await.unwrap_err();
    assert!(matches!(err, DecisionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let settings = VisionSettings {
        endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
        api_key_env: "GANESHA_PILOT_TEST_KEY_UNSET".to_string(),
        timeout_secs: 5,
        ..VisionSettings::default()
    };
    let err = client(settings).decide(b"png").await.unwrap_err();
    assert!(matches!(err, DecisionError::Transport(_)));
}
