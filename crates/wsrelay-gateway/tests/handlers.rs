#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;

use serde_json::json;

use wsrelay_core::error::{ErrorClass, RelayError};
use wsrelay_core::protocol::{decode, Envelope};
use wsrelay_gateway::backend::ModelBackend;
use wsrelay_gateway::dispatch::HandlerRegistry;

use support::CountingBackend;

fn registry(backend: CountingBackend) -> (HandlerRegistry, Arc<CountingBackend>) {
    let backend = Arc::new(backend);
    let reg = HandlerRegistry::with_backend(Arc::clone(&backend) as Arc<dyn ModelBackend>);
    (reg, backend)
}

fn req(frame: &str) -> Envelope {
    decode(frame.as_bytes()).unwrap()
}

#[test]
fn builtin_actions_registered() {
    let (reg, _) = registry(CountingBackend::new());
    let mut actions = reg.registered_actions();
    actions.sort();
    assert_eq!(actions, ["chat", "list_model", "ping"]);
}

#[tokio::test]
async fn unknown_and_empty_actions_fail() {
    let (reg, _) = registry(CountingBackend::new());

    for frame in [r#"{"action":"transcode"}"#, r#"{"action":""}"#, r#"{"request_id":"x"}"#] {
        let env = req(frame);
        let err = reg.resolve(&env.action).handle(&env).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownAction(_)));
        assert_eq!(err.class(), ErrorClass::Handler);
    }
}

#[tokio::test]
async fn list_model_reports_backend_resources() {
    let (reg, backend) = registry(CountingBackend::new());
    let env = req(r#"{"type":"server_to_client","action":"list_model","request_id":"r9"}"#);

    let resp = reg.resolve("list_model").handle(&env).await.unwrap();
    assert_eq!(resp.request_id, "r9");
    assert_eq!(resp.msg_type, "client_to_server");
    assert_eq!(resp.data.unwrap()[1]["model_name"], "qwen2:7b");
    assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn chat_validates_params_before_backend() {
    let (reg, backend) = registry(CountingBackend::new());
    let chat = reg.resolve("chat");

    for frame in [
        r#"{"action":"chat","request_id":"c"}"#,
        r#"{"action":"chat","request_id":"c","params":{"messages":[]}}"#,
        r#"{"action":"chat","request_id":"c","params":{"model_name":"","messages":[]}}"#,
        r#"{"action":"chat","request_id":"c","params":[1,2]}"#,
    ] {
        let err = chat.handle(&req(frame)).await.unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)), "{frame}: {err}");
    }
    assert_eq!(backend.exec_calls(), 0);

    let env = req(
        r#"{"action":"chat","request_id":"c","params":{"model_name":"llama3:8b","messages":[{"role":"user","content":"yo"}]}}"#,
    );
    let resp = chat.handle(&env).await.unwrap();
    assert_eq!(resp.data.unwrap(), json!({"message": {"role": "assistant", "content": "chat: yo"}}));
}

#[tokio::test]
async fn backend_failure_surfaces_as_handler_error() {
    let (reg, _) = registry(CountingBackend::failing());
    let env = req(r#"{"action":"list_model","request_id":"r"}"#);
    let err = reg.resolve("list_model").handle(&env).await.unwrap_err();
    assert!(matches!(err, RelayError::Backend(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn ping_answers_pong() {
    let (reg, _) = registry(CountingBackend::new());
    let env = req(r#"{"type":"heartbeat","action":"ping","request_id":"hb"}"#);
    let resp = reg.resolve("ping").handle(&env).await.unwrap();
    assert_eq!(resp.request_id, "hb");
    assert_eq!(resp.status, "done");
    assert_eq!(resp.data.unwrap(), json!("pong"));
}
