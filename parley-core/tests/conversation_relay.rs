//! A full turn through the Gemini provider against a mock API

use std::sync::{Arc, Mutex};

use mockito::Matcher;
use parley_core::error::UPSTREAM_USER_MESSAGE;
use parley_core::llm::providers::GeminiProvider;
use parley_core::prelude::*;

fn sse_body(fragments: &[&str]) -> String {
    fragments
        .iter()
        .map(|f| {
            format!(
                "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"{f}\"}}],\"role\":\"model\"}}}}]}}\r\n\r\n"
            )
        })
        .collect()
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<String>) -> String {
    let mut body = String::new();
    while let Some(frame) = rx.recv().await {
        body.push_str(&frame);
    }
    body
}

#[tokio::test]
async fn test_streamed_turn_is_committed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex("streamGenerateContent".to_string()))
        .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::Regex("Usuário: Hi\\\\nAssistente:".to_string()))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&["Hel", "lo"]))
        .create_async()
        .await;

    let provider = GeminiProvider::with_base_url("test-key", "gemini-test", server.url());
    let relay = StreamingRelay::new(Arc::new(provider));
    let store = InMemorySessionStore::default();
    let id = SessionId::generate();

    let mut history = store.load(&id).await.unwrap();
    let (message, prompt) = ContextBuilder::new().build(history.turns(), " Hi ").unwrap();
    history.push_user(message);
    store.save(&id, &history).await.unwrap();

    let (mut sink, rx) = ChannelSink::channel(WireFormat::EventStream, 8);
    let reader = tokio::spawn(drain(rx));

    let committed = Arc::new(Mutex::new(history));
    let commit = committed.clone();
    let outcome = relay
        .run(prompt, &mut sink, |reply| async move {
            commit.lock().unwrap().push_assistant(reply);
            Ok(())
        })
        .await;
    drop(sink);

    assert!(matches!(outcome, RelayOutcome::Completed { ref text } if text == "Hello"));
    assert_eq!(
        reader.await.unwrap(),
        "data: Hel\n\ndata: lo\n\nevent: end\ndata: \n\n"
    );

    let history = committed.lock().unwrap().clone();
    assert_eq!(history.len(), 2);
    assert_eq!(history.turns()[0], Turn::user("Hi"));
    assert_eq!(history.turns()[1], Turn::assistant("Hello"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_key_reports_generic_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Regex("streamGenerateContent".to_string()))
        .with_status(400)
        .with_body(
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        )
        .create_async()
        .await;

    let provider = GeminiProvider::with_base_url("bad-key", "gemini-test", server.url());
    let relay = StreamingRelay::new(Arc::new(provider));
    let (mut sink, rx) = ChannelSink::channel(WireFormat::PlainText, 8);
    let reader = tokio::spawn(drain(rx));

    let outcome = relay
        .run(build_prompt(&[], "Oi", 12), &mut sink, |_| async {
            Err(ParleyError::Other("nothing to commit".into()))
        })
        .await;
    drop(sink);

    match outcome {
        RelayOutcome::Failed { error } => {
            assert!(error.is_upstream());
            assert!(error.to_string().contains("API key not valid"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        reader.await.unwrap(),
        format!("\n[erro] {UPSTREAM_USER_MESSAGE}\n")
    );
}
