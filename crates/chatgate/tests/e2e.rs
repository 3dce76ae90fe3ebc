//! End-to-end tests for the chat API against a real NATS server.
//!
//! Requires Docker (uses testcontainers to spin up NATS).
//!
//! Run with:
//!   cargo test -p chatgate --test e2e
//!
//! A fake worker consumes tasks from `e2e.work.>` and publishes envelopes on
//! the session's update topic; a fake store answers `e2e.store.session.get`.

use std::time::Duration;

use async_nats::Client;
use bytes::Bytes;
use chatgate::{ApiKeys, Config, NatsConfig, SubjectToken, server};
use chatgate_types::{BusEnvelope, ChatCompletion, ChatCompletionChunk, SessionMode, Task};
use futures_util::StreamExt;
use serde_json::json;
use testcontainers_modules::nats::Nats;
use testcontainers_modules::testcontainers::{ContainerAsync, runners::AsyncRunner};

const PREFIX: &str = "e2e";
const KEY: &str = "sk-e2e-alice";

async fn start_nats() -> (ContainerAsync<Nats>, u16) {
    let container: ContainerAsync<Nats> = Nats::default()
        .start()
        .await
        .expect("Failed to start NATS container, is Docker running?");
    let port = container.get_host_port_ipv4(4222).await.unwrap();
    (container, port)
}

struct Harness {
    _container: ContainerAsync<Nats>,
    nats: Client,
    base_url: String,
}

async fn start() -> Harness {
    let (container, port) = start_nats().await;
    let nats_config = NatsConfig::from_url(format!("localhost:{port}"));
    let nats = chatgate_nats::connect(&nats_config)
        .await
        .expect("Failed to connect to NATS");

    let config = Config::new(PREFIX, nats_config)
        .unwrap()
        .with_response_timeout(Duration::from_secs(10))
        .with_api_keys(ApiKeys::default().with_key(KEY, SubjectToken::new("owner", "alice").unwrap()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server_client = nats.clone();
    tokio::spawn(async move {
        server::serve(listener, server_client, &config, std::future::pending())
            .await
            .expect("Chat API server error");
    });

    Harness {
        _container: container,
        nats,
        base_url,
    }
}

/// Answers every task with the payloads `script` builds for it.
async fn spawn_worker<F>(nats: &Client, script: F)
where
    F: Fn(&Task) -> Vec<Vec<u8>> + Send + 'static,
{
    let mut tasks = nats.subscribe(format!("{PREFIX}.work.>")).await.unwrap();
    nats.flush().await.unwrap();
    let publisher = nats.clone();
    tokio::spawn(async move {
        while let Some(message) = tasks.next().await {
            let task: Task = serde_json::from_slice(&message.payload).unwrap();
            let topic = format!("{PREFIX}.session.{}.{}.updates", task.owner, task.session_id);
            for payload in script(&task) {
                publisher.publish(topic.clone(), Bytes::from(payload)).await.unwrap();
            }
            publisher.flush().await.unwrap();
        }
    });
}

fn worker_says(task: &Task, text: &str, done: bool) -> Vec<u8> {
    serde_json::to_vec(&BusEnvelope::worker_response(&task.owner, &task.session_id, text, done)).unwrap()
}

fn session_finished(task: &Task, reply: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "session_update",
        "session_id": task.session_id,
        "owner": task.owner,
        "session": {
            "id": task.session_id,
            "owner": task.owner,
            "model_name": task.model,
            "interactions": [
                {"id": task.interaction.id, "creator": "user", "message": task.interaction.message, "state": "complete"},
                {"id": "int_reply", "creator": "assistant", "message": reply, "state": "complete",
                 "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}}
            ]
        }
    }))
    .unwrap()
}

fn chat(harness: &Harness, body: serde_json::Value) -> reqwest::RequestBuilder {
    reqwest::Client::new()
        .post(format!("{}/v1/chat/completions", harness.base_url))
        .bearer_auth(KEY)
        .json(&body)
}

#[tokio::test]
async fn e2e_streaming_relays_worker_progress() {
    let harness = start().await;
    spawn_worker(&harness.nats, |task| {
        vec![
            b"not an envelope".to_vec(),
            worker_says(task, "Hello", false),
            worker_says(task, ", world", false),
            worker_says(task, "", true),
        ]
    })
    .await;

    let response = chat(
        &harness,
        json!({
            "model": "Llama-3-8B:Custom",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        }),
    )
    .send()
    .await
    .unwrap();

    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    let chunks: Vec<ChatCompletionChunk> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    let contents: Vec<_> = chunks.iter().map(|c| c.choices[0].delta.content.as_str()).collect();
    assert_eq!(contents, vec!["", "Hello", ", world", ""]);
    assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
    assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
    assert!(chunks.last().unwrap().is_terminal());
    assert!(chunks.iter().all(|c| c.model == "Llama-3-8B:Custom"));
    assert!(chunks[0].id.starts_with("ses_"));
}

#[tokio::test]
async fn e2e_blocking_returns_final_interaction() {
    let harness = start().await;
    spawn_worker(&harness.nats, |task| {
        vec![
            worker_says(task, "Hi", false),
            worker_says(task, "", true),
            session_finished(task, "Hi there"),
        ]
    })
    .await;

    let response = chat(
        &harness,
        json!({"model": "llama3:instruct", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .send()
    .await
    .unwrap();

    assert_eq!(response.status(), 200);
    let completion: ChatCompletion = response.json().await.unwrap();
    assert_eq!(completion.model, "llama3:instruct");
    assert_eq!(completion.object, "chat.completion");
    assert_eq!(completion.choices[0].message.role, "assistant");
    assert_eq!(completion.choices[0].message.content, "Hi there");
    assert_eq!(completion.usage.prompt_tokens, 10);
    assert_eq!(completion.usage.completion_tokens, 5);
    assert_eq!(completion.usage.total_tokens, 15);
}

#[tokio::test]
async fn e2e_continuation_reads_store_and_echoes_stored_model() {
    let harness = start().await;

    let mut store = harness
        .nats
        .subscribe(format!("{PREFIX}.store.session.get"))
        .await
        .unwrap();
    harness.nats.flush().await.unwrap();
    let store_client = harness.nats.clone();
    tokio::spawn(async move {
        while let Some(request) = store.next().await {
            let Some(reply) = request.reply else { continue };
            let body = json!({"session": {"id": "ses_existing", "owner": "alice", "model_name": "stored-model"}});
            store_client
                .publish(reply, Bytes::from(serde_json::to_vec(&body).unwrap()))
                .await
                .unwrap();
        }
    });

    spawn_worker(&harness.nats, |task| {
        assert_eq!(task.mode, SessionMode::Continue);
        vec![session_finished(task, "Continued")]
    })
    .await;

    let response = chat(
        &harness,
        json!({
            "session_id": "ses_existing",
            "model": "something-else",
            "messages": [{"role": "user", "content": "again"}]
        }),
    )
    .send()
    .await
    .unwrap();

    assert_eq!(response.status(), 200);
    let completion: ChatCompletion = response.json().await.unwrap();
    assert_eq!(completion.id, "ses_existing");
    assert_eq!(completion.model, "stored-model");
    assert_eq!(completion.choices[0].message.content, "Continued");
}

#[tokio::test]
async fn e2e_rejects_unknown_bearer() {
    let harness = start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/v1/chat/completions", harness.base_url))
        .bearer_auth("sk-nobody")
        .json(&json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}
