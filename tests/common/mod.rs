// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use prawojazdy::{
    config::{Config, ReaperConfig},
    error::StoreError,
    models::{
        client::ClientProfile,
        question::{Answers, Question, QuestionCategory},
    },
    routes,
    state::AppState,
    store::{ClientStore, MemoryStore},
};
use uuid::Uuid;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TOTAL_QUESTIONS: usize = 2016;

/// Seed given to every anonymous account; its practice line starts with 357.
pub const ANON_SEED: i32 = 3;

/// Odd questions are yes/no questions answered "N", even ones are choice
/// questions answered "A". Categories and points rotate so that every exam
/// tier has plenty of candidates.
pub fn question_bank() -> Vec<Question> {
    const TIERS: [(QuestionCategory, i32); 6] = [
        (QuestionCategory::Basic, 3),
        (QuestionCategory::Basic, 2),
        (QuestionCategory::Basic, 1),
        (QuestionCategory::Specialist, 3),
        (QuestionCategory::Specialist, 2),
        (QuestionCategory::Specialist, 1),
    ];

    (1..=TOTAL_QUESTIONS as i32)
        .map(|index| {
            let (category, points) = TIERS[index as usize % TIERS.len()];
            let (answers, correct_answer) = if index % 2 == 1 {
                (Answers::YesNo, "N")
            } else {
                (
                    Answers::Choice {
                        a: "Tak, zawsze".to_string(),
                        b: "Tylko nocą".to_string(),
                        c: "Nigdy".to_string(),
                    },
                    "A",
                )
            };
            Question {
                index,
                question: format!("Pytanie numer {index}?"),
                answers,
                correct_answer: correct_answer.to_string(),
                media: (index % 3 == 0).then(|| format!("{index}.jpg")),
                points,
                category,
            }
        })
        .collect()
}

/// The answer the bank considers correct for `index`.
pub fn correct_answer(index: i64) -> &'static str {
    if index % 2 == 1 { "N" } else { "A" }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        rust_log: "error".to_string(),
        port: 0,
        total_questions: TOTAL_QUESTIONS,
        media_dir: "media".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        supersede_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_secs(1),
        heartbeat_timeout: Duration::from_secs(30),
        reaper: ReaperConfig::default(),
    }
}

pub async fn test_state() -> (AppState, Arc<MemoryStore>) {
    test_state_with(test_config()).await
}

pub async fn test_state_with(config: Config) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_questions(question_bank()));
    store.set_anonymous_seed(Some(ANON_SEED)).await;
    let state = AppState::new(store.clone(), store.clone(), config);
    (state, store)
}

/// Serves `state` on a random port. Returns the `127.0.0.1:port` address.
pub async fn serve(state: AppState) -> String {
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

pub async fn spawn_app() -> (String, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state().await;
    let address = serve(state.clone()).await;
    (address, state, store)
}

/// Client store whose lookups return the row and then stall, so a second
/// connection can hold a stale read while another one keeps writing.
pub struct SlowLookups {
    pub inner: Arc<MemoryStore>,
    delay: Duration,
    enabled: AtomicBool,
}

impl SlowLookups {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientStore for SlowLookups {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientProfile>, StoreError> {
        let profile = self.inner.get_client(client_id).await;
        if self.enabled.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        profile
    }

    async fn create_anonymous_client(&self) -> Result<Uuid, StoreError> {
        self.inner.create_anonymous_client().await
    }

    async fn set_practice_index(&self, client_id: Uuid, index: i32) -> Result<(), StoreError> {
        self.inner.set_practice_index(client_id, index).await
    }

    async fn mark_hard_question(&self, client_id: Uuid, index: i32) -> Result<Vec<i32>, StoreError> {
        self.inner.mark_hard_question(client_id, index).await
    }

    async fn unmark_hard_question(&self, client_id: Uuid, index: i32) -> Result<Vec<i32>, StoreError> {
        self.inner.unmark_hard_question(client_id, index).await
    }

    async fn delete_client(&self, client_id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_client(client_id).await
    }

    async fn list_disposable_clients(&self, test_prefix: &str) -> Result<Vec<ClientProfile>, StoreError> {
        self.inner.list_disposable_clients(test_prefix).await
    }
}

pub async fn connect(address: &str, path: &str) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{address}{path}"))
        .await
        .expect("Failed to connect websocket");
    ws
}

pub async fn send_event(ws: &mut WsClient, event: &str, content: Value) {
    let frame = json!({ "event": event, "content": content });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Next JSON event; panics on close or after five seconds of silence.
pub async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for an event")
            .expect("Stream ended")
            .expect("Websocket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("Connection closed: {frame:?}"),
            _ => continue,
        }
    }
}

/// Waits until the server closes the connection.
pub async fn expect_closed(ws: &mut WsClient) {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for close");
        match message {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("Unexpected event before close: {text}"),
            Some(Ok(_)) => continue,
        }
    }
}

/// Polls `condition` for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
