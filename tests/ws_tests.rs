// tests/ws_tests.rs

mod common;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use common::{
    SlowLookups, connect, correct_answer, eventually, expect_closed, next_event, send_event,
    serve, spawn_app, test_config, test_state, test_state_with,
};
use futures::SinkExt;
use prawojazdy::{
    config::ReaperConfig, reaper::ReaperService, state::AppState, store::ClientStore,
};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

async fn new_client_id(ws: &mut common::WsClient) -> Uuid {
    let event = next_event(ws).await;
    assert_eq!(event["event"], "SET_CLIENT_ID");
    event["content"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn practice_session_end_to_end() {
    let (address, _, store) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;

    let client_id = new_client_id(&mut ws).await;

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "QUESTION_DATA");
    assert_eq!(event["content"]["index"], 357);
    assert_eq!(event["content"]["answers"], "TN");
    assert_eq!(event["content"]["is_hard"], false);
    assert!(event["content"].get("correct_answer").is_none());

    send_event(&mut ws, "CHECK_ANSWER", json!("N")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "ANSWER_VALIDATION");
    assert_eq!(event["content"]["is_correct"], true);
    assert_eq!(event["content"]["correct_answer"], "N");
    assert_eq!(event["content"]["given_answer"], "N");

    let profile = store.get_client(client_id).await.unwrap().unwrap();
    assert_eq!(profile.practice_index, 1);
    assert!(profile.practice_hard_questions.is_empty());
}

#[tokio::test]
async fn wrong_answer_joins_hard_list() {
    let (address, _, store) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut ws).await;

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let index = next_event(&mut ws).await["content"]["index"].as_i64().unwrap();

    send_event(&mut ws, "CHECK_ANSWER", json!("T")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["content"]["is_correct"], false);

    let profile = store.get_client(client_id).await.unwrap().unwrap();
    assert_eq!(profile.practice_hard_questions, vec![index as i32]);
    assert_eq!(profile.practice_index, 1);
}

#[tokio::test]
async fn known_client_resumes_without_new_identity() {
    let (address, _, store) = spawn_app().await;

    let mut first = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut first).await;
    send_event(&mut first, "GET_QUESTION", Value::Null).await;
    next_event(&mut first).await;
    send_event(&mut first, "CHECK_ANSWER", json!("N")).await;
    next_event(&mut first).await;
    first.close(None).await.unwrap();

    let mut ws = connect(&address, &format!("/ws/practice/{client_id}")).await;
    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "QUESTION_DATA");
    assert_eq!(event["content"]["index"], 239);
    assert_eq!(event["content"]["number"], 1);

    assert_eq!(store.client_count().await, 1);
}

#[tokio::test]
async fn unknown_client_id_gets_new_identity() {
    let (address, _, store) = spawn_app().await;
    let unknown = Uuid::new_v4();

    let mut ws = connect(&address, &format!("/ws/practice/{unknown}")).await;
    let client_id = new_client_id(&mut ws).await;

    assert_ne!(client_id, unknown);
    assert!(store.get_client(client_id).await.unwrap().is_some());

    let mut ws = connect(&address, "/ws/practice/not-a-uuid").await;
    let other = new_client_id(&mut ws).await;
    assert_ne!(other, client_id);
}

#[tokio::test]
async fn answer_without_question_is_rejected() {
    let (address, _, _) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;
    new_client_id(&mut ws).await;

    send_event(&mut ws, "CHECK_ANSWER", json!("T")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "ERROR");
    assert_eq!(event["content"]["code"], "INVALID_STATE");

    // The connection stays usable.
    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    assert_eq!(next_event(&mut ws).await["event"], "QUESTION_DATA");
}

#[tokio::test]
async fn invalid_answer_and_unknown_event_keep_connection() {
    let (address, _, _) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;
    new_client_id(&mut ws).await;

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    next_event(&mut ws).await;

    send_event(&mut ws, "CHECK_ANSWER", json!("D")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["content"]["code"], "INVALID_ANSWER");

    send_event(&mut ws, "START_OVER", Value::Null).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["content"]["code"], "UNKNOWN_EVENT");

    send_event(&mut ws, "CHECK_ANSWER", json!("N")).await;
    assert_eq!(next_event(&mut ws).await["event"], "ANSWER_VALIDATION");
}

#[tokio::test]
async fn malformed_frame_closes_connection() {
    let (address, state, _) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;
    new_client_id(&mut ws).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "ERROR");
    assert_eq!(event["content"]["code"], "MALFORMED_FRAME");

    expect_closed(&mut ws).await;
    assert!(eventually(|| state.registry.is_empty()).await);
}

#[tokio::test]
async fn store_failure_keeps_question_pending() {
    let (address, _, store) = spawn_app().await;
    let mut ws = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut ws).await;

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    next_event(&mut ws).await;

    store.fail_writes(true);
    send_event(&mut ws, "CHECK_ANSWER", json!("N")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["content"]["code"], "STORE_ERROR");

    store.fail_writes(false);
    send_event(&mut ws, "CHECK_ANSWER", json!("N")).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["content"]["is_correct"], true);

    let profile = store.get_client(client_id).await.unwrap().unwrap();
    assert_eq!(profile.practice_index, 1);
}

#[tokio::test]
async fn second_connection_supersedes_first() {
    let (address, state, _) = spawn_app().await;

    let mut first = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut first).await;
    assert!(eventually(|| state.registry.contains(client_id)).await);
    let first_connection = state.registry.get(client_id).unwrap().connection_id;

    let mut second = connect(&address, &format!("/ws/exam/{client_id}")).await;
    expect_closed(&mut first).await;

    assert!(
        eventually(|| {
            state
                .registry
                .get(client_id)
                .is_some_and(|h| h.connection_id != first_connection)
        })
        .await
    );
    assert_eq!(state.registry.len(), 1);

    send_event(&mut second, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut second).await;
    assert_eq!(event["event"], "QUESTION_DATA");
    assert_eq!(event["content"]["number"], 1);
}

#[tokio::test]
async fn full_exam_reports_result() {
    let (address, _, _) = spawn_app().await;
    let mut ws = connect(&address, "/ws/exam/anon").await;
    new_client_id(&mut ws).await;

    for number in 1..=32 {
        send_event(&mut ws, "GET_QUESTION", Value::Null).await;
        let event = next_event(&mut ws).await;
        assert_eq!(event["event"], "QUESTION_DATA");
        assert_eq!(event["content"]["number"], number);
        let index = event["content"]["index"].as_i64().unwrap();

        send_event(&mut ws, "CHECK_ANSWER", json!(correct_answer(index))).await;
        let event = next_event(&mut ws).await;
        assert_eq!(event["event"], "ANSWER_RECEIVED");
        assert_eq!(event["content"]["number"], number);
    }

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "EXAM_FINISH");
    assert_eq!(event["content"]["result"], true);
    assert_eq!(event["content"]["points"], 74);
    assert_eq!(event["content"]["max_points"], 74);
    assert_eq!(event["content"]["incorrect"], json!([]));

    // Asking again repeats the verdict.
    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let again = next_event(&mut ws).await;
    assert_eq!(again["event"], "EXAM_FINISH");
    assert_eq!(again["content"]["points"], 74);
}

#[tokio::test]
async fn failed_exam_lists_incorrect_answers() {
    let (address, _, _) = spawn_app().await;
    let mut ws = connect(&address, "/ws/exam/anon").await;
    new_client_id(&mut ws).await;

    // The first tier is worth 3 points per question; missing three of them
    // drops the score to 65.
    let mut missed = Vec::new();
    for number in 1..=32 {
        send_event(&mut ws, "GET_QUESTION", Value::Null).await;
        let index = next_event(&mut ws).await["content"]["index"].as_i64().unwrap();
        let answer = if number <= 3 {
            missed.push(index);
            if correct_answer(index) == "N" { "T" } else { "B" }
        } else {
            correct_answer(index)
        };
        send_event(&mut ws, "CHECK_ANSWER", json!(answer)).await;
        next_event(&mut ws).await;
    }

    send_event(&mut ws, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "EXAM_FINISH");
    assert_eq!(event["content"]["result"], false);
    assert_eq!(event["content"]["points"], 65);

    let incorrect = event["content"]["incorrect"].as_array().unwrap();
    let indexes: Vec<i64> = incorrect
        .iter()
        .map(|entry| entry["question"]["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, missed);
    assert!(incorrect[0]["question"]["correct_answer"].is_string());
}

#[tokio::test]
async fn invalid_mode_is_refused() {
    let (address, _, _) = spawn_app().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{address}/ws/quiz/anon")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn new_tab_keeps_answers_given_on_the_old_tab() {
    let (base, store) = test_state().await;
    let clients = Arc::new(SlowLookups::new(store.clone(), Duration::from_millis(500)));
    let state = AppState::new(store.clone(), clients.clone(), base.config.clone());
    let address = serve(state).await;

    let mut old_tab = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut old_tab).await;
    send_event(&mut old_tab, "GET_QUESTION", Value::Null).await;
    assert_eq!(next_event(&mut old_tab).await["content"]["index"], 357);

    clients.enable(true);
    let mut new_tab = connect(&address, &format!("/ws/practice/{client_id}")).await;

    // The new tab is still loading the client while the old one answers.
    send_event(&mut old_tab, "CHECK_ANSWER", json!("N")).await;
    let event = next_event(&mut old_tab).await;
    assert_eq!(event["event"], "ANSWER_VALIDATION");
    assert_eq!(event["content"]["is_correct"], true);
    expect_closed(&mut old_tab).await;

    send_event(&mut new_tab, "GET_QUESTION", Value::Null).await;
    let event = next_event(&mut new_tab).await;
    assert_eq!(event["content"]["index"], 239);
    assert_eq!(event["content"]["number"], 1);

    send_event(&mut new_tab, "CHECK_ANSWER", json!("N")).await;
    next_event(&mut new_tab).await;
    let profile = store.get_client(client_id).await.unwrap().unwrap();
    assert_eq!(profile.practice_index, 2);
}

#[tokio::test]
async fn silent_peer_is_dropped_and_its_account_reaped() {
    let mut config = test_config();
    config.heartbeat_interval = Duration::from_millis(50);
    config.heartbeat_timeout = Duration::from_millis(300);
    let (state, store) = test_state_with(config).await;
    let address = serve(state.clone()).await;

    let mut ws = connect(&address, "/ws/practice/anon").await;
    let client_id = new_client_id(&mut ws).await;
    assert!(eventually(|| state.registry.contains(client_id)).await);
    let handle = state.registry.get(client_id).unwrap();

    // The socket stays open but is never read again, so no pong comes back.
    assert!(eventually(|| !state.registry.contains(client_id)).await);
    assert!(!handle.is_connected());

    let reaper = ReaperService::new(state.registry.clone(), store.clone(), ReaperConfig::default());
    let later = Utc::now() + chrono::Duration::hours(1);
    assert_eq!(reaper.sweep_forgotten(later).await, 1);
    assert!(store.get_client(client_id).await.unwrap().is_none());

    drop(ws);
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let (address, state, _) = spawn_app().await;

    let mut practice = connect(&address, "/ws/practice/anon").await;
    let practice_id = new_client_id(&mut practice).await;
    let mut exam = connect(&address, "/ws/exam/anon").await;
    let exam_id = new_client_id(&mut exam).await;
    assert!(
        eventually(|| state.registry.contains(practice_id) && state.registry.contains(exam_id))
            .await
    );

    assert_eq!(state.registry.shutdown(Duration::from_secs(2)).await, 0);

    expect_closed(&mut practice).await;
    expect_closed(&mut exam).await;
    assert!(eventually(|| state.registry.is_empty()).await);
}
