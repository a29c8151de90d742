// src/handlers/connection.rs

//! Websocket quiz sessions.
//!
//! ## Protocol
//!
//! Every frame is a JSON object `{"event": ..., "content": ...}`.
//!
//! ```text
//! client                          server
//!   | ---- connect /ws/practice/anon -->|
//!   | <--- SET_CLIENT_ID "uuid" ------- |  only when an identity was created
//!   | ---- GET_QUESTION --------------> |
//!   | <--- QUESTION_DATA {..} --------- |  EXAM_FINISH once an exam is over
//!   | ---- CHECK_ANSWER "N" ----------> |
//!   | <--- ANSWER_VALIDATION {..} ----- |  ANSWER_RECEIVED in exam mode
//! ```
//!
//! Rejected requests are answered with `ERROR {code, message}`. Malformed
//! frames additionally close the connection.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::{
    error::{AppError, SessionError},
    models::event::{ClientEvent, ServerEvent},
    registry::{HandlerHandle, SessionRegistry},
    session::{QuestionSessionManager, SessionMode},
    state::AppState,
};

/// Client id placeholder that requests a fresh anonymous identity.
pub const ANON_CLIENT_ID: &str = "anon";

/// Close code sent to a connection replaced by a newer one.
const SUPERSEDED_CLOSE_CODE: u16 = 4000;

/// Upper bound for handing the final close frame to the transport.
const CLOSE_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Identifying,
    Active,
    Closing,
    Closed,
}

/// `GET /ws/{mode}`: starts a session with a new anonymous identity.
pub async fn ws_anonymous(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> Result<Response, AppError> {
    upgrade(ws, state, &mode, None)
}

/// `GET /ws/{mode}/{client_id}`: resumes the session of a known client.
pub async fn ws_identified(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((mode, client_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    upgrade(ws, state, &mode, Some(client_id))
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    mode: &str,
    requested_id: Option<String>,
) -> Result<Response, AppError> {
    let mode: SessionMode = mode.parse().map_err(AppError::BadRequest)?;

    Ok(ws
        .on_upgrade(move |socket| async move {
            ConnectionHandler::new(socket, state, mode)
                .run(requested_id)
                .await
        })
        .into_response())
}

/// Routes one text frame to the session manager.
pub async fn handle_frame(
    manager: &mut QuestionSessionManager,
    text: &str,
) -> Result<ServerEvent, SessionError> {
    match ClientEvent::parse(text)? {
        ClientEvent::GetQuestion => manager.provide_question().await,
        ClientEvent::CheckAnswer(answer) => manager.handle_answer(answer).await,
    }
}

/// Marks the handler closed and releases its registry entry however the session ends.
struct Registration {
    registry: Arc<SessionRegistry>,
    handle: HandlerHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.handle.mark_closed();
        if self
            .registry
            .unregister(self.handle.client_id, self.handle.connection_id)
        {
            tracing::debug!(
                "Unregistered connection {} of client_id={}",
                self.handle.connection_id,
                self.handle.client_id
            );
        }
    }
}

/// Owns one websocket and the session manager behind it.
pub struct ConnectionHandler {
    socket: WebSocket,
    app: AppState,
    mode: SessionMode,
    state: ConnectionState,
}

/// What woke the message loop.
enum Wakeup {
    Frame(Option<Result<Message, axum::Error>>),
    Heartbeat,
}

impl ConnectionHandler {
    pub fn new(socket: WebSocket, app: AppState, mode: SessionMode) -> Self {
        Self {
            socket,
            app,
            mode,
            state: ConnectionState::Connecting,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!("WS/{} connection {:?} -> {:?}", self.mode, self.state, next);
        self.state = next;
    }

    pub async fn run(mut self, requested_id: Option<String>) {
        self.transition(ConnectionState::Identifying);

        let client_id = match self.identify(requested_id.as_deref()).await {
            Ok(client_id) => client_id,
            Err(e) => {
                tracing::error!("Failed to identify WS/{} client: {}", self.mode, e);
                self.close(Some(&e)).await;
                return;
            }
        };

        // The client is claimed before its progress is read, so a superseded
        // handler can no longer write to it once the profile is loaded.
        let handle = HandlerHandle::new(client_id, self.mode);
        let registration = self.claim(&handle).await;

        let mut manager = match start_session(&self.app, self.mode, client_id).await {
            Ok(manager) => manager,
            Err(e) => {
                tracing::error!(
                    "Failed to start {} session for client_id={}: {}",
                    self.mode,
                    client_id,
                    e
                );
                self.close(Some(&e)).await;
                drop(registration);
                return;
            }
        };

        self.transition(ConnectionState::Active);
        tracing::info!("WS/{} session started for client_id={}", self.mode, client_id);

        let outcome = self.message_loop(&mut manager, &handle).await;

        self.transition(ConnectionState::Closing);
        let close = match &outcome {
            Ok(()) => {
                tracing::info!("WS/{} client_id={} disconnected", self.mode, client_id);
                Message::Close(None)
            }
            Err(SessionError::Superseded) => {
                tracing::info!("WS/{} client_id={} superseded", self.mode, client_id);
                Message::Close(Some(CloseFrame {
                    code: SUPERSEDED_CLOSE_CODE,
                    reason: "session superseded".into(),
                }))
            }
            Err(e) => {
                tracing::warn!(
                    "WS/{} session of client_id={} ended: {}",
                    self.mode,
                    client_id,
                    e
                );
                Message::Close(None)
            }
        };

        // A dead peer may never drain the close frame.
        let _ = tokio::time::timeout(CLOSE_SEND_TIMEOUT, self.socket.send(close)).await;

        drop(registration);
        self.transition(ConnectionState::Closed);
    }

    /// Resolves the requested client, or creates an anonymous one and tells the peer.
    async fn identify(&mut self, requested_id: Option<&str>) -> Result<Uuid, SessionError> {
        if let Some(client_id) = resolve_existing(&self.app, self.mode, requested_id).await {
            return Ok(client_id);
        }

        let client_id = self.app.clients.create_anonymous_client().await?;
        tracing::info!("Created anonymous account client_id={}, informing client", client_id);
        self.send(&ServerEvent::SetClientId(client_id)).await?;

        Ok(client_id)
    }

    /// Registers `handle` and waits for the handler it supersedes, if any, to close.
    async fn claim(&mut self, handle: &HandlerHandle) -> Registration {
        let previous = self.app.registry.register(handle.clone());
        let registration = Registration {
            registry: Arc::clone(&self.app.registry),
            handle: handle.clone(),
        };

        if let Some(previous) = previous {
            tracing::info!(
                "Connection {} supersedes connection {} of client_id={}",
                handle.connection_id,
                previous.connection_id,
                handle.client_id
            );
            if !previous
                .wait_closed(self.app.config.supersede_timeout)
                .await
            {
                tracing::warn!(
                    "Superseded connection {} of client_id={} did not close in time",
                    previous.connection_id,
                    handle.client_id
                );
            }
        }

        registration
    }

    /// Suspends on the socket until the peer leaves, a fatal error occurs, the
    /// peer stops answering pings or the handler is aborted by a newer connection.
    async fn message_loop(
        &mut self,
        manager: &mut QuestionSessionManager,
        handle: &HandlerHandle,
    ) -> Result<(), SessionError> {
        let mut heartbeat = tokio::time::interval(self.app.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await; // consume first immediate tick
        let mut last_seen = Instant::now();

        loop {
            let wakeup = tokio::select! {
                _ = handle.aborted() => return Err(SessionError::Superseded),
                _ = heartbeat.tick() => Wakeup::Heartbeat,
                message = self.socket.recv() => Wakeup::Frame(message),
            };

            let message = match wakeup {
                Wakeup::Heartbeat => {
                    if last_seen.elapsed() > self.app.config.heartbeat_timeout {
                        handle.mark_disconnected();
                        return Err(SessionError::Transport(format!(
                            "no frame from peer for {:?}",
                            last_seen.elapsed()
                        )));
                    }
                    self.socket.send(Message::Ping(Vec::new().into())).await?;
                    tracing::trace!("Sent ping to client_id={}", handle.client_id);
                    continue;
                }
                Wakeup::Frame(message) => message,
            };
            last_seen = Instant::now();

            let text = match message {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(_))) => {
                    let err = SessionError::MalformedFrame("binary frames are not supported".to_string());
                    self.send(&ServerEvent::from(&err)).await?;
                    return Err(err);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                // Pings are answered by the transport; pongs only refresh `last_seen`.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            };

            tracing::debug!("Received WS message from client_id={}: {}", handle.client_id, text.as_str());

            match handle_frame(manager, text.as_str()).await {
                Ok(event) => self.send(&event).await?,
                Err(err) => {
                    match &err {
                        SessionError::Store(e) => tracing::error!(
                            "Store failure for client_id={}: {:?}",
                            handle.client_id,
                            e
                        ),
                        other => tracing::warn!(
                            "Rejected message from client_id={}: {}",
                            handle.client_id,
                            other
                        ),
                    }
                    self.send(&ServerEvent::from(&err)).await?;
                    if err.is_fatal() {
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<(), SessionError> {
        let json = serde_json::to_string(event)
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        self.socket.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Reports `err` (if any) and closes a connection that never became active.
    async fn close(&mut self, err: Option<&SessionError>) {
        self.transition(ConnectionState::Closing);
        if let Some(err) = err {
            let _ = self.send(&ServerEvent::from(err)).await;
        }
        let _ = tokio::time::timeout(CLOSE_SEND_TIMEOUT, self.socket.send(Message::Close(None))).await;
        self.transition(ConnectionState::Closed);
    }
}

/// Id of the requested client if it exists. Any failure means "unknown".
async fn resolve_existing(
    app: &AppState,
    mode: SessionMode,
    requested_id: Option<&str>,
) -> Option<Uuid> {
    let raw = requested_id.filter(|id| *id != ANON_CLIENT_ID)?;

    let Ok(client_id) = Uuid::parse_str(raw) else {
        tracing::warn!("WS/{} connection with malformed client_id={}", mode, raw);
        return None;
    };

    match app.clients.get_client(client_id).await {
        Ok(Some(profile)) => Some(profile.client_id),
        Ok(None) => {
            tracing::warn!(
                "WS/{} connection with client_id={} but no client with this id exists",
                mode,
                client_id
            );
            None
        }
        Err(e) => {
            tracing::error!("Failed to look up client_id={}: {:?}", client_id, e);
            None
        }
    }
}

/// Builds the session manager from a fresh read of the client's progress.
async fn start_session(
    app: &AppState,
    mode: SessionMode,
    client_id: Uuid,
) -> Result<QuestionSessionManager, SessionError> {
    let profile = app
        .clients
        .get_client(client_id)
        .await?
        .ok_or_else(|| SessionError::Identity(client_id.to_string()))?;

    QuestionSessionManager::create(
        mode,
        &profile,
        app.config.total_questions,
        Arc::clone(&app.questions),
        Arc::clone(&app.clients),
    )
    .await
}
