//! Server-Sent Events sessions for `GET /sse` and `POST /sse`
//!
//! A session announces the server with a `ready` event and then emits a
//! `heartbeat` every interval until the client goes away or the server shuts
//! down. Hyper drops the response stream once the peer closes, which drops the
//! session and its pending timer with it. Server shutdown goes through the
//! session's cancellation token instead.

use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::sse::{Event, Sse},
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::AppState;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadyPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "serverInfo")]
    pub server_info: &'a ServerInfo,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct HeartbeatPayload {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Ready(Arc<ServerInfo>),
    Heartbeat(HeartbeatPayload),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Heartbeat(_) => "heartbeat",
        }
    }

    pub fn into_sse(self) -> Result<Event, axum::Error> {
        let event = Event::default().event(self.name());
        match self {
            Self::Ready(server_info) => event.json_data(ReadyPayload {
                kind: "ready",
                server_info: &server_info,
            }),
            Self::Heartbeat(payload) => event.json_data(payload),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnect,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Opened,
    Streaming,
    Closed(CloseReason),
}

/// Lifecycle state of one event-stream connection.
///
/// Owned by the response stream; dropping the stream closes the session.
#[derive(Debug)]
pub struct StreamSession {
    id: u64,
    created_at: Instant,
    last_heartbeat: Option<Instant>,
    heartbeat_interval: Duration,
    server_info: Arc<ServerInfo>,
    cancel: CancellationToken,
    phase: SessionPhase,
    open_sessions: Arc<AtomicUsize>,
}

impl StreamSession {
    pub fn open(
        server_info: Arc<ServerInfo>,
        heartbeat_interval: Duration,
        cancel: CancellationToken,
        open_sessions: Arc<AtomicUsize>,
    ) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let open = open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        info!(session_id = id, open_sessions = open, "SSE session opened");

        Self {
            id,
            created_at: Instant::now(),
            last_heartbeat: None,
            heartbeat_interval,
            server_info,
            cancel,
            phase: SessionPhase::Opened,
            open_sessions,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.last_heartbeat
    }

    /// Produces the next event, or `None` once the session is closed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.phase {
            SessionPhase::Opened => {
                self.phase = SessionPhase::Streaming;
                Some(SessionEvent::Ready(Arc::clone(&self.server_info)))
            }
            SessionPhase::Streaming => {
                if self.last_heartbeat.is_some() {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.heartbeat_interval) => {}
                    }
                }

                if self.cancel.is_cancelled() {
                    self.phase = SessionPhase::Closed(CloseReason::Cancelled);
                    return None;
                }

                self.last_heartbeat = Some(Instant::now());
                Some(SessionEvent::Heartbeat(HeartbeatPayload {
                    timestamp: chrono::Utc::now().timestamp(),
                }))
            }
            SessionPhase::Closed(_) => None,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let reason = match self.phase {
            SessionPhase::Closed(reason) => reason,
            SessionPhase::Opened | SessionPhase::Streaming => CloseReason::ClientDisconnect,
        };
        let remaining = self.open_sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        let lifetime_secs = self.created_at.elapsed().as_secs();
        let heartbeat_age_secs = self.last_heartbeat.map(|at| at.elapsed().as_secs());

        match reason {
            CloseReason::ClientDisconnect => info!(
                session_id = self.id,
                open_sessions = remaining,
                lifetime_secs,
                heartbeat_age_secs = ?heartbeat_age_secs,
                "SSE client disconnected"
            ),
            CloseReason::Cancelled => info!(
                session_id = self.id,
                open_sessions = remaining,
                lifetime_secs,
                heartbeat_age_secs = ?heartbeat_age_secs,
                "SSE session cancelled"
            ),
        }
    }
}

pub async fn sse_get(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(&state)
}

/// Some clients post an initialization payload before reading the stream.
/// Whatever arrives is never allowed to block stream startup.
pub async fn sse_post(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    match body {
        Ok(bytes) if bytes.is_empty() => debug!("SSE init request without body"),
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(_) => debug!(bytes = bytes.len(), "SSE init payload received"),
            Err(err) => debug!(error = %err, "ignoring malformed SSE init payload"),
        },
        Err(err) => debug!(error = %err, "ignoring unreadable SSE init payload"),
    }

    event_stream(&state)
}

fn event_stream(state: &AppState) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.open_session();
    let session_id = session.id();

    let events = session.into_stream().filter_map(move |event| {
        let name = event.name();
        let sse = match event.into_sse() {
            Ok(sse) => Some(Ok::<_, Infallible>(sse)),
            Err(err) => {
                error!(
                    session_id = session_id,
                    event = name,
                    error = %err,
                    "failed to encode SSE event"
                );
                None
            }
        };
        futures::future::ready(sse)
    });

    Sse::new(events)
}
