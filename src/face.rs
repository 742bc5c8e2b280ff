use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::brain::{ANSWER_FALLBACK, QuestionAnswerer};
use crate::cache::ElementCache;
use crate::intent::IntentExtractor;
use crate::session::{SessionContext, SessionController};
use crate::types::{AgentEvent, Intent, SessionOutcome};
use crate::voice::Narrator;

/// How many ports after the configured one to try before giving up.
const PORT_ATTEMPTS: u16 = 10;

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::SessionStarted { .. } => "session_started",
            AgentEvent::Spoke { .. } => "spoke",
            AgentEvent::Heard { .. } => "heard",
            AgentEvent::Action { .. } => "action",
            AgentEvent::Answer { .. } => "answer",
            AgentEvent::SessionEnded { .. } => "session_ended",
        }
    }

    fn to_sse_event(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Event::default().event(self.name()).data(data)
    }
}

/// What the gateway did with one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReply {
    SessionStarted { address: String },
    Answer { response: String },
    NothingHeard,
}

/// Entry point for spoken commands. One worker per request.
pub struct Gateway {
    extractor: IntentExtractor,
    answerer: Arc<dyn QuestionAnswerer>,
    sessions: Arc<SessionContext>,
    cache: ElementCache,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        answerer: Arc<dyn QuestionAnswerer>,
        sessions: Arc<SessionContext>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            extractor: IntentExtractor::new(),
            answerer,
            sessions,
            cache: ElementCache::new(),
            tracker: TaskTracker::new(),
            shutdown,
        }
    }

    pub fn cache(&self) -> &ElementCache {
        &self.cache
    }

    fn narrator(&self) -> &Arc<dyn Narrator> {
        &self.sessions.narrator
    }

    fn events(&self) -> &broadcast::Sender<AgentEvent> {
        &self.sessions.events
    }

    /// Handle one command. An empty command is captured from the microphone.
    pub async fn handle_command(&self, command: &str) -> GatewayReply {
        let mut command = command.trim().to_string();
        if command.is_empty() {
            command = self.narrator().listen().await;
            if command.is_empty() {
                warn!("No command heard");
                return GatewayReply::NothingHeard;
            }
        }
        info!("Received command: '{}'", command);

        match self.extractor.extract(&command) {
            Intent::DestinationPage(address) => {
                info!("Looking up website: {}", address);
                self.start_session(address.clone());
                GatewayReply::SessionStarted { address }
            }
            Intent::GenericQuestion(question) => {
                info!("Processing non-URL task.");
                let response = match self.answerer.answer(&question).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("Question answering failed: {}", e);
                        ANSWER_FALLBACK.to_string()
                    }
                };
                let _ = self.events().send(AgentEvent::Answer {
                    text: response.clone(),
                });
                self.narrator().say(&response).await;
                GatewayReply::Answer { response }
            }
        }
    }

    fn start_session(&self, address: String) {
        let ctx = self.sessions.clone();
        let cancel = self.shutdown.child_token();
        let events = self.events().clone();
        self.tracker.spawn(async move {
            let _ = events.send(AgentEvent::SessionStarted {
                address: address.clone(),
            });
            let (session, outcome) = SessionController::new(ctx, address, cancel).run().await;
            let outcome = match outcome {
                SessionOutcome::Completed => "completed".to_string(),
                SessionOutcome::Cancelled => "cancelled".to_string(),
                SessionOutcome::Failed(reason) => format!("failed: {}", reason),
            };
            info!("Session for {} {}", session.current_address, outcome);
            let _ = events.send(AgentEvent::SessionEnded { outcome });
        });
    }

    /// Stop accepting sessions and wait for running ones to finish.
    pub async fn drain(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/start", get(start_handler))
        .route("/start/", get(start_handler))
        .route("/start/{*command}", get(start_with_command_handler))
        .route("/command", post(command_handler))
        .route("/scan-elements", post(ingest_handler).get(elements_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(gateway)
}

/// Bind on `host:port`, falling back to the next few ports if it is taken,
/// and serve until `shutdown` fires.
pub async fn serve(
    gateway: Arc<Gateway>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut bound = None;
    for p in port..port.saturating_add(PORT_ATTEMPTS) {
        match tokio::net::TcpListener::bind((host, p)).await {
            Ok(listener) => {
                bound = Some((listener, p));
                break;
            }
            Err(e) => warn!("Port {} unavailable: {}", p, e),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow::anyhow!(
            "Could not bind to any port {}-{}. Stop the old agent first.",
            port,
            port.saturating_add(PORT_ATTEMPTS - 1)
        )
    })?;

    info!("Serving on http://{}:{}", host, port);
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

fn reply_response(reply: GatewayReply) -> Response {
    match reply {
        GatewayReply::SessionStarted { address } => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "session_started", "address": address})),
        )
            .into_response(),
        GatewayReply::Answer { response } => Json(json!({"response": response})).into_response(),
        GatewayReply::NothingHeard => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "No command heard"})),
        )
            .into_response(),
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn start_handler(State(gateway): State<Arc<Gateway>>) -> Response {
    info!("GET /start");
    reply_response(gateway.handle_command("").await)
}

async fn start_with_command_handler(
    State(gateway): State<Arc<Gateway>>,
    Path(command): Path<String>,
) -> Response {
    info!("GET /start/{}", command);
    reply_response(gateway.handle_command(&command).await)
}

async fn command_handler(
    State(gateway): State<Arc<Gateway>>,
    Json(payload): Json<CommandPayload>,
) -> Response {
    info!("POST /command: {}", payload.command);
    reply_response(gateway.handle_command(&payload.command).await)
}

async fn ingest_handler(State(gateway): State<Arc<Gateway>>, body: Bytes) -> StatusCode {
    info!("Received POST data: {}", String::from_utf8_lossy(&body));
    // Malformed scans are logged and clear the cache; the caller always gets 200.
    let _ = gateway.cache().ingest(&body);
    StatusCode::OK
}

async fn elements_handler(State(gateway): State<Arc<Gateway>>) -> Json<Option<Value>> {
    Json(gateway.cache().snapshot())
}

/// Streams agent events until the client leaves or the process shuts down.
async fn sse_handler(
    State(gateway): State<Arc<Gateway>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    let mut events = gateway.events().subscribe();
    let shutdown = gateway.shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        if tx.send(Ok(event.to_sse_event())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Event stream lagged by {}", skipped),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
    Sse::new(ReceiverStream::new(rx))
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Voice Browser Agent</title>
<style>
  body { background: #0a0a0f; color: #e0e0e0; font-family: system-ui, sans-serif; margin: 0; }
  main { max-width: 760px; margin: 0 auto; padding: 24px; display: flex; flex-direction: column; gap: 12px; }
  #log { display: flex; flex-direction: column; gap: 6px; }
  .entry { padding: 8px 12px; border-radius: 6px; background: #111118; border-left: 3px solid #3b82f6; }
  .entry.heard { border-left-color: #6366f1; }
  .entry.ended { border-left-color: #22c55e; }
  button { background: #6366f1; color: #fff; border: none; border-radius: 8px; padding: 12px 24px; font-size: 15px; cursor: pointer; }
</style>
</head>
<body>
<main>
  <h1>Voice Browser Agent</h1>
  <button id="start">Start listening</button>
  <div id="log"></div>
</main>
<script>
  const log = document.getElementById('log');
  function add(cls, text) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.textContent = text;
    log.appendChild(div);
  }
  document.getElementById('start').addEventListener('click', () => {
    fetch('/start').then(r => r.text()).then(t => add('reply', t)).catch(e => add('ended', 'Error: ' + e));
  });
  const es = new EventSource('/events');
  es.addEventListener('spoke', e => add('spoke', 'Agent: ' + JSON.parse(e.data).text));
  es.addEventListener('heard', e => add('heard', 'You: ' + JSON.parse(e.data).text));
  es.addEventListener('action', e => add('action', JSON.parse(e.data).description));
  es.addEventListener('answer', e => add('spoke', JSON.parse(e.data).text));
  es.addEventListener('session_started', e => add('action', 'Session started: ' + JSON.parse(e.data).address));
  es.addEventListener('session_ended', e => add('ended', 'Session ' + JSON.parse(e.data).outcome));
</script>
</body>
</html>
"##;
