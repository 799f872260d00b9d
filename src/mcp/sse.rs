//! HTTP/SSE transport runner.
//!
//! Each `GET {base}/sse` opens an MCP session. The first event on the
//! stream is `endpoint`, telling the client where to POST its messages;
//! responses follow as `message` events. The request context is derived
//! from the GET request's headers, so every connection may point at a
//! different OAP via the `SW-URL` header. A POST that carries its own
//! `SW-URL` header runs against that backend instead.
//!
//! Shutdown is driven by one [`CancellationToken`]: once cancelled, new
//! messages are refused, open streams end, and the listener drains for at
//! most the configured timeout.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ServerConfig, SseConfig};
use crate::error::ServerError;
use crate::mcp::context::{http_context_fn, HttpContextFn, RequestContext, SW_URL_HEADER};
use crate::mcp::lifecycle::{RunnerHandle, RunnerState};
use crate::mcp::protocol::OutgoingMessage;
use crate::mcp::server::{McpServer, Session};
use crate::tools;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

struct SessionEntry {
    session: Arc<Session>,
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

/// Open SSE sessions keyed by session ID.
#[derive(Clone, Default)]
struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionManager {
    fn insert(&self, session: Arc<Session>, tx: mpsc::UnboundedSender<OutgoingMessage>) {
        let id = session.id().to_string();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, SessionEntry { session, tx });
    }

    fn get(&self, id: &str) -> Option<(Arc<Session>, mpsc::UnboundedSender<OutgoingMessage>)> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|entry| (Arc::clone(&entry.session), entry.tx.clone()))
    }

    fn remove(&self, id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Removes a session when its event stream is dropped.
struct SessionGuard {
    sessions: SessionManager,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        tracing::debug!(session = %self.id, "SSE session closed");
    }
}

#[derive(Clone)]
struct AppState {
    server: McpServer,
    enrich: HttpContextFn,
    sessions: SessionManager,
    message_path: Arc<str>,
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Runs the MCP server over HTTP with server-sent events.
pub struct SseServer {
    server: McpServer,
    enrich: HttpContextFn,
    config: SseConfig,
    sessions: SessionManager,
    handle: RunnerHandle,
}

impl SseServer {
    /// Validates the configuration and registers the tools.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for an invalid URL, address or base
    /// path, and [`ServerError::Registration`] if a tool cannot be
    /// registered.
    pub fn new(config: &ServerConfig, sse: SseConfig) -> Result<Self, ServerError> {
        config.validate()?;
        sse.validate()?;
        let registry = tools::build_registry(config.read_only)?;
        Ok(Self::from_parts(
            McpServer::new(registry),
            http_context_fn(config),
            sse,
        ))
    }

    /// Assembles a runner from an existing server and enrichment chain.
    #[must_use]
    pub fn from_parts(server: McpServer, enrich: HttpContextFn, config: SseConfig) -> Self {
        Self {
            server,
            enrich,
            config,
            sessions: SessionManager::default(),
            handle: RunnerHandle::new("sse"),
        }
    }

    /// Handle for observing the runner's state.
    #[must_use]
    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }

    /// Number of open SSE sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Builds the HTTP routes. Cancelling `shutdown` ends every open stream
    /// and makes the message endpoint answer `503`.
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = AppState {
            server: self.server.clone(),
            enrich: Arc::clone(&self.enrich),
            sessions: self.sessions.clone(),
            message_path: self.config.message_path().into(),
            shutdown,
        };

        Router::new()
            .route(&self.config.sse_path(), get(open_stream))
            .route(&self.config.message_path(), post(post_message))
            .with_state(state)
    }

    /// Serves until `shutdown` is cancelled, then drains.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the listener cannot be bound
    /// or the server fails, and [`ServerError::ShutdownTimeout`] if open
    /// connections do not finish within the drain window.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let app = self.router(shutdown.clone());
        let address = self.config.address.clone();
        let handle = self.handle.clone();

        tracing::info!(
            "Starting SkyWalking MCP server using SSE transport listening on http://{}{}",
            address,
            self.config.sse_path()
        );

        let (err_tx, mut err_rx) = mpsc::channel::<ServerError>(1);
        let serve_token = shutdown.clone();
        let serve_handle = handle.clone();
        let mut serve_task = tokio::spawn(async move {
            let listener = match TcpListener::bind(&address).await {
                Ok(listener) => listener,
                Err(e) => {
                    let _ = err_tx
                        .send(ServerError::transport("failed to bind SSE listener", e))
                        .await;
                    return;
                }
            };
            serve_handle.set_state(RunnerState::Listening);

            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(serve_token.cancelled_owned())
                .await
            {
                let _ = err_tx
                    .send(ServerError::transport("SSE server error", e))
                    .await;
            }
        });

        tokio::time::sleep(self.config.startup_delay).await;

        tokio::select! {
            () = shutdown.cancelled() => {}
            Some(e) = err_rx.recv() => {
                tracing::error!(error = %e, "SSE server failed");
                serve_task.abort();
                handle.set_state(RunnerState::Stopped);
                return Err(e);
            }
        }

        eprintln!("Received shutdown signal, stopping server...");
        handle.set_state(RunnerState::Draining);

        let timeout = self.config.shutdown_timeout;
        if tokio::time::timeout(timeout, &mut serve_task).await.is_err() {
            tracing::error!(?timeout, "SSE server shutdown timed out");
            serve_task.abort();
            handle.set_state(RunnerState::Stopped);
            return Err(ServerError::ShutdownTimeout { timeout });
        }

        if let Ok(e) = err_rx.try_recv() {
            tracing::error!(error = %e, "SSE server failed while draining");
            handle.set_state(RunnerState::Stopped);
            return Err(e);
        }

        tokio::time::sleep(self.config.shutdown_grace).await;
        handle.set_state(RunnerState::Stopped);
        eprintln!("SSE server stopped gracefully");
        Ok(())
    }
}

impl std::fmt::Debug for SseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseServer")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

async fn open_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let context = (state.enrich)(RequestContext::default(), &headers);
    let id = Uuid::new_v4().to_string();
    tracing::debug!(
        session = %id,
        backend = context.backend_url().unwrap_or_default(),
        "SSE session opened"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    state
        .sessions
        .insert(Arc::new(Session::new(id.clone(), context)), tx);

    let endpoint = format!("{}?sessionId={id}", state.message_path);
    let guard = SessionGuard {
        sessions: state.sessions.clone(),
        id,
    };

    Sse::new(session_stream(endpoint, rx, guard, state.shutdown))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response()
}

fn session_stream(
    endpoint: String,
    rx: mpsc::UnboundedReceiver<OutgoingMessage>,
    guard: SessionGuard,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let endpoint =
        stream::once(async move { Ok(Event::default().event("endpoint").data(endpoint)) });

    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await;
        message.map(|message| (message, (rx, guard)))
    })
    .filter_map(|message: OutgoingMessage| {
        let event = match message.to_json() {
            Ok(json) => Some(Ok(Event::default().event("message").data(json))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialise SSE message");
                None
            }
        };
        futures_util::future::ready(event)
    });

    endpoint
        .chain(messages)
        .take_until(shutdown.cancelled_owned())
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if state.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let Some(id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "missing sessionId").into_response();
    };

    let Some((session, tx)) = state.sessions.get(&id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    // A message carrying its own SW-URL overrides the connection's backend.
    let context = if has_sw_url(&headers) {
        (state.enrich)(session.context().clone(), &headers)
    } else {
        session.context().clone()
    };

    if let Some(response) = state
        .server
        .handle_line_with(&session, &context, &body)
        .await
    {
        if tx.send(response).is_err() {
            tracing::debug!(session = %id, "SSE stream closed before response was sent");
        }
    }

    StatusCode::ACCEPTED.into_response()
}

fn has_sw_url(headers: &HeaderMap) -> bool {
    headers
        .get(SW_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty())
}
