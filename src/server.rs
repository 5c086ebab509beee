//! HTTP JSON API and WebSocket room feed, using `axum` + `tokio`.
//!
//! Endpoints:
//! - GET  /api/health             - Server status
//! - POST /api/roll               - Roll (and optionally verify) an expression
//! - GET  /api/rolls              - Recorded rolls, filtered by `move_id` and `limit`
//! - GET  /api/rooms/{room}/ws    - WebSocket feed of `move:executed` events for a room
//!
//! Roll rejections (guard or parse failures) are reported as 400 with `{"error": "..."}`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
	extract::{
		rejection::JsonRejection,
		ws::{Message, WebSocket, WebSocketUpgrade},
		DefaultBodyLimit, Path, Query, State,
	},
	http::{Method, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};

use crate::{
	broadcast::{Envelope, Rooms},
	config::RodeoConfig,
	engine::{Engine, RetryPolicy, RollRequest, RollResponse},
	history::{HistoryError, HistoryFilter, HistoryStore, JsonlHistory, MemoryHistory},
};

/// Application state shared across request handlers.
#[derive(Debug)]
struct AppState {
	engine: Engine,
}

/// Errors that stop the server from starting or running
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
	/// The listen address is not a valid socket address.
	#[error("invalid listen address {addr:?}: {source}")]
	Addr {
		/// The address as configured
		addr: String,

		/// Underlying error
		#[source]
		source: std::net::AddrParseError,
	},

	/// The history store could not be opened.
	#[error(transparent)]
	History(#[from] HistoryError),

	/// Binding or serving failed.
	#[error("server i/o error: {0}")]
	Io(#[from] std::io::Error),
}

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> Response {
	(status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Builds the engine described by a configuration, opening its history store.
///
/// # Errors
/// If the history file can't be opened, an error variant is returned.
pub async fn build_engine(cfg: &RodeoConfig) -> Result<Engine, ServerError> {
	let history: Arc<dyn HistoryStore> = match &cfg.history_path {
		Some(path) => Arc::new(JsonlHistory::open(path).await?),
		None => {
			tracing::warn!("no history path configured, rolls are kept in memory only");
			Arc::new(MemoryHistory::new())
		}
	};

	Ok(Engine::new(
		cfg.guard(),
		history,
		Rooms::new(cfg.room_capacity),
		RetryPolicy::new(cfg.history_retries, cfg.retry_backoff()),
	))
}

/// Builds the router for an engine.
pub fn router(engine: Engine, max_body_bytes: usize) -> Router {
	let state = Arc::new(AppState { engine });

	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers(Any);

	Router::new()
		.route("/api/health", get(handle_health))
		.route("/api/roll", post(handle_roll))
		.route("/api/rolls", get(handle_list_rolls))
		.route("/api/rooms/{room}/ws", get(handle_room_ws))
		.fallback(handle_not_found)
		.layer(cors)
		.layer(DefaultBodyLimit::max(max_body_bytes))
		.with_state(state)
}

/// Starts the HTTP server and runs it until Ctrl+C.
///
/// # Errors
/// If the address is invalid, the history store can't be opened, or the listener fails, an error variant is returned.
pub async fn run_server(cfg: RodeoConfig) -> Result<(), ServerError> {
	let addr: SocketAddr = cfg.listen_addr.parse().map_err(|source| ServerError::Addr {
		addr: cfg.listen_addr.clone(),
		source,
	})?;

	let engine = build_engine(&cfg).await?;
	let app = router(engine, cfg.max_body_bytes);

	let listener = tokio::net::TcpListener::bind(addr).await?;
	tracing::info!(%addr, history = ?cfg.history_path, max_dice = cfg.max_dice, "roll server listening");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("roll server shut down");
	Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "failed to listen for Ctrl+C");
		return;
	}
	tracing::info!("received shutdown signal");
}

/// Fallback handler for unmatched routes.
async fn handle_not_found() -> Response {
	json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /api/health
async fn handle_health() -> impl IntoResponse {
	Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/roll
async fn handle_roll(
	State(state): State<Arc<AppState>>,
	payload: Result<Json<RollRequest>, JsonRejection>,
) -> Response {
	let Json(request) = match payload {
		Ok(payload) => payload,
		Err(rejection) => return json_error(StatusCode::BAD_REQUEST, &rejection.body_text()),
	};

	match state.engine.roll(request).await {
		Ok(outcome) => (StatusCode::OK, Json(RollResponse::from(&outcome))).into_response(),
		Err(err) => {
			tracing::debug!(error = %err, "roll rejected");
			json_error(StatusCode::BAD_REQUEST, &err.to_string())
		}
	}
}

/// GET /api/rolls
async fn handle_list_rolls(State(state): State<Arc<AppState>>, Query(filter): Query<HistoryFilter>) -> Response {
	match state.engine.history(&filter).await {
		Ok(records) => (StatusCode::OK, Json(records)).into_response(),
		Err(err) => {
			tracing::error!(error = %err, "failed to read roll history");
			json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to read roll history")
		}
	}
}

/// GET /api/rooms/{room}/ws
async fn handle_room_ws(
	State(state): State<Arc<AppState>>,
	Path(room): Path<String>,
	ws: WebSocketUpgrade,
) -> Response {
	let rooms = state.engine.rooms().clone();
	ws.on_upgrade(move |socket| forward_events(socket, rooms, room))
}

/// Pushes room events to a WebSocket until either side goes away, then leaves the room.
async fn forward_events(socket: WebSocket, rooms: Rooms, room: String) {
	let (mut sink, mut stream) = socket.split();
	let mut events = rooms.subscribe(&room).await;
	tracing::info!(%room, "subscriber joined");

	loop {
		tokio::select! {
			event = events.recv() => match event {
				Ok(event) => {
					let text = match serde_json::to_string(&Envelope::move_executed(&event)) {
						Ok(text) => text,
						Err(err) => {
							tracing::warn!(%room, error = %err, "failed to encode roll event");
							continue;
						}
					};
					if sink.send(Message::Text(text.into())).await.is_err() {
						break;
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					tracing::warn!(%room, skipped, "subscriber fell behind, events dropped");
				}
				Err(RecvError::Closed) => break,
			},
			incoming = stream.next() => match incoming {
				Some(Ok(Message::Close(..)) | Err(..)) | None => break,
				Some(Ok(..)) => {}
			},
		}
	}

	rooms.leave(&room, events).await;
	tracing::info!(%room, "subscriber left");
}
