//! WebSocket gateway.
//!
//! Exposes `/health` and `/ws/chat`. Frames in both directions are JSON
//! `{type, content}`. Each connection owns its own conversation and
//! cancellation flag; clients never see each other's history. An inbound
//! `stop` frame requests cooperative cancellation of the in-flight turn.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use kaio_agent::{Mode, ToolDispatcher, TurnController};
use kaio_config::AppConfig;
use kaio_core::error::Error;
use kaio_core::message::Conversation;
use kaio_mcp::McpRegistry;
use kaio_tools::CommandDenylist;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Shared dependencies for every connection.
pub struct GatewayState {
    pub config: AppConfig,
    pub mcp: Arc<McpRegistry>,
}

type SharedState = Arc<GatewayState>;

/// One JSON frame on the socket, either direction.
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    pub r#type: String,
    #[serde(default)]
    pub content: String,
}

impl Frame {
    fn new(kind: &str, content: impl Into<String>) -> Self {
        Self {
            r#type: kind.to_string(),
            content: content.into(),
        }
    }

    fn response(content: impl Into<String>) -> Self {
        Self::new("response", content)
    }

    fn error(content: impl Into<String>) -> Self {
        Self::new("error", content)
    }

    fn status(content: impl Into<String>) -> Self {
        Self::new("status", content)
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/chat", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the gateway until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Error> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let mcp = Arc::new(McpRegistry::connect_all(&config.mcp_servers).await);
    let state = Arc::new(GatewayState { config, mcp });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Gateway listening");
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| Error::internal(format!("gateway server error: {e}")))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sink, mut stream) = socket.split();

    let controller = match build_controller(&state) {
        Ok(c) => c,
        Err(e) => {
            let frame = Frame::error(e.to_string());
            let _ = sink
                .send(WsMessage::Text(
                    serde_json::to_string(&frame).unwrap_or_default().into(),
                ))
                .await;
            return;
        }
    };
    let cancel = controller.cancel_flag();

    // The worker owns the conversation and runs turns one at a time;
    // the read loop stays free to receive `stop` frames mid-turn.
    let (prompt_tx, mut prompt_rx) = mpsc::channel::<String>(8);
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(32);

    let worker = tokio::spawn(async move {
        let mut conversation = Conversation::new();
        while let Some(prompt) = prompt_rx.recv().await {
            let frame = match controller.run_turn(&mut conversation, &prompt).await {
                Ok(reply) => Frame::response(reply),
                Err(e) => Frame::error(e.to_string()),
            };
            if out_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(frame) = outbound else { break };
                let text = serde_json::to_string(&frame).unwrap_or_default();
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                let Some(Ok(msg)) = inbound else { break };
                let WsMessage::Text(text) = msg else { continue };
                let frame: Frame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(_) => {
                        let err = serde_json::to_string(&Frame::error("malformed frame"))
                            .unwrap_or_default();
                        if sink.send(WsMessage::Text(err.into())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                match frame.r#type.as_str() {
                    "message" => {
                        if prompt_tx.send(frame.content).await.is_err() {
                            break;
                        }
                    }
                    "stop" => {
                        cancel.store(true, Ordering::SeqCst);
                        let ack = serde_json::to_string(&Frame::status("stopping"))
                            .unwrap_or_default();
                        if sink.send(WsMessage::Text(ack.into())).await.is_err() {
                            break;
                        }
                    }
                    other => {
                        debug!(r#type = other, "Ignoring unknown frame type");
                    }
                }
            }
        }
    }

    worker.abort();
    debug!("WebSocket connection closed");
}

fn build_controller(state: &SharedState) -> Result<TurnController, Error> {
    let config = &state.config;
    let provider = kaio_providers::build_active_provider(config)?;
    let model = kaio_providers::model_for(config, &config.active_provider);
    let dispatcher = ToolDispatcher::new(kaio_tools::default_registry(), Arc::clone(&state.mcp))
        .with_policy(Box::new(CommandDenylist::from_config(&config.policy)));

    let mode = if config.active_provider == kaio_providers::OFFLINE_PROVIDER {
        Mode::Offline
    } else {
        Mode::Online
    };

    if let Mode::Offline = mode {
        warn!("Gateway serving in offline mode");
    }

    Ok(TurnController::new(provider, model, dispatcher)
        .with_system_prompt(&config.system_prompt)
        .with_session_memory_max(config.session_memory_max)
        .with_max_steps(config.max_steps)
        .with_mode(mode))
}
