mod config;

use crate::config::Config;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
};
use order_core::{DialogManager, Slots, TurnResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    dialog: Arc<DialogManager>,
}

/// One turn as sent by a client. The client owns the slots and sends back
/// whatever the previous response returned.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnRequest {
    conversation_id: Option<Uuid>,
    text: String,
    #[serde(default)]
    slots: Slots,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnReply {
    conversation_id: Uuid,
    #[serde(flatten)]
    response: TurnResponse,
}

async fn run_turn(dialog: &DialogManager, request: TurnRequest) -> TurnReply {
    let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);
    info!(%conversation_id, "turn: \"{}\"", request.text);
    let response = dialog.process_turn(&request.text, &request.slots).await;
    TurnReply {
        conversation_id,
        response,
    }
}

async fn turn_handler(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Json<TurnReply> {
    Json(run_turn(&state.dialog, request).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handles WebSocket upgrade requests.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Processes one turn per text message. Each message carries a `TurnRequest`
/// and is answered with the matching `TurnReply`.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                // Client disconnected.
                info!("WebSocket error: {}", e);
                break;
            }
        };

        let reply = match serde_json::from_str::<TurnRequest>(text.as_str()) {
            Ok(request) => serde_json::to_string(&run_turn(&state.dialog, request).await),
            Err(e) => {
                tracing::warn!("Rejected malformed turn request: {}", e);
                serde_json::to_string(&serde_json::json!({ "error": e.to_string() }))
            }
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Failed to encode reply: {:?}", e);
                continue;
            }
        };

        if socket.send(Message::Text(reply.into())).await.is_err() {
            // Client disconnected.
            break;
        }
    }

    info!("WebSocket connection closed");
}

fn app(state: AppState) -> Router {
    // Configure a permissive CORS policy to allow connections from any origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/turn", post(turn_handler))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let dialog = orderbot::catalog_loader::build_dialog(&config.dialog)
        .await
        .context("Failed to set up the catalog")?;
    let state = AppState {
        dialog: Arc::new(dialog),
    };

    info!("Starting order API, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_core::Action;
    use order_core::fare::PlaceholderFare;
    use order_core::static_catalog::StaticCatalog;

    fn dialog() -> DialogManager {
        let catalog = StaticCatalog::from_json(
            r#"{"restaurants": [{"id": "kfc-kat", "name": "KFC Rondo", "city": "Katowice",
                "menu": [{"id": "m1", "name": "Zinger Box", "price": 18.0}]}]}"#,
        )
        .unwrap();
        DialogManager::new(Arc::new(catalog), Arc::new(PlaceholderFare::default()))
    }

    #[test]
    fn request_slots_are_optional() {
        let request: TurnRequest = serde_json::from_str(r#"{"text": "pizza"}"#).unwrap();
        assert_eq!(request.conversation_id, None);
        assert_eq!(request.slots, Slots::new());
    }

    #[tokio::test]
    async fn reply_keeps_the_conversation_id_and_flattens_the_response() {
        let id = Uuid::new_v4();
        let request: TurnRequest = serde_json::from_value(serde_json::json!({
            "conversationId": id,
            "text": "KFC w Katowicach",
            "slots": {}
        }))
        .unwrap();

        let reply = run_turn(&dialog(), request).await;
        assert_eq!(reply.conversation_id, id);
        assert_eq!(reply.response.action, Some(Action::SearchMenu));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["conversationId"], serde_json::json!(id));
        assert_eq!(json["action"], "search_menu");
        assert_eq!(json["slots"]["restaurantId"], "kfc-kat");
    }

    #[tokio::test]
    async fn missing_conversation_id_gets_a_new_one() {
        let request = TurnRequest {
            conversation_id: None,
            text: "pizza".into(),
            slots: Slots::new(),
        };
        let first = run_turn(&dialog(), request).await;
        assert_eq!(first.response.slots.item.as_deref(), Some("pizza"));
        assert!(!first.conversation_id.is_nil());
    }
}
