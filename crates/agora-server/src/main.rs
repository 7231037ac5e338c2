use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use agora_api::middleware::require_auth;
use agora_api::{AppState, AppStateInner, messages, reactions, rooms, search};
use agora_chat::ChatService;
use agora_chat::auth::AuthOracle;
use agora_gateway::connection;
use agora_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into());
    let host = std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AGORA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(agora_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        chat: ChatService::new(db),
        auth: AuthOracle::new(jwt_secret),
        dispatcher,
    });

    // Routes. Everything on the HTTP surface requires a bearer token.
    let protected_routes = Router::new()
        .route("/chat/rooms", get(rooms::list_my_rooms))
        .route("/chat/direct/rooms", get(rooms::list_direct_rooms))
        .route("/chat/direct/rooms", post(rooms::create_direct_room))
        .route(
            "/chat/direct/rooms/{room_id}/messages",
            get(messages::get_direct_messages),
        )
        .route(
            "/chat/direct/rooms/{room_id}/messages",
            post(messages::send_direct_message),
        )
        .route(
            "/chat/direct/rooms/{room_id}/messages/{message_id}",
            delete(messages::delete_direct_message),
        )
        .route("/chat/search", get(search::search_messages))
        .route("/groups/{group_id}/chat-rooms", get(rooms::list_group_rooms))
        .route("/groups/{group_id}/chat-rooms", post(rooms::create_group_room))
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}",
            patch(rooms::update_group_room),
        )
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}",
            delete(rooms::delete_group_room),
        )
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}/messages",
            get(messages::get_group_messages),
        )
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}/messages",
            post(messages::send_group_message),
        )
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}/messages/{message_id}",
            delete(messages::delete_group_message),
        )
        .route(
            "/groups/{group_id}/chat-rooms/{room_id}/messages/{message_id}/reactions",
            post(reactions::toggle_reaction),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws/chat", get(ws_chat_upgrade))
        .route("/ws/direct/{room_id}", get(ws_direct_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(protected_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Agora chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Group-gateway upgrade. The credential travels in the first frame
/// (Identify), so the upgrade itself is unconditional; the connection is
/// dropped if identification fails.
async fn ws_chat_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_chat_connection(
            socket,
            state.chat.clone(),
            state.auth.clone(),
            state.dispatcher.clone(),
        )
    })
}

#[derive(Debug, Deserialize)]
struct DirectWsQuery {
    token: String,
}

/// Direct-room upgrade: query-string token plus participant proof, both
/// checked before the upgrade. A valid token for an unrelated user is
/// rejected here.
async fn ws_direct_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<DirectWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.auth.verify(&query.token) {
        Ok(identity) => identity,
        Err(_) => {
            warn!("Direct WS handshake rejected: invalid token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    match state.chat.is_direct_participant(room_id, identity.user_id) {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                "Direct WS handshake rejected: user {} is not a participant of room {}",
                identity.user_id, room_id
            );
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(e) => {
            tracing::error!("Direct WS participant check failed: {:#}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    ws.on_upgrade(move |socket| {
        connection::handle_direct_connection(
            socket,
            state.chat.clone(),
            state.dispatcher.clone(),
            room_id,
            identity,
        )
    })
}
