pub mod error;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod rooms;
pub mod search;

use std::sync::Arc;

use agora_chat::ChatService;
use agora_chat::auth::AuthOracle;
use agora_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: ChatService,
    pub auth: AuthOracle,
    pub dispatcher: Dispatcher,
}

/// Run a blocking domain operation off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> error::ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, agora_chat::ChatError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            error::ApiError(agora_chat::ChatError::Internal(e.into()))
        })?
        .map_err(error::ApiError::from)
}
