use async_trait::async_trait;

use crate::{
    transport::types::{ApiRequest, ApiResponse},
    Result,
};

/// Port for the HTTP client that talks to the Bot API.
///
/// Implementations only move bytes: they post the request to
/// `{api_base}{token}/{method}` and hand back the raw body. Interpreting
/// `error_code` is the bot client's job. Network failures map to
/// `Error::Transport` and are not retried.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn call(&self, req: ApiRequest) -> Result<ApiResponse>;
}
