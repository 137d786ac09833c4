mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;

use crate::core::error::TransportError;
use crate::core::message::Message;
use crate::core::session::SessionSummary;

/// One operation per backend capability. Every call is a single
/// request/response exchange; implementations never retry and never touch
/// client state.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError>;

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<String, TransportError>;

    async fn list_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, TransportError>;

    async fn get_session(&self, id: &str) -> Result<Vec<Message>, TransportError>;

    async fn delete_session(&self, id: &str) -> Result<(), TransportError>;

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, TransportError>;

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError>;

    async fn health(&self) -> Result<HealthStatus, TransportError>;

    async fn available_models(&self) -> Result<ModelCatalog, TransportError>;

    async fn admin_stats(&self, pin: &str) -> Result<AdminStats, TransportError>;

    /// Points subsequent requests at a different base URL.
    fn set_endpoint(&self, _endpoint: &str) {}
}
