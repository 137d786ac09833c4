use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use std::time::Duration;

use super::types::*;
use super::Backend;
use crate::core::error::TransportError;
use crate::core::message::Message;
use crate::core::session::SessionSummary;

/// `Backend` over HTTP/JSON.
pub struct HttpBackend {
    client: Client,
    endpoint: RwLock<String>,
}

impl HttpBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: RwLock::new(normalize(endpoint)),
        })
    }

    fn url(&self, path: &str) -> String {
        let base = self
            .endpoint
            .read()
            .map(|e| e.clone())
            .unwrap_or_default();
        format!("{base}{path}")
    }

    pub fn endpoint(&self) -> String {
        self.url("")
    }
}

fn normalize(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

/// Turns a non-success response into a typed failure carrying the body's
/// reason, otherwise decodes the JSON body.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_reason(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), %message, "backend request failed");
        if status.as_u16() == 429 {
            return Err(TransportError::RateLimited(message));
        }
        return Err(TransportError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError> {
        tracing::debug!(
            session_id = ?request.session_id,
            model = %request.model,
            has_image = request.image_data.is_some(),
            "POST /chat"
        );
        let response = self
            .client
            .post(self.url("/chat"))
            .json(request)
            .send()
            .await?;
        let raw: RawChatResponse = decode(response).await?;
        ChatReply::try_from(raw)
    }

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<String, TransportError> {
        tracing::debug!(bytes = audio.len(), "POST /transcribe");
        let part = multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(self.url("/transcribe"))
            .multipart(form)
            .send()
            .await?;
        let raw: RawTranscription = decode(response).await?;
        Ok(raw.text.unwrap_or_default())
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, TransportError> {
        let response = self
            .client
            .get(self.url("/sessions"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let raw: RawSessionList = decode(response).await?;
        Ok(raw.into_summaries())
    }

    async fn get_session(&self, id: &str) -> Result<Vec<Message>, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("/sessions/{id}")))
            .send()
            .await?;
        let raw: RawSessionDetail = decode(response).await?;
        Ok(raw.into_messages())
    }

    async fn delete_session(&self, id: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.url(&format!("/sessions/{id}")))
            .send()
            .await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, TransportError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        let response = self.client.get(self.url("/")).send().await?;
        decode(response).await
    }

    async fn available_models(&self) -> Result<ModelCatalog, TransportError> {
        let response = self.client.get(self.url("/settings")).send().await?;
        decode(response).await
    }

    async fn admin_stats(&self, pin: &str) -> Result<AdminStats, TransportError> {
        let response = self
            .client
            .get(self.url("/admin/stats"))
            .query(&[("pin", pin)])
            .send()
            .await?;
        decode(response).await
    }

    fn set_endpoint(&self, endpoint: &str) {
        if let Ok(mut current) = self.endpoint.write() {
            *current = normalize(endpoint);
        }
    }
}
