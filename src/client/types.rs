//! Wire types for the chat backend and their conversion into view models.
//!
//! Everything the backend returns passes through here before it reaches the
//! controller; malformed entries are coerced or dropped.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::TransportError;
use crate::core::message::{Message, Reasoning, Role};
use crate::core::session::SessionSummary;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChatResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    short_reasoning: Option<String>,
    #[serde(default)]
    full_reasoning: Option<String>,
    #[serde(default)]
    final_answer: Option<String>,
}

/// Parsed `/chat` response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub session_id: String,
    pub answer: String,
    pub reasoning: Option<Reasoning>,
}

impl TryFrom<RawChatResponse> for ChatReply {
    type Error = TransportError;

    fn try_from(raw: RawChatResponse) -> Result<Self, Self::Error> {
        let session_id = raw
            .session_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TransportError::InvalidResponse("missing session_id".into()))?;
        let answer = raw
            .final_answer
            .ok_or_else(|| TransportError::InvalidResponse("missing final_answer".into()))?;
        Ok(Self {
            session_id,
            answer,
            reasoning: Reasoning::from_parts(raw.short_reasoning, raw.full_reasoning),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSessionList {
    #[serde(default)]
    sessions: Vec<RawSession>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message_count: Option<u64>,
}

impl RawSessionList {
    pub(crate) fn into_summaries(self) -> Vec<SessionSummary> {
        self.sessions
            .into_iter()
            .filter_map(|s| {
                let id = s.id.filter(|id| !id.trim().is_empty())?;
                Some(SessionSummary {
                    id,
                    title: s.title,
                    message_count: s.message_count.unwrap_or(0),
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSessionDetail {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl RawSessionDetail {
    pub(crate) fn into_messages(self) -> Vec<Message> {
        self.messages
            .into_iter()
            .filter_map(|m| {
                let Some(role) = Role::parse(&m.role) else {
                    tracing::debug!(role = %m.role, "dropping message with unsupported role");
                    return None;
                };
                let reasoning = match role {
                    Role::Assistant => m.reasoning.as_deref().and_then(Reasoning::from_full),
                    Role::User => None,
                };
                let timestamp = m
                    .created_at
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or_else(Utc::now);
                Some(Message {
                    role,
                    content: m.content.unwrap_or_default(),
                    reasoning,
                    image: None,
                    timestamp,
                    local_only: false,
                })
            })
            .collect()
    }
}

/// Accepts RFC 3339 and SQLite's `YYYY-MM-DD HH:MM:SS`.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|n| n.and_utc())
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTranscription {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelOption {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub available_models: Vec<ModelOption>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub default_temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyCount {
    pub day: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub active_sessions: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub daily_messages: Vec<DailyCount>,
}

/// Picks a human-readable reason out of an error body.
pub fn error_reason(status: u16, body: &str) -> String {
    let generic = format!("Request failed with status {status}");
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return generic;
    };

    match value.get("detail") {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => return s.clone(),
        // Validation errors come back as a list of `{loc, msg, type}`.
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !msgs.is_empty() {
                return msgs.join("; ");
            }
        }
        _ => {}
    }

    ["error", "message"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or(generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reason_prefers_detail() {
        assert_eq!(
            error_reason(401, r#"{"error": true, "detail": "Invalid credentials"}"#),
            "Invalid credentials"
        );
    }

    #[test]
    fn error_reason_joins_validation_messages() {
        let body = r#"{"detail": [{"loc": ["body","email"], "msg": "field required"},
                                  {"loc": ["body","password"], "msg": "field required"}]}"#;
        assert_eq!(error_reason(422, body), "field required; field required");
    }

    #[test]
    fn error_reason_falls_back_to_generic() {
        assert_eq!(
            error_reason(502, "<html>Bad Gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(error_reason(500, r#"{"error": true}"#), "Request failed with status 500");
    }

    #[test]
    fn chat_reply_requires_session_and_answer() {
        let raw: RawChatResponse =
            serde_json::from_str(r#"{"final_answer": "hi"}"#).unwrap();
        assert!(ChatReply::try_from(raw).is_err());

        let raw: RawChatResponse = serde_json::from_str(
            r#"{"session_id": "s1", "short_reasoning": "Analyzed your request",
                "full_reasoning": "", "final_answer": "Hello!"}"#,
        )
        .unwrap();
        let reply = ChatReply::try_from(raw).unwrap();
        assert_eq!(reply.session_id, "s1");
        assert_eq!(reply.answer, "Hello!");
        assert_eq!(reply.reasoning.unwrap().short, "Analyzed your request");
    }

    #[test]
    fn session_detail_drops_unknown_roles() {
        let raw: RawSessionDetail = serde_json::from_str(
            r#"{"session": {"id": "s1"}, "messages": [
                {"role": "system", "content": "prompt"},
                {"role": "user", "content": "hello", "created_at": "2026-01-02 03:04:05"},
                {"role": "assistant", "content": null, "reasoning": "because"}
            ]}"#,
        )
        .unwrap();
        let messages = raw.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[0].timestamp.to_rfc3339(), "2026-01-02T03:04:05+00:00");
        assert_eq!(messages[1].content, "");
        assert_eq!(messages[1].reasoning.as_ref().unwrap().full, "because");
    }

    #[test]
    fn session_list_skips_entries_without_id() {
        let raw: RawSessionList = serde_json::from_str(
            r#"{"sessions": [{"id": "a", "title": "Hello", "message_count": 4},
                             {"title": "orphan"}]}"#,
        )
        .unwrap();
        let list = raw.into_summaries();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message_count, 4);
    }

    #[test]
    fn user_keeps_extra_fields() {
        let user: User = serde_json::from_str(
            r#"{"id": "u1", "email": "a@b.c", "name": "Ada", "last_login": null}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), "Ada");
        assert!(user.extra.contains_key("last_login"));
    }
}
