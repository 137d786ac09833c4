use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview length used when only the full reasoning is known.
const REASONING_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary explanation shown collapsed (`short`) with an expandable `full`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub short: String,
    pub full: String,
}

impl Reasoning {
    /// Builds a reasoning block from the backend's two fields. Returns `None`
    /// when both are blank.
    pub fn from_parts(short: Option<String>, full: Option<String>) -> Option<Self> {
        let short = short.map(|s| s.trim().to_string()).unwrap_or_default();
        let full = full.map(|s| s.trim().to_string()).unwrap_or_default();
        match (short.is_empty(), full.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self {
                short: preview(&full),
                full,
            }),
            _ => Some(Self { short, full }),
        }
    }

    /// Stored history only carries the full text.
    pub fn from_full(full: &str) -> Option<Self> {
        Self::from_parts(None, Some(full.to_string()))
    }
}

fn preview(full: &str) -> String {
    if full.chars().count() > REASONING_PREVIEW_CHARS {
        let cut: String = full.chars().take(REASONING_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        full.to_string()
    }
}

/// Image attached to a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub timestamp: DateTime<Utc>,
    /// Synthetic error messages exist only in the local transcript.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local_only: bool,
}

impl Message {
    pub fn user(content: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            image,
            timestamp: Utc::now(),
            local_only: false,
        }
    }

    pub fn assistant(content: impl Into<String>, reasoning: Option<Reasoning>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning,
            image: None,
            timestamp: Utc::now(),
            local_only: false,
        }
    }

    pub fn error_notice(reason: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: format!("Sorry, something went wrong: {reason}"),
            reasoning: None,
            image: None,
            timestamp: Utc::now(),
            local_only: true,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
