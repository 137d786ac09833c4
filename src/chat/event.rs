use crate::chat::LogStats;
use crate::client::User;
use crate::core::message::Message;
use crate::core::session::SessionSummary;
use crate::core::settings::{Settings, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Everything the presentation layer reacts to.
#[derive(Debug, Clone)]
pub enum UiEvent {
    MessageAppended {
        message: Message,
    },
    TypingStarted,
    TypingStopped,
    /// Log emptied; show the welcome state.
    TranscriptCleared {
        session_id: String,
    },
    /// Emitted only after the log and identity were both replaced.
    TranscriptReplaced {
        session_id: String,
        messages: Vec<Message>,
    },
    SessionsUpdated {
        sessions: Vec<SessionSummary>,
        active: String,
    },
    StatsUpdated {
        stats: LogStats,
    },
    SettingsChanged {
        settings: Settings,
    },
    ThemeChanged {
        theme: Theme,
        accent: String,
    },
    UserChanged {
        user: Option<User>,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}
