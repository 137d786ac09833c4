use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::chat::{LogStats, MessageLog};
use crate::core::message::{Message, Role};
use crate::core::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(ExportFormat::Text),
            "json" => Some(ExportFormat::Json),
            "md" | "markdown" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
        }
    }
}

pub struct ExportContext<'a> {
    pub session_id: &'a str,
    pub settings: &'a Settings,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExportBlob {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    session_id: &'a str,
    exported_at: DateTime<Utc>,
    stats: LogStats,
    settings: &'a Settings,
    messages: &'a [Message],
}

/// Renders the log in `format`, every message in insertion order.
pub fn export(
    format: ExportFormat,
    log: &MessageLog,
    ctx: &ExportContext<'_>,
) -> Result<ExportBlob, serde_json::Error> {
    let body = match format {
        ExportFormat::Text => to_text(log, ctx),
        ExportFormat::Markdown => to_markdown(log, ctx),
        ExportFormat::Json => serde_json::to_string_pretty(&JsonExport {
            session_id: ctx.session_id,
            exported_at: ctx.exported_at,
            stats: log.stats(),
            settings: ctx.settings,
            messages: log.messages(),
        })?,
    };

    let short_id: String = ctx.session_id.chars().take(8).collect();
    Ok(ExportBlob {
        filename: format!(
            "chat-{short_id}-{}.{}",
            ctx.exported_at.format("%Y%m%d-%H%M%S"),
            format.extension()
        ),
        mime: format.mime(),
        bytes: body.into_bytes(),
    })
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

fn to_text(log: &MessageLog, ctx: &ExportContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Chat Transcript");
    let _ = writeln!(out, "Session: {}", ctx.session_id);
    let _ = writeln!(out, "Exported: {}", ctx.exported_at.to_rfc3339());
    let _ = writeln!(out, "Messages: {}", log.len());

    for msg in log.messages() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "[{}] {}:",
            msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
            speaker(msg.role)
        );
        if let Some(image) = &msg.image {
            let _ = writeln!(out, "(image: {})", image.name);
        }
        let _ = writeln!(out, "{}", msg.content);
        if let Some(reasoning) = &msg.reasoning {
            let _ = writeln!(out, "Reasoning: {}", reasoning.short);
        }
    }
    out
}

fn to_markdown(log: &MessageLog, ctx: &ExportContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Chat Transcript\n");
    let _ = writeln!(out, "- **Session:** `{}`", ctx.session_id);
    let _ = writeln!(out, "- **Exported:** {}", ctx.exported_at.to_rfc3339());
    let _ = writeln!(out, "- **Model:** {}", ctx.settings.model);

    for msg in log.messages() {
        let _ = writeln!(out, "\n---\n");
        let _ = writeln!(
            out,
            "### {} \u{00b7} {}\n",
            speaker(msg.role),
            msg.timestamp.format("%Y-%m-%d %H:%M")
        );
        if let Some(image) = &msg.image {
            let _ = writeln!(out, "_Attached image: {}_\n", image.name);
        }
        let _ = writeln!(out, "{}", msg.content);
        if let Some(reasoning) = &msg.reasoning {
            let _ = writeln!(
                out,
                "\n<details><summary>{}</summary>\n\n{}\n\n</details>",
                reasoning.short, reasoning.full
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Reasoning;

    fn sample_log() -> MessageLog {
        let mut log = MessageLog::new();
        log.append(Message::user("first question", None));
        log.append(Message::assistant(
            "first answer",
            Reasoning::from_parts(Some("quick look".into()), Some("long thinking".into())),
        ));
        log.append(Message::user("second question", None));
        log
    }

    fn ctx(settings: &Settings) -> ExportContext<'_> {
        ExportContext {
            session_id: "0123456789abcdef",
            settings,
            exported_at: DateTime::parse_from_rfc3339("2026-03-04T05:06:07Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn assert_each_once_in_order(body: &str, contents: &[&str]) {
        let mut cursor = 0;
        for c in contents {
            assert_eq!(body.matches(c).count(), 1, "{c} should appear once");
            let pos = body.find(c).unwrap();
            assert!(pos >= cursor, "{c} out of order");
            cursor = pos;
        }
    }

    #[test]
    fn text_export_keeps_order_and_short_reasoning() {
        let settings = Settings::default();
        let blob = export(ExportFormat::Text, &sample_log(), &ctx(&settings)).unwrap();
        let body = String::from_utf8(blob.bytes).unwrap();

        assert_each_once_in_order(&body, &["first question", "first answer", "second question"]);
        assert!(body.contains("Reasoning: quick look"));
        assert!(!body.contains("long thinking"));
        assert_eq!(blob.filename, "chat-01234567-20260304-050607.txt");
        assert_eq!(blob.mime, "text/plain");
    }

    #[test]
    fn markdown_export_keeps_order() {
        let settings = Settings::default();
        let blob = export(ExportFormat::Markdown, &sample_log(), &ctx(&settings)).unwrap();
        let body = String::from_utf8(blob.bytes).unwrap();

        assert_each_once_in_order(&body, &["first question", "first answer", "second question"]);
        assert!(body.starts_with("# Chat Transcript"));
        assert!(body.contains("<details><summary>quick look</summary>"));
    }

    #[test]
    fn json_export_has_messages_and_settings() {
        let settings = Settings::default();
        let blob = export(ExportFormat::Json, &sample_log(), &ctx(&settings)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&blob.bytes).unwrap();

        let messages = value["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "first question");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["reasoning"]["full"], "long thinking");
        assert_eq!(messages[2]["content"], "second question");
        assert_eq!(value["settings"]["model"], settings.model);
        assert_eq!(value["stats"]["message_count"], 3);
    }

    #[test]
    fn empty_log_exports_header_only() {
        let settings = Settings::default();
        let blob = export(ExportFormat::Text, &MessageLog::new(), &ctx(&settings)).unwrap();
        let body = String::from_utf8(blob.bytes).unwrap();
        assert!(body.contains("Messages: 0"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ExportFormat::parse("MD"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("txt"), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::parse("pdf"), None);
    }
}
