use std::io::{self, Write};

use crate::chat::{LogStats, NoticeLevel, UiEvent};
use crate::core::message::{Message, Role};
use crate::core::settings::{accent_rgb, Theme, DEFAULT_ACCENT};

use super::markdown::render_markdown;

pub const RESET: &str = "\x1b[0m";

/// Terminal colors derived from the theme and accent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub theme: Theme,
    accent: (u8, u8, u8),
}

impl Palette {
    pub fn new(theme: Theme, accent: &str) -> Self {
        let accent = accent_rgb(accent)
            .or_else(|| accent_rgb(DEFAULT_ACCENT))
            .unwrap_or((99, 102, 241));
        Self { theme, accent }
    }

    pub fn accent(&self) -> String {
        let (r, g, b) = self.accent;
        format!("\x1b[38;2;{r};{g};{b}m")
    }

    pub fn text(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "\x1b[38;2;210;210;225m",
            Theme::Light => "\x1b[38;2;30;30;40m",
        }
    }

    pub fn dim(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "\x1b[90m",
            Theme::Light => "\x1b[38;2;110;110;125m",
        }
    }

    pub fn code(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "\x1b[38;2;180;220;160m",
            Theme::Light => "\x1b[38;2;20;110;60m",
        }
    }

    pub fn inline_code(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "\x1b[38;2;220;180;120m",
            Theme::Light => "\x1b[38;2;150;80;10m",
        }
    }

    pub fn paint(&self, color: &str, text: &str) -> String {
        format!("{color}{text}{RESET}")
    }
}

/// Renders `UiEvent`s for the line-oriented REPL.
pub struct Renderer {
    pub palette: Palette,
    stats: LogStats,
    user: Option<String>,
    typing: bool,
}

impl Renderer {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            stats: LogStats::default(),
            user: None,
            typing: false,
        }
    }

    pub fn prompt(&self) -> String {
        let who = self.user.as_deref().unwrap_or("nao");
        format!(
            "{}{who}{RESET} {}[{} msgs]{RESET}> ",
            self.palette.accent(),
            self.palette.dim(),
            self.stats.message_count
        )
    }

    pub fn render(&mut self, event: UiEvent) {
        match event {
            UiEvent::TypingStarted => {
                self.typing = true;
                eprint!("{}", self.palette.paint(self.palette.dim(), "Thinking..."));
                io::stderr().flush().ok();
            }
            UiEvent::TypingStopped => {
                if self.typing {
                    eprint!("\r\x1b[K");
                    io::stderr().flush().ok();
                }
                self.typing = false;
            }
            UiEvent::Notice { level, text } => {
                eprintln!("{}", format_notice(&self.palette, level, &text));
            }
            UiEvent::StatsUpdated { stats } => self.stats = stats,
            UiEvent::UserChanged { user } => {
                self.user = user.map(|u| u.display_name().to_string());
            }
            UiEvent::ThemeChanged { theme, accent } => {
                self.palette = Palette::new(theme, &accent);
            }
            UiEvent::SettingsChanged { settings } => {
                tracing::debug!(
                    model = %settings.model,
                    endpoint = %settings.endpoint,
                    "settings applied"
                );
            }
            UiEvent::SessionsUpdated { .. } => {}
            other => {
                if let Some(text) = format_event(&self.palette, &other) {
                    print!("{text}");
                    io::stdout().flush().ok();
                }
            }
        }
    }
}

pub fn format_notice(palette: &Palette, level: NoticeLevel, text: &str) -> String {
    match level {
        NoticeLevel::Info => palette.paint(palette.dim(), text),
        NoticeLevel::Warning => format!("\x1b[33;1m[warning]{RESET} {text}"),
        NoticeLevel::Error => format!("\x1b[31;1m[error]{RESET} {text}"),
    }
}

/// Transcript output for an event, if it prints anything.
pub fn format_event(palette: &Palette, event: &UiEvent) -> Option<String> {
    match event {
        // Typed input is already on screen; only the attachment is echoed.
        UiEvent::MessageAppended { message } if message.role == Role::User => {
            message.image.as_ref().map(|img| {
                format!(
                    "{}\n",
                    palette.paint(palette.dim(), &format!("[image: {}]", img.name))
                )
            })
        }
        UiEvent::MessageAppended { message } => Some(format_message(palette, message)),
        UiEvent::TranscriptCleared { session_id } => Some(format!(
            "{}\n",
            palette.paint(palette.dim(), &format!("── new chat {} ──", short_id(session_id)))
        )),
        UiEvent::TranscriptReplaced {
            session_id,
            messages,
        } => {
            let mut out = format!(
                "{}\n",
                palette.paint(
                    palette.dim(),
                    &format!("── session {} · {} messages ──", short_id(session_id), messages.len())
                )
            );
            for message in messages {
                out.push_str(&format_message(palette, message));
            }
            Some(out)
        }
        _ => None,
    }
}

pub fn format_message(palette: &Palette, message: &Message) -> String {
    let mut out = String::new();
    match message.role {
        Role::User => {
            out.push_str(&format!("{}\x1b[1mYou{RESET}\n", palette.accent()));
            if let Some(image) = &message.image {
                out.push_str(&palette.paint(palette.dim(), &format!("[image: {}]", image.name)));
                out.push('\n');
            }
            out.push_str(&palette.paint(palette.text(), &message.content));
            out.push('\n');
        }
        Role::Assistant if message.local_only => {
            out.push_str(&format!("\x1b[31m{}{RESET}\n", message.content));
        }
        Role::Assistant => {
            out.push_str(&format!("{}\x1b[1mAssistant{RESET}\n", palette.accent()));
            if let Some(reasoning) = &message.reasoning {
                out.push_str(&format!(
                    "{}\x1b[3m▸ {}{RESET}\n",
                    palette.dim(),
                    reasoning.short
                ));
            }
            out.push_str(&render_markdown(&message.content, palette));
        }
    }
    out.push('\n');
    out
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
