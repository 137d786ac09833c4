use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;

use crate::core::settings::{accent_rgb, is_valid_accent, Settings, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Endpoint,
    Model,
    Temperature,
    VoiceOutput,
    Theme,
    Accent,
}

const FIELDS: [Field; 6] = [
    Field::Endpoint,
    Field::Model,
    Field::Temperature,
    Field::VoiceOutput,
    Field::Theme,
    Field::Accent,
];

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Endpoint => "Backend URL",
            Field::Model => "Model",
            Field::Temperature => "Temperature",
            Field::VoiceOutput => "Voice output",
            Field::Theme => "Theme",
            Field::Accent => "Accent color",
        }
    }

    fn is_text(self) -> bool {
        !matches!(self, Field::VoiceOutput | Field::Theme)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Save(Settings),
    Reset,
    Cancel,
}

/// Editable copy of the settings plus cursor state.
#[derive(Debug)]
pub struct SettingsForm {
    endpoint: String,
    model: String,
    temperature: String,
    voice_output: bool,
    theme: Theme,
    accent: String,
    models: Vec<String>,
    selected: usize,
    cursor: usize,
    error: Option<String>,
}

impl SettingsForm {
    /// `models` are offered with Left/Right on the model field.
    pub fn new(settings: &Settings, models: Vec<String>) -> Self {
        let mut form = Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature.to_string(),
            voice_output: settings.voice_output,
            theme: settings.theme,
            accent: settings.accent_color.clone(),
            models,
            selected: 0,
            cursor: 0,
            error: None,
        };
        form.cursor = form.endpoint.len();
        form
    }

    fn field(&self) -> Field {
        FIELDS[self.selected]
    }

    fn buffer(&mut self) -> Option<&mut String> {
        match self.field() {
            Field::Endpoint => Some(&mut self.endpoint),
            Field::Model => Some(&mut self.model),
            Field::Temperature => Some(&mut self.temperature),
            Field::Accent => Some(&mut self.accent),
            Field::VoiceOutput | Field::Theme => None,
        }
    }

    fn select(&mut self, index: usize) {
        self.selected = index % FIELDS.len();
        self.cursor = self.buffer().map_or(0, |b| b.len());
    }

    fn toggle(&mut self) {
        match self.field() {
            Field::VoiceOutput => self.voice_output = !self.voice_output,
            Field::Theme => self.theme = self.theme.toggled(),
            _ => {}
        }
    }

    fn cycle_model(&mut self, forward: bool) {
        if self.models.is_empty() {
            return;
        }
        let len = self.models.len();
        let next = match self.models.iter().position(|m| *m == self.model) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        self.model = self.models[next].clone();
        self.cursor = self.model.len();
    }

    fn validate(&self) -> Result<Settings, String> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err("Backend URL cannot be empty.".into());
        }
        let model = self.model.trim();
        if model.is_empty() {
            return Err("Model cannot be empty.".into());
        }
        let temperature = self
            .temperature
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| "Temperature must be a number.".to_string())?;
        let accent = self.accent.trim();
        if !is_valid_accent(accent) {
            return Err("Accent color must look like #rrggbb.".into());
        }
        Ok(Settings {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            temperature,
            voice_output: self.voice_output,
            theme: self.theme,
            accent_color: accent.to_string(),
        })
    }

    /// Applies one key press; returns the outcome once the form is done.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<FormOutcome> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                return Some(FormOutcome::Cancel);
            }
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => return Some(FormOutcome::Reset),
            (KeyCode::Enter, _) => match self.validate() {
                Ok(settings) => return Some(FormOutcome::Save(settings)),
                Err(e) => self.error = Some(e),
            },
            (KeyCode::Tab, _) | (KeyCode::Down, _) => self.select(self.selected + 1),
            (KeyCode::BackTab, _) | (KeyCode::Up, _) => {
                self.select(self.selected + FIELDS.len() - 1)
            }
            (KeyCode::Char(' '), _) if !self.field().is_text() => self.toggle(),
            (KeyCode::Left | KeyCode::Right, _) if !self.field().is_text() => self.toggle(),
            (KeyCode::Left, KeyModifiers::CONTROL) if self.field() == Field::Model => {
                self.cycle_model(false)
            }
            (KeyCode::Right, KeyModifiers::CONTROL) if self.field() == Field::Model => {
                self.cycle_model(true)
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                let cursor = self.cursor;
                if let Some(buf) = self.buffer() {
                    buf.insert(cursor, c);
                    self.cursor += c.len_utf8();
                    self.error = None;
                }
            }
            (KeyCode::Backspace, _) => {
                let cursor = self.cursor;
                if let Some(buf) = self.buffer() {
                    if let Some(prev) = buf[..cursor].chars().last() {
                        let at = cursor - prev.len_utf8();
                        buf.remove(at);
                        self.cursor = at;
                        self.error = None;
                    }
                }
            }
            (KeyCode::Left, _) => {
                let cursor = self.cursor;
                if let Some(prev) = self.buffer().and_then(|b| b[..cursor].chars().last()) {
                    self.cursor -= prev.len_utf8();
                }
            }
            (KeyCode::Right, _) => {
                let cursor = self.cursor;
                if let Some(next) = self.buffer().and_then(|b| b[cursor..].chars().next()) {
                    self.cursor += next.len_utf8();
                }
            }
            (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => self.cursor = 0,
            (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                self.cursor = self.buffer().map_or(0, |b| b.len());
            }
            _ => {}
        }
        None
    }

    fn display_value(&self, field: Field) -> String {
        match field {
            Field::Endpoint => self.endpoint.clone(),
            Field::Model => self.model.clone(),
            Field::Temperature => self.temperature.clone(),
            Field::VoiceOutput => (if self.voice_output { "◉ on" } else { "○ off" }).to_string(),
            Field::Theme => format!("◂ {} ▸", self.theme.as_str()),
            Field::Accent => self.accent.clone(),
        }
    }
}

/// Opens the full-screen settings form on the alternate screen.
pub fn run_settings_form(settings: &Settings, models: Vec<String>) -> Result<FormOutcome> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut form = SettingsForm::new(settings, models);
    let result = form_loop(&mut terminal, &mut form);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn form_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    form: &mut SettingsForm,
) -> Result<FormOutcome> {
    loop {
        terminal.draw(|f| form_ui(f, form))?;
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(outcome) = form.handle_key(key) {
                return Ok(outcome);
            }
        }
    }
}

fn form_ui(f: &mut Frame, form: &SettingsForm) {
    let area = f.area();
    let (r, g, b) = accent_rgb(&form.accent).unwrap_or((99, 102, 241));
    let accent = Color::Rgb(r, g, b);
    let (bg, fg, dim) = match form.theme {
        Theme::Dark => (
            Color::Rgb(15, 15, 25),
            Color::Rgb(220, 220, 220),
            Color::Rgb(140, 140, 140),
        ),
        Theme::Light => (
            Color::Rgb(245, 245, 250),
            Color::Rgb(30, 30, 40),
            Color::Rgb(110, 110, 125),
        ),
    };
    f.render_widget(Paragraph::new("").style(Style::default().bg(bg).fg(fg)), area);

    let dialog = centered_rect(70.min(area.width.saturating_sub(4)), 26.min(area.height), area);
    let mut constraints = vec![Constraint::Length(2)];
    constraints.extend(FIELDS.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Length(2));
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(dialog);

    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "  Settings",
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ))),
        chunks[0],
    );

    for (i, field) in FIELDS.iter().enumerate() {
        let area = chunks[i + 1];
        let selected = i == form.selected;
        let border = if selected {
            Style::default().fg(accent)
        } else {
            Style::default().fg(dim)
        };
        let input = Paragraph::new(form.display_value(*field))
            .style(Style::default().fg(fg))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(Span::styled(format!(" {} ", field.label()), border)),
            );
        f.render_widget(input, area);

        if selected && field.is_text() {
            let value = form.display_value(*field);
            let col = value[..form.cursor.min(value.len())].chars().count() as u16;
            let x = (area.x + 1 + col).min(area.x + area.width.saturating_sub(2));
            f.set_cursor_position((x, area.y + 1));
        }
    }

    let hint = Paragraph::new(Line::from(vec![
        Span::styled("  Enter", Style::default().fg(accent)),
        Span::styled(": save", Style::default().fg(dim)),
        Span::styled("  │  Tab", Style::default().fg(accent)),
        Span::styled(": next", Style::default().fg(dim)),
        Span::styled("  │  Space", Style::default().fg(accent)),
        Span::styled(": toggle", Style::default().fg(dim)),
        Span::styled("  │  Ctrl+←/→", Style::default().fg(accent)),
        Span::styled(": model", Style::default().fg(dim)),
        Span::styled("  │  Ctrl+R", Style::default().fg(accent)),
        Span::styled(": defaults", Style::default().fg(dim)),
        Span::styled("  │  Esc", Style::default().fg(accent)),
        Span::styled(": cancel", Style::default().fg(dim)),
    ]));
    f.render_widget(hint, chunks[FIELDS.len() + 1]);

    if let Some(err) = &form.error {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!("  ⚠ {err}"),
                Style::default().fg(Color::Red),
            ))),
            chunks[FIELDS.len() + 2],
        );
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
