use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::admin::format_report;
use super::output::{short_id, Palette, Renderer, RESET};
use super::settings_form::{run_settings_form, FormOutcome};
use super::App;
use crate::chat::{ChatController, ExportFormat, ImageAttachment, UiEvent};
use crate::core::settings::{is_valid_accent, Theme};
use crate::voice::VoiceInputKind;

pub async fn run(mut app: App) -> Result<()> {
    let settings = app.controller.settings();
    let mut renderer = Renderer::new(Palette::new(settings.theme, &settings.accent_color));
    renderer.render(UiEvent::UserChanged {
        user: app.controller.user(),
    });

    println!("\x1b[1mnao\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
    println!("Backend: \x1b[36m{}\x1b[0m", settings.endpoint);
    println!("Model: \x1b[36m{}\x1b[0m", settings.model);
    println!("Type \x1b[33m/help\x1b[0m for commands, \x1b[33mCtrl-D\x1b[0m to exit.\n");

    drive(&mut app.events, &mut renderer, app.controller.refresh_sessions()).await;

    loop {
        let Some(input) = read_line(&renderer.prompt()) else {
            println!("\nGoodbye!");
            break;
        };
        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_command(&input, &mut app, &mut renderer).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    eprintln!("\x1b[31mCommand error: {e}\x1b[0m");
                    continue;
                }
            }
        }

        // Failures are already rendered as notices.
        let _ = drive(&mut app.events, &mut renderer, app.controller.send(&input)).await;
    }

    app.speaker.stop();
    Ok(())
}

/// Runs `fut` while rendering the events it produces.
async fn drive<T>(
    events: &mut mpsc::UnboundedReceiver<UiEvent>,
    renderer: &mut Renderer,
    fut: impl Future<Output = T>,
) -> T {
    tokio::pin!(fut);
    let out = loop {
        tokio::select! {
            out = &mut fut => break out,
            Some(event) = events.recv() => renderer.render(event),
        }
    };
    while let Ok(event) = events.try_recv() {
        renderer.render(event);
    }
    out
}

fn read_line(prompt: &str) -> Option<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => None,
        Ok(_) => Some(input),
        Err(e) => {
            eprintln!("Input error: {e}");
            None
        }
    }
}

/// Reads a line without echoing it.
fn read_secret(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    enable_raw_mode()?;
    let result = read_secret_keys();
    disable_raw_mode()?;
    eprintln!();
    result
}

fn read_secret_keys() -> Result<String> {
    let mut secret = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match (key.code, key.modifiers) {
                (KeyCode::Enter, _) => return Ok(secret),
                (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                    anyhow::bail!("cancelled")
                }
                (KeyCode::Backspace, _) => {
                    secret.pop();
                }
                (KeyCode::Char(c), _) => secret.push(c),
                _ => {}
            }
        }
    }
}

fn confirm(question: &str) -> bool {
    read_line(&format!("{question} [y/N] "))
        .map(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
        .unwrap_or(false)
}

/// Accepts a 1-based index into the last session list or a raw id.
fn resolve_session(arg: &str, controller: &ChatController) -> Option<String> {
    if arg.is_empty() {
        return None;
    }
    if let Ok(n) = arg.parse::<usize>() {
        if let Some(s) = n.checked_sub(1).and_then(|i| controller.sessions().get(i).cloned()) {
            return Some(s.id);
        }
    }
    Some(arg.to_string())
}

fn parse_temperature(arg: &str) -> Option<f32> {
    arg.trim().parse::<f32>().ok().filter(|t| t.is_finite())
}

fn print_help() {
    println!("\x1b[1mCommands:\x1b[0m");
    for (cmd, desc) in [
        ("/help", "Show this help"),
        ("/new", "Start a new chat"),
        ("/sessions", "List sessions"),
        ("/load <n|id>", "Switch to a session"),
        ("/delete <n|id>", "Delete a session"),
        ("/image <path>|clear", "Attach an image to the next message"),
        ("/voice", "Speak a message (Enter stops)"),
        ("/speak", "Toggle reading answers aloud"),
        ("/mute", "Stop the current read-out"),
        ("/export [txt|json|md] [file]", "Export the conversation"),
        ("/backup [file]", "Write a backup of settings and session"),
        ("/restore <file>", "Restore a backup"),
        ("/settings", "Open the settings form"),
        ("/reset-settings", "Restore default settings"),
        ("/model [id]", "Show or set the model"),
        ("/models", "List models offered by the backend"),
        ("/temp <value>", "Set the temperature"),
        ("/theme [dark|light]", "Switch theme"),
        ("/accent <#rrggbb>", "Set the accent color"),
        ("/login <email>", "Sign in"),
        ("/register <email> [name]", "Create an account"),
        ("/logout", "Sign out"),
        ("/status", "Check the backend"),
        ("/admin [pin]", "Show session statistics"),
        ("/exit", "Exit"),
    ] {
        println!("  {cmd:<30}{desc}");
    }
}

async fn handle_command(input: &str, app: &mut App, renderer: &mut Renderer) -> Result<bool> {
    let (cmd, arg) = match input.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (input, ""),
    };
    let controller = app.controller.clone();
    let events = &mut app.events;

    match cmd {
        "/help" | "/h" => print_help(),
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            return Ok(false);
        }
        "/new" => {
            let _ = drive(events, renderer, controller.new_chat()).await;
        }
        "/sessions" | "/s" => {
            let sessions = drive(events, renderer, controller.refresh_sessions()).await;
            if sessions.is_empty() {
                println!("No sessions.");
            }
            let active = controller.session_id();
            for (i, s) in sessions.iter().enumerate() {
                let marker = if s.id == active { " *" } else { "" };
                println!(
                    "  {:>2}. \x1b[90m{}\x1b[0m  {}{}  ({} msgs)",
                    i + 1,
                    short_id(&s.id),
                    s.display_title(),
                    marker,
                    s.message_count
                );
            }
        }
        "/load" => match resolve_session(arg, &controller) {
            Some(id) => {
                let _ = drive(events, renderer, controller.load_session(&id)).await;
            }
            None => eprintln!("Usage: /load <n|id>"),
        },
        "/delete" => match resolve_session(arg, &controller) {
            Some(id) => {
                if confirm(&format!("Delete session {}?", short_id(&id))) {
                    let _ = drive(events, renderer, controller.delete_session(&id)).await;
                }
            }
            None => eprintln!("Usage: /delete <n|id>"),
        },
        "/image" => match arg {
            "" => match controller.pending_attachment() {
                Some(img) => println!("Attached: {} ({})", img.name, img.media_type),
                None => eprintln!("Usage: /image <path> | /image clear"),
            },
            "clear" => {
                if controller.clear_attachment() {
                    println!("Attachment removed.");
                }
            }
            path => {
                let image = ImageAttachment::from_path(&PathBuf::from(path))?;
                println!("Attached {}. It is sent with your next message.", image.name);
                controller.attach_image(image);
            }
        },
        "/voice" => capture_voice(app, renderer).await?,
        "/speak" => {
            let mut settings = controller.settings();
            settings.voice_output = !settings.voice_output;
            let on = settings.voice_output;
            if drive(events, renderer, controller.update_settings(settings)).await.is_ok() {
                println!("Voice output {}.", if on { "on" } else { "off" });
            }
        }
        "/mute" => app.speaker.stop(),
        "/export" => {
            let mut parts = arg.split_whitespace();
            let format = match parts.next() {
                None => ExportFormat::Text,
                Some(f) => ExportFormat::parse(f)
                    .ok_or_else(|| anyhow::anyhow!("unknown format {f}; use txt, json or md"))?,
            };
            let blob = controller.export(format)?;
            let path = parts
                .next()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&blob.filename));
            std::fs::write(&path, &blob.bytes)?;
            println!("Exported to {}", path.display());
        }
        "/backup" => {
            if let Ok(backup) = drive(events, renderer, controller.backup()).await {
                let path = if arg.is_empty() {
                    PathBuf::from(format!(
                        "nao-backup-{}.json",
                        chrono::Utc::now().format("%Y%m%d-%H%M%S")
                    ))
                } else {
                    PathBuf::from(arg)
                };
                std::fs::write(&path, serde_json::to_string_pretty(&backup)?)?;
                println!("Backup written to {}", path.display());
            }
        }
        "/restore" => {
            if arg.is_empty() {
                eprintln!("Usage: /restore <file>");
            } else {
                let json = std::fs::read_to_string(arg)?;
                let _ = drive(events, renderer, controller.restore(&json)).await;
            }
        }
        "/settings" => {
            let models = drive(events, renderer, controller.available_models())
                .await
                .map(|c| c.available_models.into_iter().map(|m| m.id).collect())
                .unwrap_or_default();
            match run_settings_form(&controller.settings(), models)? {
                FormOutcome::Save(settings) => {
                    let _ = drive(events, renderer, controller.update_settings(settings)).await;
                }
                FormOutcome::Reset => {
                    let _ = drive(events, renderer, controller.reset_settings()).await;
                }
                FormOutcome::Cancel => {}
            }
        }
        "/reset-settings" => {
            let _ = drive(events, renderer, controller.reset_settings()).await;
        }
        "/model" => {
            if arg.is_empty() {
                println!("Model: {}", controller.settings().model);
            } else {
                let mut settings = controller.settings();
                settings.model = arg.to_string();
                let _ = drive(events, renderer, controller.update_settings(settings)).await;
            }
        }
        "/models" => {
            if let Ok(catalog) = drive(events, renderer, controller.available_models()).await {
                let current = controller.settings().model;
                for m in catalog.available_models {
                    let marker = if m.id == current { " *" } else { "" };
                    match m.name {
                        Some(name) => println!("  {}{}  \x1b[90m{}\x1b[0m", m.id, marker, name),
                        None => println!("  {}{}", m.id, marker),
                    }
                }
            }
        }
        "/temp" => {
            let temperature = parse_temperature(arg)
                .ok_or_else(|| anyhow::anyhow!("temperature must be a number"))?;
            let mut settings = controller.settings();
            settings.temperature = temperature;
            let _ = drive(events, renderer, controller.update_settings(settings)).await;
        }
        "/theme" => {
            let mut settings = controller.settings();
            settings.theme = match arg {
                "" => settings.theme.toggled(),
                other => Theme::parse(other)
                    .ok_or_else(|| anyhow::anyhow!("theme must be dark or light"))?,
            };
            let _ = drive(events, renderer, controller.update_settings(settings)).await;
        }
        "/accent" => {
            if !is_valid_accent(arg) {
                anyhow::bail!("accent must look like #rrggbb");
            }
            let mut settings = controller.settings();
            settings.accent_color = arg.to_string();
            let _ = drive(events, renderer, controller.update_settings(settings)).await;
        }
        "/login" => {
            let password = read_secret("Password: ")?;
            let _ = drive(events, renderer, controller.login(arg, &password)).await;
        }
        "/register" => {
            let (email, name) = arg.split_once(' ').unwrap_or((arg, ""));
            let password = read_secret("Password: ")?;
            let _ = drive(events, renderer, controller.register(email, &password, name)).await;
        }
        "/logout" => {
            let _ = drive(events, renderer, controller.logout()).await;
        }
        "/status" => {
            if let Ok(health) = drive(events, renderer, controller.health()).await {
                println!(
                    "Backend {}: {}{}",
                    controller.settings().endpoint,
                    health.status,
                    health.message.map(|m| format!(" ({m})")).unwrap_or_default()
                );
            }
        }
        "/admin" => {
            let pin = match arg {
                "" => app.config.admin_pin.clone(),
                pin => Some(pin.to_string()),
            };
            let report = drive(events, renderer, controller.admin_report(pin.as_deref())).await;
            print!("{}", format_report(&report, &renderer.palette));
        }
        _ => {
            eprintln!("Unknown command: {input}. Type /help for available commands.");
        }
    }
    Ok(true)
}

/// Captures one spoken message and sends it.
async fn capture_voice(app: &mut App, renderer: &mut Renderer) -> Result<()> {
    let Some(voice) = app.voice.clone() else {
        eprintln!("Voice input is not available (no recognizer or recorder found).");
        return Ok(());
    };
    let label = match voice.kind() {
        VoiceInputKind::NativeRecognizer => "Listening",
        VoiceInputKind::RecordAndTranscribe => "Recording",
    };
    eprintln!(
        "{}● {label}...{RESET} press Enter to stop.",
        renderer.palette.accent()
    );

    let stop = CancellationToken::new();
    let stopper = stop.clone();
    let enter = tokio::task::spawn_blocking(move || {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        stopper.cancel();
    });

    let transcript = voice.capture(stop.clone()).await;
    if !stop.is_cancelled() {
        eprintln!("Capture ended. Press Enter to continue.");
    }
    let _ = enter.await;

    let text = match transcript {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            eprintln!("No speech detected.");
            return Ok(());
        }
        Err(e) => {
            eprintln!("\x1b[31;1m[error]\x1b[0m {e}");
            return Ok(());
        }
    };

    println!("{}You said:{RESET} {text}", renderer.palette.dim());
    let _ = drive(&mut app.events, renderer, app.controller.send(&text)).await;
    Ok(())
}
