use std::fmt::Write as _;

use crate::chat::AdminReport;

use super::output::{Palette, RESET};

const BAR_WIDTH: u64 = 30;

/// Formats the admin overlay: local state first, then the backend's view.
pub fn format_report(report: &AdminReport, palette: &Palette) -> String {
    let mut out = String::new();
    let heading = |out: &mut String, title: &str| {
        let _ = writeln!(out, "{}\x1b[1m{title}{RESET}", palette.accent());
    };
    let row = |out: &mut String, label: &str, value: &str| {
        let _ = writeln!(out, "  {}{label:<16}{RESET}{value}", palette.dim());
    };

    heading(&mut out, "Local");
    row(&mut out, "Session", &report.session_id);
    row(&mut out, "Messages", &report.stats.message_count.to_string());
    row(&mut out, "Tokens (est.)", &report.stats.token_estimate.to_string());
    row(&mut out, "Message limit", &report.max_messages.to_string());
    row(&mut out, "Known sessions", &report.known_sessions.to_string());
    row(&mut out, "Model", &report.settings.model);
    row(&mut out, "Temperature", &format!("{:.1}", report.settings.temperature));
    row(&mut out, "Endpoint", &report.settings.endpoint);
    row(&mut out, "User", report.user.as_deref().unwrap_or("(signed out)"));
    if let Some(hint) = &report.rate_limit_hint {
        row(&mut out, "Last rate limit", hint);
    }

    heading(&mut out, "Backend");
    match &report.backend {
        Ok(health) => {
            let status = match &health.message {
                Some(msg) => format!("{} ({msg})", health.status),
                None => health.status.clone(),
            };
            row(&mut out, "Status", &status);
        }
        Err(reason) => row(&mut out, "Status", &format!("\x1b[31moffline{RESET}: {reason}")),
    }

    match &report.remote {
        None => {
            let _ = writeln!(
                out,
                "  {}Pass a PIN (/admin <pin>) for server statistics.{RESET}",
                palette.dim()
            );
        }
        Some(Err(reason)) => row(&mut out, "Admin stats", &format!("\x1b[31m{reason}{RESET}")),
        Some(Ok(stats)) => {
            row(&mut out, "Server status", &stats.status);
            row(&mut out, "Uptime", &stats.uptime);
            row(&mut out, "Requests", &stats.total_requests.to_string());
            row(&mut out, "Active sessions", &stats.active_sessions.to_string());
            row(&mut out, "Total messages", &stats.total_messages.to_string());

            let max = stats.daily_messages.iter().map(|d| d.count).max().unwrap_or(0);
            if max > 0 {
                heading(&mut out, "Messages per day");
                for day in &stats.daily_messages {
                    let width = (day.count * BAR_WIDTH).div_ceil(max) as usize;
                    let _ = writeln!(
                        out,
                        "  {}{:<10}{RESET} {}{}{RESET} {}",
                        palette.dim(),
                        day.day,
                        palette.accent(),
                        "█".repeat(width),
                        day.count
                    );
                }
            }
        }
    }
    out
}
