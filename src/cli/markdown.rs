use std::iter::Peekable;
use std::str::Chars;

use super::output::{Palette, RESET};

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";

/// Renders assistant markdown as ANSI-colored terminal text, one output line
/// per input line.
pub fn render_markdown(text: &str, palette: &Palette) -> String {
    let mut out = String::new();
    let mut in_code_block = false;

    for raw_line in text.lines() {
        let trimmed = raw_line.trim_start();

        if trimmed.starts_with("```") {
            if in_code_block {
                push_line(&mut out, &palette.paint(palette.dim(), "  └───"));
            } else {
                let lang = trimmed.trim_start_matches('`').trim();
                let label = if lang.is_empty() { "code" } else { lang };
                push_line(
                    &mut out,
                    &palette.paint(palette.dim(), &format!("  ┌── {label} ──")),
                );
            }
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            push_line(
                &mut out,
                &format!("{}  │ {}{}{RESET}", palette.dim(), palette.code(), raw_line),
            );
            continue;
        }

        if let Some((level, title)) = heading(trimmed) {
            let style = if level == 1 {
                format!("{}{BOLD}{UNDERLINE}", palette.accent())
            } else {
                format!("{}{BOLD}", palette.accent())
            };
            push_line(&mut out, &format!("{style}{title}{RESET}"));
            continue;
        }

        if matches!(trimmed, "---" | "***" | "___") {
            push_line(&mut out, &palette.paint(palette.dim(), &"─".repeat(20)));
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            push_line(
                &mut out,
                &format!("  {}•{RESET} {}", palette.accent(), inline(item, palette)),
            );
            continue;
        }

        if let Some((num, item)) = numbered_item(trimmed) {
            push_line(
                &mut out,
                &format!("  {}{num}.{RESET} {}", palette.accent(), inline(item, palette)),
            );
            continue;
        }

        if let Some(quote) = trimmed.strip_prefix("> ") {
            push_line(
                &mut out,
                &format!("{}│ {ITALIC}{}{RESET}", palette.dim(), quote),
            );
            continue;
        }

        if trimmed.is_empty() {
            out.push('\n');
            continue;
        }

        push_line(&mut out, &inline(trimmed, palette));
    }

    if in_code_block {
        push_line(&mut out, &palette.paint(palette.dim(), "  └───"));
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|title| (level, title))
}

fn numbered_item(line: &str) -> Option<(&str, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    Some((&line[..digits], rest.trim_start()))
}

fn take_until(chars: &mut Peekable<Chars<'_>>, end: char) -> (String, bool) {
    let mut taken = String::new();
    for c in chars.by_ref() {
        if c == end {
            return (taken, true);
        }
        taken.push(c);
    }
    (taken, false)
}

/// Inline markup: **bold**, *italic*, `code` and [links](url).
fn inline(text: &str, palette: &Palette) -> String {
    let text_color = palette.text();
    let mut out = String::from(text_color);
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '`' => {
                let (code, _) = take_until(&mut chars, '`');
                out.push_str(&format!("{}{code}{RESET}{text_color}", palette.inline_code()));
            }
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                let (bold, _) = take_until(&mut chars, '*');
                chars.next_if_eq(&'*');
                out.push_str(&format!("{BOLD}{bold}{RESET}{text_color}"));
            }
            '*' => {
                let (italic, _) = take_until(&mut chars, '*');
                out.push_str(&format!("{ITALIC}{italic}{RESET}{text_color}"));
            }
            '[' => {
                let (label, closed) = take_until(&mut chars, ']');
                if closed && chars.next_if_eq(&'(').is_some() {
                    let (url, _) = take_until(&mut chars, ')');
                    out.push_str(&format!(
                        "{}{UNDERLINE}{label}{RESET}{} ({url}){RESET}{text_color}",
                        palette.accent(),
                        palette.dim()
                    ));
                } else {
                    out.push('[');
                    out.push_str(&label);
                    if closed {
                        out.push(']');
                    }
                }
            }
            _ => out.push(ch),
        }
    }
    out.push_str(RESET);
    out
}
