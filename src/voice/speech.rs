use regex::Regex;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, OnceLock};

use super::Speaker;
use crate::core::error::VoiceError;

/// Speaks through a system TTS program (`say`, `espeak`).
pub struct SystemSpeaker {
    program: String,
    current: Mutex<Option<Child>>,
}

impl SystemSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }

    fn cancel_current(slot: &mut Option<Child>) {
        if let Some(mut child) = slot.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let text = strip_markup(text);
        if text.trim().is_empty() {
            return Ok(());
        }
        let mut slot = self
            .current
            .lock()
            .map_err(|_| VoiceError::Audio("speaker lock poisoned".into()))?;
        Self::cancel_current(&mut slot);

        let child = Command::new(&self.program)
            .arg(&text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VoiceError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        *slot = Some(child);
        Ok(())
    }

    fn stop(&self) {
        if let Ok(mut slot) = self.current.lock() {
            Self::cancel_current(&mut slot);
        }
    }
}

impl Drop for SystemSpeaker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Used when no TTS program exists.
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn speak(&self, _text: &str) -> Result<(), VoiceError> {
        Ok(())
    }

    fn stop(&self) {}
}

fn markup_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?s)```.*?```", " "),
            (r"`([^`]*)`", "$1"),
            (r"\*\*([^*]+)\*\*", "$1"),
            (r"\*([^*]+)\*", "$1"),
            (r"(?m)^#{1,6}\s*", ""),
            (r"(?m)^\s*[-*]\s+", ""),
            (r"\[([^\]]+)\]\([^)]+\)", "$1"),
        ]
        .into_iter()
        .map(|(p, r)| (Regex::new(p).expect("valid markup regex"), r))
        .collect()
    })
}

/// Removes Markdown syntax so it is not read aloud.
pub fn strip_markup(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in markup_patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}
