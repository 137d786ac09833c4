//! Speech output and voice capture.
//!
//! Voice input is a strategy negotiated once at startup: a native streaming
//! recognizer when one is configured and installed, otherwise recorded audio
//! sent to the backend's `/transcribe`, otherwise nothing.

mod capture;
mod speech;

pub use capture::{encode_wav, RecognizerInput, RecorderInput};
pub use speech::{strip_markup, NullSpeaker, SystemSpeaker};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::Backend;
use crate::core::config::VoiceConfig;
use crate::core::error::VoiceError;

/// Text-to-speech sink.
pub trait Speaker: Send + Sync {
    /// Starts speaking, interrupting any utterance in progress.
    fn speak(&self, text: &str) -> Result<(), VoiceError>;

    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceInputKind {
    NativeRecognizer,
    RecordAndTranscribe,
}

#[async_trait]
pub trait VoiceInput: Send + Sync {
    fn kind(&self) -> VoiceInputKind;

    /// Captures until `stop` is cancelled or the source ends, returning the
    /// transcript.
    async fn capture(&self, stop: CancellationToken) -> Result<String, VoiceError>;
}

/// Picks the voice input strategy for this machine.
pub fn negotiate(config: &VoiceConfig, backend: Arc<dyn Backend>) -> Option<Arc<dyn VoiceInput>> {
    if let Some(cmd) = config.recognizer_command.as_ref().filter(|c| !c.is_empty()) {
        if find_program(&cmd[0]).is_some() {
            tracing::debug!(program = %cmd[0], "voice input: native recognizer");
            return Some(Arc::new(RecognizerInput::new(cmd.clone())));
        }
        tracing::warn!(program = %cmd[0], "configured recognizer not found, falling back");
    }

    let recorder = &config.recorder_command;
    if let Some(program) = recorder.first() {
        if find_program(program).is_some() {
            tracing::debug!(%program, "voice input: record and transcribe");
            return Some(Arc::new(RecorderInput::new(recorder.clone(), backend)));
        }
    }

    tracing::debug!("voice input unavailable");
    None
}

/// Picks the speaker for this machine.
pub fn default_speaker() -> Arc<dyn Speaker> {
    for program in ["say", "espeak-ng", "espeak"] {
        if find_program(program).is_some() {
            return Arc::new(SystemSpeaker::new(program));
        }
    }
    Arc::new(NullSpeaker)
}

/// Resolves `program` to an executable on `PATH` (or as a path when it contains a separator).
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
