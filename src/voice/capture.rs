use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::{VoiceInput, VoiceInputKind};
use crate::client::Backend;
use crate::core::error::VoiceError;

/// Sample rate the recorder is asked for, in Hz.
const SAMPLE_RATE: u32 = 16_000;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

fn spawn(command: &[String]) -> Result<Child, VoiceError> {
    let (program, args) = command.split_first().ok_or(VoiceError::Unavailable)?;
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| VoiceError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })
}

/// Continuous speech-to-text through an external recognizer.
pub struct RecognizerInput {
    command: Vec<String>,
}

impl RecognizerInput {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl VoiceInput for RecognizerInput {
    fn kind(&self) -> VoiceInputKind {
        VoiceInputKind::NativeRecognizer
    }

    async fn capture(&self, stop: CancellationToken) -> Result<String, VoiceError> {
        let mut child = spawn(&self.command)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Audio("recognizer has no stdout".into()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut fragments: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(text)) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            fragments.push(text.to_string());
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "recognizer read failed");
                        break;
                    }
                },
            }
        }

        let _ = child.kill().await;
        Ok(fragments.join(" "))
    }
}

/// Records audio locally and asks the backend to transcribe it.
pub struct RecorderInput {
    command: Vec<String>,
    backend: Arc<dyn Backend>,
}

impl RecorderInput {
    pub fn new(command: Vec<String>, backend: Arc<dyn Backend>) -> Self {
        Self { command, backend }
    }
}

#[async_trait]
impl VoiceInput for RecorderInput {
    fn kind(&self) -> VoiceInputKind {
        VoiceInputKind::RecordAndTranscribe
    }

    async fn capture(&self, stop: CancellationToken) -> Result<String, VoiceError> {
        let mut child = spawn(&self.command)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Audio("recorder has no stdout".into()))?;

        let mut pcm = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                read = stdout.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => pcm.extend_from_slice(&buf[..n]),
                    Err(e) => return Err(VoiceError::Audio(e.to_string())),
                },
            }
        }
        let _ = child.kill().await;

        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        if samples.is_empty() {
            return Err(VoiceError::Audio("no audio captured".into()));
        }
        tracing::debug!(samples = samples.len(), "recording finished");

        let wav = encode_wav(&samples)?;
        let text = self
            .backend
            .transcribe(wav, "recording.wav", "audio/wav")
            .await?;
        Ok(text.trim().to_string())
    }
}

/// Wraps 16 kHz mono PCM samples in a WAV container.
pub fn encode_wav(samples: &[i16]) -> Result<Vec<u8>, VoiceError> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| VoiceError::Audio(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| VoiceError::Audio(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::Audio(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
