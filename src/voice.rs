//! Spoken input and output.
//!
//! `Narrator` is what the session talks to. `VoiceNarrator` implements it on
//! top of three capabilities: a speech-to-text service, a text-to-speech
//! service and a local audio device.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{AudioError, CollaboratorError, TranscriptionError};
use crate::types::AgentEvent;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a WAV recording.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text`, returning encoded audio (MP3).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Record for a fixed window and return WAV bytes.
    async fn record(&self, duration: Duration) -> Result<Vec<u8>, AudioError>;

    async fn play(&self, audio: &[u8]) -> Result<(), AudioError>;
}

/// Speaks prompts and captures spoken replies as text.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Speak `text`. Failures are logged, never returned.
    async fn say(&self, text: &str);

    /// Capture one reply. Silence or a failed transcription yields `""`.
    async fn listen(&self) -> String;
}

pub struct VoiceNarrator {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    audio: Arc<dyn AudioDevice>,
    record_window: Duration,
    events: broadcast::Sender<AgentEvent>,
}

impl VoiceNarrator {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        audio: Arc<dyn AudioDevice>,
        record_window: Duration,
        events: broadcast::Sender<AgentEvent>,
    ) -> Self {
        Self {
            stt,
            tts,
            audio,
            record_window,
            events,
        }
    }

    pub async fn capture_reply(&self) -> Result<String, TranscriptionError> {
        info!("Recording for {:?}...", self.record_window);
        let recording = self.audio.record(self.record_window).await?;
        info!("Finished recording");
        let text = self.stt.transcribe(recording).await?;
        Ok(text)
    }
}

#[async_trait]
impl Narrator for VoiceNarrator {
    async fn say(&self, text: &str) {
        info!("Transcript: {}", text);
        let _ = self.events.send(AgentEvent::Spoke {
            text: text.to_string(),
        });

        let audio = match self.tts.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("Text-to-speech failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.audio.play(&audio).await {
            error!("Audio playback failed: {}", e);
        }
    }

    async fn listen(&self) -> String {
        let text = match self.capture_reply().await {
            Ok(text) => text.trim().to_lowercase(),
            Err(e) => {
                warn!("Treating reply as empty: {}", e);
                String::new()
            }
        };
        info!("Heard: '{}'", text);
        let _ = self.events.send(AgentEvent::Heard { text: text.clone() });
        text
    }
}

/// Records and plays audio through external programs.
///
/// Command templates are split on whitespace; `{file}` is replaced with the
/// audio file path and `{seconds}` with the recording window.
pub struct CommandAudio {
    record_command: String,
    play_command: String,
    work_dir: PathBuf,
    counter: AtomicU64,
}

pub const DEFAULT_RECORD_COMMAND: &str = "rec -q -c 1 -r 44100 -b 16 {file} trim 0 {seconds}";

pub fn default_play_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay {file}"
    } else if cfg!(target_os = "windows") {
        "cmd /C start /wait {file}"
    } else {
        "mpg123 -q {file}"
    }
}

impl CommandAudio {
    pub fn new(
        record_command: impl Into<String>,
        play_command: impl Into<String>,
        work_dir: PathBuf,
    ) -> Result<Self, AudioError> {
        std::fs::create_dir_all(&work_dir)?;
        Ok(Self {
            record_command: record_command.into(),
            play_command: play_command.into(),
            work_dir,
            counter: AtomicU64::new(0),
        })
    }

    /// Cache directory used when none is configured.
    pub fn default_work_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("voice-browser-agent")
    }

    fn next_file(&self, extension: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.work_dir
            .join(format!("audio-{}-{}.{}", std::process::id(), n, extension))
    }

    async fn run(&self, template: &str, file: &Path, seconds: u64) -> Result<(), AudioError> {
        let args = expand_template(template, file, seconds);
        let Some((program, rest)) = args.split_first() else {
            return Err(AudioError::Command {
                command: template.to_string(),
                message: "empty command".to_string(),
            });
        };
        debug!("Running audio command: {:?}", args);
        let status = Command::new(program).args(rest).status().await?;
        if !status.success() {
            return Err(AudioError::Command {
                command: template.to_string(),
                message: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}

fn expand_template(template: &str, file: &Path, seconds: u64) -> Vec<String> {
    let file = file.to_string_lossy();
    template
        .split_whitespace()
        .map(|part| {
            part.replace("{file}", &file)
                .replace("{seconds}", &seconds.to_string())
        })
        .collect()
}

#[async_trait]
impl AudioDevice for CommandAudio {
    async fn record(&self, duration: Duration) -> Result<Vec<u8>, AudioError> {
        let file = self.next_file("wav");
        let seconds = duration.as_secs().max(1);
        self.run(&self.record_command, &file, seconds).await?;
        let audio = tokio::fs::read(&file).await?;
        let _ = tokio::fs::remove_file(&file).await;
        Ok(audio)
    }

    async fn play(&self, audio: &[u8]) -> Result<(), AudioError> {
        let file = self.next_file("mp3");
        tokio::fs::write(&file, audio).await?;
        let result = self.run(&self.play_command, &file, 0).await;
        let _ = tokio::fs::remove_file(&file).await;
        result
    }
}
