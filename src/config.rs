use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::brain::OpenAiSettings;
use crate::hands::ChromeOptions;
use crate::session::SessionTiming;
use crate::voice::{CommandAudio, DEFAULT_RECORD_COMMAND, default_play_command};

/// Voice-driven browser assistant.
///
/// Every option can also be set through the environment (a `.env` file in the
/// working directory is loaded first).
#[derive(Debug, Clone, Parser)]
#[command(name = "voice-browser-agent", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "VOICE_AGENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on; the next few ports are tried if it is taken
    #[arg(long, env = "VOICE_AGENT_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "VOICE_AGENT_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    #[arg(long, env = "VOICE_AGENT_TRANSCRIPTION_MODEL", default_value = "whisper-1")]
    pub transcription_model: String,

    #[arg(long, env = "VOICE_AGENT_SPEECH_MODEL", default_value = "tts-1")]
    pub speech_model: String,

    #[arg(long, env = "VOICE_AGENT_VOICE", default_value = "alloy")]
    pub voice: String,

    /// Timeout for each OpenAI request, in seconds
    #[arg(long, env = "VOICE_AGENT_OPENAI_TIMEOUT_SECS", default_value_t = 60)]
    pub openai_timeout_secs: u64,

    /// Length of the reply recording window, in seconds
    #[arg(long, env = "VOICE_AGENT_RECORD_SECONDS", default_value_t = 5)]
    pub record_seconds: u64,

    /// Recorder command; `{file}` and `{seconds}` are substituted
    #[arg(long, env = "VOICE_AGENT_RECORD_COMMAND", default_value = DEFAULT_RECORD_COMMAND)]
    pub record_command: String,

    /// Player command; `{file}` is substituted. Defaults to the platform player
    #[arg(long, env = "VOICE_AGENT_PLAY_COMMAND")]
    pub play_command: Option<String>,

    /// Where temporary audio files go. Defaults to the user cache directory
    #[arg(long, env = "VOICE_AGENT_AUDIO_DIR")]
    pub audio_dir: Option<PathBuf>,

    /// Longest wait for the page's readiness signal, in milliseconds
    #[arg(long, env = "VOICE_AGENT_READY_TIMEOUT_MS", default_value_t = 10_000)]
    pub ready_timeout_ms: u64,

    /// Settle delay used when no readiness signal arrives, in milliseconds
    #[arg(long, env = "VOICE_AGENT_SETTLE_MS", default_value_t = 3_000)]
    pub settle_ms: u64,

    /// DevTools endpoint of an already running Chrome
    #[arg(long, env = "CHROME_DEBUG_URL", default_value = "http://127.0.0.1:9222")]
    pub chrome_debug_url: String,

    /// Chrome executable used when launching a new instance
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Profile directory for a launched Chrome
    #[arg(long, env = "CHROME_PROFILE_DIR")]
    pub chrome_profile_dir: Option<PathBuf>,

    #[arg(long, env = "CHROME_HEADLESS")]
    pub headless: bool,

    /// Button pressed after typing into the search box
    #[arg(long, env = "VOICE_AGENT_SEARCH_BUTTON", default_value = "Search")]
    pub search_button: String,

    /// Button phrases that can be spoken on any page
    #[arg(
        long = "known-action",
        env = "VOICE_AGENT_KNOWN_ACTIONS",
        value_delimiter = ',',
        default_values_t = vec!["Read Wikipedia in your language".to_string()]
    )]
    pub known_actions: Vec<String>,

    /// Treat a click that matches no button as a failure
    #[arg(long, env = "VOICE_AGENT_STRICT_CLICKS")]
    pub strict_clicks: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn openai(&self) -> OpenAiSettings {
        OpenAiSettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            chat_model: self.chat_model.clone(),
            transcription_model: self.transcription_model.clone(),
            speech_model: self.speech_model.clone(),
            voice: self.voice.clone(),
            request_timeout: Duration::from_secs(self.openai_timeout_secs),
        }
    }

    pub fn chrome(&self) -> ChromeOptions {
        let profile_dir = self.chrome_profile_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("voice-browser-agent")
                .join("chrome-profile")
        });
        ChromeOptions {
            debug_url: self.chrome_debug_url.clone(),
            executable: self.chrome_path.clone(),
            profile_dir,
            headless: self.headless,
        }
    }

    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
            settle_fallback: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn record_window(&self) -> Duration {
        Duration::from_secs(self.record_seconds)
    }

    pub fn play_command(&self) -> String {
        self.play_command
            .clone()
            .unwrap_or_else(|| default_play_command().to_string())
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir
            .clone()
            .unwrap_or_else(CommandAudio::default_work_dir)
    }
}
