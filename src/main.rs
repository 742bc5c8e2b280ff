use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use voice_browser_agent::brain::OpenAiClient;
use voice_browser_agent::config::Config;
use voice_browser_agent::face::{self, Gateway};
use voice_browser_agent::hands::{BrowserActuator, ChromeBrowser};
use voice_browser_agent::inspector::HttpInspector;
use voice_browser_agent::interpreter::ActionInterpreter;
use voice_browser_agent::session::SessionContext;
use voice_browser_agent::voice::{CommandAudio, VoiceNarrator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Starting voice browser agent...");

    // Chrome can take a while to come up
    let chrome = config.chrome();
    let browser = tokio::task::spawn_blocking(move || ChromeBrowser::launch(&chrome))
        .await
        .map_err(|e| anyhow::anyhow!("Browser launch panicked: {}", e))??;
    info!("Chrome launched successfully.");

    let (events, _) = broadcast::channel(64);
    let openai = Arc::new(OpenAiClient::new(config.openai())?);
    let audio = Arc::new(CommandAudio::new(
        config.record_command.clone(),
        config.play_command(),
        config.audio_dir(),
    )?);
    let narrator = Arc::new(VoiceNarrator::new(
        openai.clone(),
        openai.clone(),
        audio,
        config.record_window(),
        events.clone(),
    ));

    let sessions = Arc::new(SessionContext {
        inspector: Arc::new(HttpInspector::new()),
        summarizer: openai.clone(),
        narrator,
        actuator: BrowserActuator::new(
            Arc::new(browser),
            config.search_button.clone(),
            config.strict_clicks,
        ),
        interpreter: ActionInterpreter::new(config.known_actions.clone()),
        timing: config.timing(),
        events,
    });

    let shutdown = CancellationToken::new();
    let gateway = Arc::new(Gateway::new(openai, sessions, shutdown.child_token()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutting down.");
        signal.cancel();
    });

    info!("Assistant is running. Open the web page or call /start to begin.");
    face::serve(gateway.clone(), &config.host, config.port, shutdown).await?;

    gateway.drain().await;
    info!("All sessions finished.");
    Ok(())
}
