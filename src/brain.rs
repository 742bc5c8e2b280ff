use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::CollaboratorError;
use crate::inspector::HttpInspector;
use crate::voice::{SpeechToText, TextToSpeech};

const ASSISTANT_PROMPT: &str = "You are a helpful assistant.";
const SPOKEN_SUMMARY_PROMPT: &str =
    "Summarize the following text for a visually impaired user in a formal tone.";
const PAGE_SUMMARY_PROMPT: &str = "Please provide a formal summary that describes the overall \
    purpose and functionality of the website. Do not list interactive elements such as buttons \
    or links. Here is a snippet of the website content: ";

/// Longest text the speech endpoint accepts.
pub const MAX_SPEECH_CHARS: usize = 4096;
/// How much page text the summarizer sees.
pub const PAGE_SNIPPET_CHARS: usize = 1000;

pub const ANSWER_FALLBACK: &str = "Sorry, I encountered an error processing your request.";

/// Answers a generic spoken question.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, CollaboratorError>;
}

/// Describes what a webpage is for.
#[async_trait]
pub trait PageSummarizer: Send + Sync {
    async fn summarize(&self, address: &str) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    /// Upper bound on each API request, connect to last byte.
    pub request_timeout: Duration,
}

/// OpenAI-backed collaborators: chat, transcription and speech.
pub struct OpenAiClient {
    client: Client,
    settings: OpenAiSettings,
    pages: HttpInspector,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            client,
            settings,
            pages: HttpInspector::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("Unknown API error")
            .to_string();
        error!("OpenAI API error ({}): {}", status, message);
        Err(CollaboratorError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// One-shot chat completion with a system and a user message.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&json!({
                "model": self.settings.chat_model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await?;

        let json_resp: Value = Self::check(response).await?.json().await?;
        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse(format!("No content in response: {}", json_resp))
            })?;
        debug!("LLM says: {}", content);
        Ok(content.to_string())
    }

    /// Shorten text that is too long to be spoken. Falls back to truncation.
    async fn spoken_text(&self, text: &str) -> String {
        if text.chars().count() <= MAX_SPEECH_CHARS {
            return text.to_string();
        }
        warn!("Text too long. Summarizing before text-to-speech.");
        match self.chat(SPOKEN_SUMMARY_PROMPT, text).await {
            Ok(summary) => summary.chars().take(MAX_SPEECH_CHARS).collect(),
            Err(e) => {
                error!("Error summarizing text: {}", e);
                text.chars().take(MAX_SPEECH_CHARS).collect()
            }
        }
    }
}

#[async_trait]
impl QuestionAnswerer for OpenAiClient {
    async fn answer(&self, question: &str) -> Result<String, CollaboratorError> {
        self.chat(ASSISTANT_PROMPT, question).await
    }
}

#[async_trait]
impl PageSummarizer for OpenAiClient {
    async fn summarize(&self, address: &str) -> Result<String, CollaboratorError> {
        let snippet = self.pages.page_text(address, PAGE_SNIPPET_CHARS).await?;
        let summary = self
            .chat(ASSISTANT_PROMPT, &format!("{}{}", PAGE_SUMMARY_PROMPT, snippet))
            .await?;
        info!("Generated summary for {}", address);
        Ok(summary)
    }
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, CollaboratorError> {
        let file = Part::bytes(audio)
            .file_name("reply.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.settings.transcription_model.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        let json_resp: Value = Self::check(response).await?.json().await?;
        json_resp["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CollaboratorError::InvalidResponse(format!("No text in transcription: {}", json_resp)))
    }
}

#[async_trait]
impl TextToSpeech for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, CollaboratorError> {
        let input = self.spoken_text(text).await;
        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.settings.api_key)
            .json(&json!({
                "model": self.settings.speech_model,
                "voice": self.settings.voice,
                "input": input,
            }))
            .send()
            .await?;

        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
