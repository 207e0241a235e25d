//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{SpeechConfig, SttProviderKind};
use crate::{Error, Result};

const SARVAM_STT_URL: &str = "https://api.sarvam.ai/speech-to-text";
const WHISPER_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Turns one utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe mono PCM16 samples spoken in `language`
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn transcribe(&self, samples: &[i16], language: &str) -> Result<String>;
}

/// Response from the Sarvam transcription API
#[derive(serde::Deserialize)]
struct SarvamResponse {
    #[serde(default)]
    transcript: String,
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Sarvam,
    Whisper,
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    sample_rate: u32,
    provider: SttProvider,
    url: String,
}

impl SpeechToText {
    /// Create a new STT instance using Sarvam
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new_sarvam(api_key: SecretString, model: String, sample_rate: u32, timeout: Duration) -> Result<Self> {
        Self::build(SttProvider::Sarvam, api_key, model, sample_rate, timeout)
    }

    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new_whisper(api_key: SecretString, model: String, sample_rate: u32, timeout: Duration) -> Result<Self> {
        Self::build(SttProvider::Whisper, api_key, model, sample_rate, timeout)
    }

    /// Build the provider selected in configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is not configured
    pub fn from_config(
        speech: &SpeechConfig,
        sarvam_key: Option<&SecretString>,
        openai_key: Option<&SecretString>,
        sample_rate: u32,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(speech.timeout_secs);
        match speech.stt_provider {
            SttProviderKind::Sarvam => {
                let key = sarvam_key.cloned().ok_or_else(|| {
                    Error::Config("SARVAM_API_KEY required for Sarvam STT".to_string())
                })?;
                Self::new_sarvam(key, speech.stt_model.clone(), sample_rate, timeout)
            }
            SttProviderKind::Whisper => {
                let key = openai_key.cloned().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY required for Whisper".to_string())
                })?;
                Self::new_whisper(key, speech.stt_model.clone(), sample_rate, timeout)
            }
        }
    }

    fn build(
        provider: SttProvider,
        api_key: SecretString,
        model: String,
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for STT")));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url = match provider {
            SttProvider::Sarvam => SARVAM_STT_URL,
            SttProvider::Whisper => WHISPER_STT_URL,
        };

        Ok(Self {
            client,
            api_key,
            model,
            sample_rate,
            provider,
            url: url.to_string(),
        })
    }

    /// Point the client at a different endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Transcribe using Sarvam
    async fn transcribe_sarvam(&self, wav: Vec<u8>, language: &str) -> Result<String> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language_code", language.to_string());

        let response = self
            .client
            .post(&self.url)
            .header("api-subscription-key", self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Sarvam STT error {status}: {body}")));
        }

        let result: SarvamResponse = response.json().await?;
        Ok(result.transcript)
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, wav: Vec<u8>, language: &str) -> Result<String> {
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        // Whisper takes ISO-639-1, so "ta-IN" becomes "ta"
        if let Some(code) = language.split('-').next().filter(|c| !c.is_empty()) {
            form = form.text("language", code.to_string());
        }

        let response = self
            .client
            .post(&self.url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, samples: &[i16], language: &str) -> Result<String> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        let wav = super::pcm16_to_wav(samples, self.sample_rate)?;
        tracing::debug!(
            provider = ?self.provider,
            audio_bytes = wav.len(),
            language,
            "starting transcription"
        );

        let transcript = match self.provider {
            SttProvider::Sarvam => self.transcribe_sarvam(wav, language).await,
            SttProvider::Whisper => self.transcribe_whisper(wav, language).await,
        }
        .inspect_err(|e| tracing::error!(provider = ?self.provider, error = %e, "transcription failed"))?;

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript.trim().to_string())
    }
}
