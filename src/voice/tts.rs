//! Text-to-speech (TTS) processing

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{SpeechConfig, TtsProviderKind};
use crate::{Error, Result};

const SARVAM_TTS_URL: &str = "https://api.sarvam.ai/text-to-speech";
const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Ordered audio chunks for one piece of text
pub type AudioChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Converts text to audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize the whole utterance into one buffer
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;

    /// Synthesize into an ordered stream of chunks
    ///
    /// Defaults to a single chunk holding the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis cannot start
    async fn synthesize_stream(&self, text: &str, language: &str) -> Result<AudioChunkStream> {
        let audio = self.synthesize(text, language).await?;
        let chunks: Vec<Result<Vec<u8>>> = if audio.is_empty() {
            Vec::new()
        } else {
            vec![Ok(audio)]
        };
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    Sarvam,
    OpenAI,
}

/// Response from the Sarvam synthesis API
#[derive(serde::Deserialize)]
struct SarvamResponse {
    #[serde(default)]
    audios: Vec<String>,
}

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    model: String,
    chunk_bytes: usize,
    provider: TtsProvider,
    url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using Sarvam
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new_sarvam(api_key: SecretString, speaker: String, model: String, timeout: Duration) -> Result<Self> {
        Self::build(TtsProvider::Sarvam, api_key, speaker, model, timeout)
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new_openai(api_key: SecretString, voice: String, model: String, timeout: Duration) -> Result<Self> {
        Self::build(TtsProvider::OpenAI, api_key, voice, model, timeout)
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
    ) -> Result<Self> {
        let timeout = Duration::from_secs(speech.timeout_secs);
        let tts = match speech.tts_provider {
            TtsProviderKind::Sarvam => {
                let key = sarvam_key.cloned().ok_or_else(|| {
                    Error::Config("SARVAM_API_KEY required for Sarvam TTS".to_string())
                })?;
                Self::new_sarvam(key, speech.tts_voice.clone(), speech.tts_model.clone(), timeout)?
            }
            TtsProviderKind::OpenAi => {
                let key = openai_key.cloned().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY required for OpenAI TTS".to_string())
                })?;
                Self::new_openai(key, speech.tts_voice.clone(), speech.tts_model.clone(), timeout)?
            }
        };
        Ok(tts.with_chunk_bytes(speech.stream_chunk_bytes))
    }

    fn build(
        provider: TtsProvider,
        api_key: SecretString,
        voice: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for TTS")));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url = match provider {
            TtsProvider::Sarvam => SARVAM_TTS_URL,
            TtsProvider::OpenAI => OPENAI_TTS_URL,
        };

        Ok(Self {
            client,
            api_key,
            voice,
            model,
            chunk_bytes: 8192,
            provider,
            url: url.to_string(),
        })
    }

    /// Chunk size used when the provider returns a whole buffer
    #[must_use]
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Point the client at a different endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Synthesize using Sarvam (base64 WAV in `audios`)
    async fn synthesize_sarvam(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SarvamRequest<'a> {
            text: &'a str,
            target_language_code: &'a str,
            speaker: &'a str,
            model: &'a str,
            enable_preprocessing: bool,
        }

        let request = SarvamRequest {
            text,
            target_language_code: language,
            speaker: &self.voice,
            model: &self.model,
            enable_preprocessing: true,
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-subscription-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Sarvam TTS error {status}: {body}")));
        }

        let result: SarvamResponse = response.json().await?;
        let Some(encoded) = result.audios.first() else {
            tracing::warn!("no audio in Sarvam response");
            return Ok(Vec::new());
        };

        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Tts(format!("invalid base64 audio: {e}")))
    }

    async fn openai_request(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };

        let response = self
            .client
            .post(&self.url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(provider = ?self.provider, chars = text.chars().count(), "synthesizing");
        match self.provider {
            TtsProvider::Sarvam => self.synthesize_sarvam(text, language).await,
            TtsProvider::OpenAI => {
                let audio = self.openai_request(text).await?.bytes().await?;
                Ok(audio.to_vec())
            }
        }
    }

    async fn synthesize_stream(&self, text: &str, language: &str) -> Result<AudioChunkStream> {
        if text.trim().is_empty() {
            return Ok(Box::pin(futures::stream::empty()));
        }

        match self.provider {
            TtsProvider::Sarvam => {
                let audio = self.synthesize_sarvam(text, language).await?;
                Ok(chunked(audio, self.chunk_bytes))
            }
            TtsProvider::OpenAI => {
                let response = self.openai_request(text).await?;
                let stream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|b| b.to_vec()).map_err(Error::from));
                Ok(Box::pin(stream))
            }
        }
    }
}

/// Split a whole buffer into an ordered chunk stream
#[must_use]
pub fn chunked(audio: Vec<u8>, chunk_bytes: usize) -> AudioChunkStream {
    let chunks: Vec<Result<Vec<u8>>> = audio
        .chunks(chunk_bytes.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunked_preserves_order_and_bytes() {
        let audio: Vec<u8> = (0..=250u8).collect();
        let chunks: Vec<Vec<u8>> = chunked(audio.clone(), 100)
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), audio);
    }

    #[tokio::test]
    async fn chunked_empty_buffer_yields_nothing() {
        let mut stream = chunked(Vec::new(), 100);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn from_config_requires_provider_key() {
        let speech = SpeechConfig::default();
        assert!(matches!(
            TextToSpeech::from_config(&speech, None, None),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn blank_text_streams_nothing() {
        let tts = TextToSpeech::new_sarvam(
            SecretString::from("key".to_string()),
            "anushka".to_string(),
            "bulbul:v2".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_url("http://127.0.0.1:9/unused");

        let mut stream = tts.synthesize_stream("  ", "ta-IN").await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
