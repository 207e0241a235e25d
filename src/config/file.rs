//! TOML configuration file loading
//!
//! Supports `~/.config/tableside/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TablesideConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Audio segmentation configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech provider configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Ordering behavior
    #[serde(default)]
    pub ordering: OrderingFileConfig,

    /// Kitchen printer
    #[serde(default)]
    pub printer: PrinterFileConfig,

    /// Database location
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Bearer key for `/api/*` endpoints
    pub api_key: Option<String>,

    /// Static files directory (ordering UI)
    pub static_dir: Option<String>,
}

/// Audio segmentation configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    pub frame_samples: Option<usize>,
    /// Speech probability above which a frame counts as speech
    pub vad_threshold: Option<f32>,
    pub pre_roll_ms: Option<u32>,
    pub min_silence_ms: Option<u32>,
    /// BCP-47 tag used until the client sends `config`
    pub default_language: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Model round-trips allowed per utterance
    pub max_iterations: Option<u32>,

    pub timeout_secs: Option<u64>,
}

/// Speech provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// "sarvam" or "whisper"
    pub stt_provider: Option<String>,
    pub stt_model: Option<String>,

    /// "sarvam" or "openai"
    pub tts_provider: Option<String>,
    pub tts_model: Option<String>,

    /// Speaker / voice identifier
    pub tts_voice: Option<String>,

    pub timeout_secs: Option<u64>,

    /// Chunk size used when a provider only returns whole buffers
    pub stream_chunk_bytes: Option<usize>,

    /// Split replies into one synthesis unit per sentence
    pub sentence_units: Option<bool>,
}

/// Ordering behavior
#[derive(Debug, Default, Deserialize)]
pub struct OrderingFileConfig {
    pub default_table: Option<String>,
    pub menu_top_k: Option<usize>,
    pub max_reply_sentences: Option<usize>,

    /// Path to a system prompt template containing `{menu}`
    pub prompt_path: Option<String>,
}

/// Kitchen printer configuration
#[derive(Debug, Default, Deserialize)]
pub struct PrinterFileConfig {
    pub enabled: Option<bool>,

    /// Raw device path (e.g. `/dev/usb/lp0`)
    pub device: Option<String>,

    /// Ticket width in characters
    pub width: Option<usize>,

    /// Seconds before a blocked device counts as a failed print
    pub timeout_secs: Option<u64>,
}

/// Database configuration
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub llm: Option<String>,
    pub sarvam: Option<String>,
    pub openai: Option<String>,
}

/// Load the TOML config file from an explicit path or the standard path
///
/// Returns `TablesideConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(explicit: Option<&Path>) -> TablesideConfigFile {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_file_path) else {
        return TablesideConfigFile::default();
    };

    if !path.exists() {
        return TablesideConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TablesideConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TablesideConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<TablesideConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/tableside/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tableside").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config = parse_config(
            r#"
            [audio]
            vad_threshold = 0.8

            [printer]
            enabled = true
            device = "/dev/usb/lp0"
            timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.vad_threshold, Some(0.8));
        assert_eq!(config.audio.frame_samples, None);
        assert_eq!(config.printer.device.as_deref(), Some("/dev/usb/lp0"));
        assert_eq!(config.printer.timeout_secs, Some(3));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn missing_explicit_file_yields_defaults() {
        let config = load_config_file(Some(Path::new("/nonexistent/tableside.toml")));
        assert!(config.server.port.is_none());
    }
}
