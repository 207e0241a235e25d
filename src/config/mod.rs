//! Configuration management for the tableside gateway
//!
//! Precedence: environment variables, then the TOML file, then built-in defaults.

pub mod file;

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::Result;

/// Default OpenAI-compatible endpoint (Groq)
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Tableside gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, etc)
    pub data_dir: PathBuf,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Audio segmentation configuration
    pub audio: AudioConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Speech provider configuration
    pub speech: SpeechConfig,

    /// Ordering behavior
    pub ordering: OrderingConfig,

    /// Kitchen printer configuration
    pub printer: PrinterConfig,

    /// `SQLite` database file
    pub database_path: PathBuf,

    /// API keys
    pub api_keys: ApiKeys,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// API key for `/api/*` endpoints (from `TABLESIDE_API_KEY` env)
    pub api_key: Option<String>,

    /// Path to static files directory (ordering UI)
    pub static_dir: Option<PathBuf>,
}

/// Audio framing and segmentation
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Input sample rate in Hz
    pub sample_rate: u32,

    /// Samples per inbound PCM16 frame
    pub frame_samples: usize,

    /// Speech probability threshold (exclusive)
    pub vad_threshold: f32,

    /// Audio retained before speech onset
    pub pre_roll_ms: u32,

    /// Trailing silence that ends an utterance
    pub min_silence_ms: u32,

    /// Language tag until the client overrides it
    pub default_language: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 512,
            vad_threshold: 0.5,
            pre_roll_ms: 300,
            min_silence_ms: 500,
            default_language: "ta-IN".to_string(),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            max_iterations: 5,
            timeout_secs: 30,
        }
    }
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProviderKind {
    Sarvam,
    Whisper,
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProviderKind {
    Sarvam,
    OpenAi,
}

/// Speech provider configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub stt_provider: SttProviderKind,
    pub stt_model: String,
    pub tts_provider: TtsProviderKind,
    pub tts_model: String,
    pub tts_voice: String,
    pub timeout_secs: u64,
    pub stream_chunk_bytes: usize,
    /// Synthesize each reply sentence as its own unit
    pub sentence_units: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_provider: SttProviderKind::Sarvam,
            stt_model: "saarika:v2".to_string(),
            tts_provider: TtsProviderKind::Sarvam,
            tts_model: "bulbul:v2".to_string(),
            tts_voice: "anushka".to_string(),
            timeout_secs: 20,
            stream_chunk_bytes: 8192,
            sentence_units: false,
        }
    }
}

/// Ordering behavior
#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Table used when the model omits `table_number`
    pub default_table: String,

    /// Menu items retrieved into the prompt per turn
    pub menu_top_k: usize,

    /// Sentences kept from a model reply
    pub max_reply_sentences: usize,

    /// Optional prompt template path
    pub prompt_path: Option<PathBuf>,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            default_table: "1".to_string(),
            menu_top_k: 50,
            max_reply_sentences: 5,
            prompt_path: None,
        }
    }
}

/// Kitchen printer configuration
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub enabled: bool,
    pub device: PathBuf,
    pub width: usize,
    /// Upper bound on opening and writing the device
    pub timeout_secs: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device: PathBuf::from("/dev/usb/lp0"),
            width: 32,
            timeout_secs: 5,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Chat completions key (`GROQ_API_KEY` or `TABLESIDE_LLM_API_KEY`)
    pub llm: Option<SecretString>,

    /// `Sarvam` key for STT/TTS
    pub sarvam: Option<SecretString>,

    /// `OpenAI` key (Whisper STT / OpenAI TTS)
    pub openai: Option<SecretString>,
}

/// Return the default data directory, creating it if needed
///
/// Uses `~/.local/share/tableside` on Linux
pub fn data_dir() -> PathBuf {
    let data_dir = directories::ProjectDirs::from("dev", "tableside", "tableside")
        .map_or_else(|| PathBuf::from(".tableside"), |d| d.data_dir().to_path_buf());

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::warn!(
            path = %data_dir.display(),
            error = %e,
            "failed to create data directory"
        );
    }

    data_dir
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env_string(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value.filter(|v| !v.is_empty()).map(SecretString::from)
}

impl SttProviderKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sarvam" => Some(Self::Sarvam),
            "whisper" | "openai" => Some(Self::Whisper),
            _ => None,
        }
    }
}

impl TtsProviderKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sarvam" => Some(Self::Sarvam),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_key: None,
            static_dir: None,
        }
    }
}

impl Default for Config {
    /// Built-in defaults with no environment, file or filesystem access
    fn default() -> Self {
        let data_dir = PathBuf::from(".tableside");
        Self {
            database_path: data_dir.join("tableside.db"),
            data_dir,
            server: ServerConfig::default(),
            audio: AudioConfig::default(),
            llm: LlmConfig::default(),
            speech: SpeechConfig::default(),
            ordering: OrderingConfig::default(),
            printer: PrinterConfig::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a provider name in the configuration is unknown
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        let data_dir = data_dir();

        let server = ServerConfig {
            port: env_parse("TABLESIDE_PORT")
                .or_else(|| env_parse("PORT"))
                .or(fc.server.port)
                .unwrap_or(ServerConfig::default().port),
            api_key: env_string("TABLESIDE_API_KEY").or(fc.server.api_key),
            static_dir: env_string("TABLESIDE_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let audio_defaults = AudioConfig::default();
        let audio = AudioConfig {
            sample_rate: fc.audio.sample_rate.unwrap_or(audio_defaults.sample_rate),
            frame_samples: fc.audio.frame_samples.unwrap_or(audio_defaults.frame_samples),
            vad_threshold: env_parse("TABLESIDE_VAD_THRESHOLD")
                .or(fc.audio.vad_threshold)
                .unwrap_or(audio_defaults.vad_threshold),
            pre_roll_ms: fc.audio.pre_roll_ms.unwrap_or(audio_defaults.pre_roll_ms),
            min_silence_ms: fc.audio.min_silence_ms.unwrap_or(audio_defaults.min_silence_ms),
            default_language: env_string("TABLESIDE_LANGUAGE")
                .or(fc.audio.default_language)
                .unwrap_or(audio_defaults.default_language),
        };

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            base_url: env_string("TABLESIDE_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(llm_defaults.base_url),
            model: env_string("TABLESIDE_LLM_MODEL")
                .or_else(|| env_string("GROQ_MODEL"))
                .or(fc.llm.model)
                .unwrap_or(llm_defaults.model),
            temperature: fc.llm.temperature.unwrap_or(llm_defaults.temperature),
            max_tokens: fc.llm.max_tokens.unwrap_or(llm_defaults.max_tokens),
            max_iterations: fc.llm.max_iterations.unwrap_or(llm_defaults.max_iterations),
            timeout_secs: fc.llm.timeout_secs.unwrap_or(llm_defaults.timeout_secs),
        };

        let speech_defaults = SpeechConfig::default();
        let stt_provider = match env_string("TABLESIDE_STT_PROVIDER").or(fc.speech.stt_provider) {
            Some(name) => SttProviderKind::parse(&name).ok_or_else(|| {
                crate::Error::Config(format!("unknown STT provider: {name}"))
            })?,
            None => speech_defaults.stt_provider,
        };
        let tts_provider = match env_string("TABLESIDE_TTS_PROVIDER").or(fc.speech.tts_provider) {
            Some(name) => TtsProviderKind::parse(&name).ok_or_else(|| {
                crate::Error::Config(format!("unknown TTS provider: {name}"))
            })?,
            None => speech_defaults.tts_provider,
        };
        let speech = SpeechConfig {
            stt_provider,
            stt_model: fc.speech.stt_model.unwrap_or_else(|| match stt_provider {
                SttProviderKind::Sarvam => speech_defaults.stt_model.clone(),
                SttProviderKind::Whisper => "whisper-1".to_string(),
            }),
            tts_provider,
            tts_model: fc.speech.tts_model.unwrap_or_else(|| match tts_provider {
                TtsProviderKind::Sarvam => speech_defaults.tts_model.clone(),
                TtsProviderKind::OpenAi => "tts-1".to_string(),
            }),
            tts_voice: fc.speech.tts_voice.unwrap_or_else(|| match tts_provider {
                TtsProviderKind::Sarvam => speech_defaults.tts_voice.clone(),
                TtsProviderKind::OpenAi => "alloy".to_string(),
            }),
            timeout_secs: fc.speech.timeout_secs.unwrap_or(speech_defaults.timeout_secs),
            stream_chunk_bytes: fc
                .speech
                .stream_chunk_bytes
                .unwrap_or(speech_defaults.stream_chunk_bytes),
            sentence_units: fc
                .speech
                .sentence_units
                .unwrap_or(speech_defaults.sentence_units),
        };

        let ordering_defaults = OrderingConfig::default();
        let ordering = OrderingConfig {
            default_table: env_string("TABLESIDE_TABLE")
                .or(fc.ordering.default_table)
                .unwrap_or(ordering_defaults.default_table),
            menu_top_k: fc.ordering.menu_top_k.unwrap_or(ordering_defaults.menu_top_k),
            max_reply_sentences: fc
                .ordering
                .max_reply_sentences
                .unwrap_or(ordering_defaults.max_reply_sentences),
            prompt_path: env_string("TABLESIDE_PROMPT_PATH")
                .or(fc.ordering.prompt_path)
                .map(PathBuf::from),
        };

        let printer_defaults = PrinterConfig::default();
        let printer = PrinterConfig {
            enabled: env_flag("TABLESIDE_PRINTER_ENABLED")
                .or(fc.printer.enabled)
                .unwrap_or(printer_defaults.enabled),
            device: env_string("TABLESIDE_PRINTER_DEVICE")
                .or(fc.printer.device)
                .map_or(printer_defaults.device, PathBuf::from),
            width: fc.printer.width.unwrap_or(printer_defaults.width),
            timeout_secs: env_parse("TABLESIDE_PRINTER_TIMEOUT_SECS")
                .or(fc.printer.timeout_secs)
                .unwrap_or(printer_defaults.timeout_secs),
        };

        let database_path = env_string("TABLESIDE_DB_PATH")
            .or(fc.database.path)
            .map_or_else(|| data_dir.join("tableside.db"), PathBuf::from);

        let api_keys = ApiKeys {
            llm: secret(
                env_string("TABLESIDE_LLM_API_KEY")
                    .or_else(|| env_string("GROQ_API_KEY"))
                    .or(fc.api_keys.llm),
            ),
            sarvam: secret(env_string("SARVAM_API_KEY").or(fc.api_keys.sarvam)),
            openai: secret(env_string("OPENAI_API_KEY").or(fc.api_keys.openai)),
        };

        Ok(Self {
            data_dir,
            server,
            audio,
            llm,
            speech,
            ordering,
            printer,
            database_path,
            api_keys,
        })
    }
}
