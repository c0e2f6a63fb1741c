use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::StretchMode;
use crate::stage::strategy::{
    default_acquisition_strategies, default_extraction_strategies, default_muxing_strategies, StrategyConfig,
};
use crate::stage::{StageKind, StrategyList};
use crate::translation::prompt::DEFAULT_SYSTEM_PROMPT;

/// Application configuration module
///
/// This module handles loading, validating and saving the run configuration
/// stored in `conf.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language code (ISO 639-1 or 639-2)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Spoken language hint for the transcriber; detected when absent
    #[serde(default)]
    pub source_language: Option<String>,

    /// Where finished videos are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parent of the per-run working directories
    #[serde(default = "std::env::temp_dir")]
    pub temp_dir: PathBuf,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Source download
    #[serde(default = "StageConfig::acquisition")]
    pub acquisition: StageConfig,

    /// Audio track extraction
    #[serde(default = "StageConfig::extraction")]
    pub extraction: StageConfig,

    /// Final video and audio muxing
    #[serde(default = "StageConfig::muxing")]
    pub muxing: StageConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub resynthesis: ResynthesisConfig,
}

/// External tool plus its ranked strategies
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StageConfig {
    // @field: Executable to run
    pub program: String,

    // @field: Strategies, best first
    pub strategies: Vec<StrategyConfig>,

    // @field: Pause between attempts (acquisition only)
    #[serde(default)]
    pub retry_delay_ms: u64,

    // @field: Artifacts must be larger than this
    #[serde(default = "default_min_artifact_bytes")]
    pub min_artifact_bytes: u64,
}

impl StageConfig {
    pub fn acquisition() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            strategies: default_acquisition_strategies(),
            retry_delay_ms: 1000,
            min_artifact_bytes: default_min_artifact_bytes(),
        }
    }

    pub fn extraction() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            strategies: default_extraction_strategies(),
            retry_delay_ms: 0,
            min_artifact_bytes: default_min_artifact_bytes(),
        }
    }

    pub fn muxing() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            strategies: default_muxing_strategies(),
            retry_delay_ms: 0,
            min_artifact_bytes: default_min_artifact_bytes(),
        }
    }

    pub fn strategy_list(&self, stage: StageKind) -> Result<StrategyList> {
        StrategyList::from_config(stage, &self.strategies)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Speech-to-text settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranscriptionConfig {
    // @field: whisper executable
    #[serde(default = "default_whisper_program")]
    pub program: String,

    // @field: whisper model name
    #[serde(default = "default_whisper_model")]
    pub model: String,

    // @field: Limit for the whole transcription
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Appended to the whisper command line
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            program: default_whisper_program(),
            model: default_whisper_model(),
            timeout_secs: default_transcription_timeout_secs(),
            extra_args: Vec::new(),
        }
    }
}

impl TranscriptionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
        }
    }

    pub fn default_endpoint(&self) -> &str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &str {
        match self {
            Self::Ollama => "llama3.2:3b",
            Self::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Machine translation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    // @field: Backend
    #[serde(default)]
    pub provider: TranslationProvider,

    // @field: Service URL, provider default when empty
    #[serde(default)]
    pub endpoint: String,

    // @field: Model name, provider default when empty
    #[serde(default)]
    pub model: String,

    // @field: API key (Anthropic)
    #[serde(default)]
    pub api_key: String,

    // @field: Requests in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Per-request timeout
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Retries after the first attempt (Ollama)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    // @field: Base of the exponential backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    // @field: Requests per minute (Ollama retries)
    #[serde(default)]
    pub rate_limit: Option<u32>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Template with {source_language} and {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    // @field: Reuse translations of repeated phrases
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            endpoint: String::new(),
            model: String::new(),
            api_key: String::new(),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_translation_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rate_limit: None,
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            cache_enabled: true,
        }
    }
}

impl TranslationConfig {
    pub fn get_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint().to_string()
        } else {
            self.endpoint.clone()
        }
    }

    pub fn get_model(&self) -> String {
        if self.model.is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.clone()
        }
    }

    /// API key from the config, or from `ANTHROPIC_API_KEY`
    pub fn get_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        match self.provider {
            TranslationProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            TranslationProvider::Ollama => String::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text-to-speech settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SynthesisConfig {
    // @field: TTS executable
    #[serde(default = "default_tts_program")]
    pub program: String,

    // @field: Template with {text}, {lang} and {output}
    #[serde(default = "default_tts_args")]
    pub args: Vec<String>,

    // @field: Per-clip limit
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Clips synthesized in parallel
    #[serde(default = "default_concurrent_jobs")]
    pub concurrent_jobs: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            program: default_tts_program(),
            args: default_tts_args(),
            timeout_secs: default_tts_timeout_secs(),
            concurrent_jobs: default_concurrent_jobs(),
        }
    }
}

/// Timeline assembly settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResynthesisConfig {
    // @field: Sample rate of the assembled track
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    // @field: Longest speed-up before clips are cut instead
    #[serde(default = "default_max_speed_factor")]
    pub max_speed_factor: f64,

    // @field: Fade length at both clip ends
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,

    // @field: Clips this short or shorter are not faded
    #[serde(default = "default_fade_min_clip_ms")]
    pub fade_min_clip_ms: u64,

    // @field: Pitch handling when speeding clips up
    #[serde(default)]
    pub stretch_mode: StretchMode,
}

impl Default for ResynthesisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            max_speed_factor: default_max_speed_factor(),
            fade_ms: default_fade_ms(),
            fade_min_clip_ms: default_fade_min_clip_ms(),
            stretch_mode: StretchMode::default(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_min_artifact_bytes() -> u64 {
    1000
}

fn default_whisper_program() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    1800
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_translation_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_tts_program() -> String {
    "espeak-ng".to_string()
}

fn default_tts_args() -> Vec<String> {
    ["-v", "{lang}", "-w", "{output}", "{text}"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_tts_timeout_secs() -> u64 {
    60
}

fn default_concurrent_jobs() -> usize {
    2
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_max_speed_factor() -> f64 {
    3.0
}

fn default_fade_ms() -> u64 {
    50
}

fn default_fade_min_clip_ms() -> u64 {
    100
}

impl Config {
    /// Load the configuration from `path`, writing and returning the default
    /// configuration when the file does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;
        if let Some(source) = &self.source_language {
            crate::language_utils::validate_language_code(source).context("Invalid source language")?;
        }

        for (stage, section) in [
            (StageKind::Acquisition, &self.acquisition),
            (StageKind::Extraction, &self.extraction),
            (StageKind::Muxing, &self.muxing),
        ] {
            if section.program.trim().is_empty() {
                return Err(anyhow!("No program configured for {}", stage));
            }
            section.strategy_list(stage)?;
            if let Some(strategy) = section.strategies.iter().find(|s| s.timeout_secs == 0) {
                return Err(anyhow!("Strategy '{}' of {} has a zero timeout", strategy.name, stage));
            }
        }

        if self.transcription.timeout_secs == 0 {
            return Err(anyhow!("Transcription timeout must be positive"));
        }
        if self.translation.timeout_secs == 0 || self.synthesis.timeout_secs == 0 {
            return Err(anyhow!("Translation and synthesis timeouts must be positive"));
        }
        if self.translation.concurrent_requests == 0 {
            return Err(anyhow!("translation.concurrent_requests must be at least 1"));
        }
        if self.synthesis.args.is_empty() || !self.synthesis.args.iter().any(|a| a.contains("{output}")) {
            return Err(anyhow!("synthesis.args must contain an {{output}} placeholder"));
        }

        if self.resynthesis.sample_rate == 0 {
            return Err(anyhow!("resynthesis.sample_rate must be positive"));
        }
        if !(self.resynthesis.max_speed_factor.is_finite() && self.resynthesis.max_speed_factor > 0.0) {
            return Err(anyhow!("resynthesis.max_speed_factor must be a positive number"));
        }

        if self.translation.provider == TranslationProvider::Anthropic && self.translation.get_api_key().is_empty() {
            return Err(anyhow!("Translation API key is required for Anthropic provider"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            source_language: None,
            output_dir: default_output_dir(),
            temp_dir: std::env::temp_dir(),
            log_level: LogLevel::default(),
            acquisition: StageConfig::acquisition(),
            extraction: StageConfig::extraction(),
            muxing: StageConfig::muxing(),
            transcription: TranscriptionConfig::default(),
            translation: TranslationConfig::default(),
            synthesis: SynthesisConfig::default(),
            resynthesis: ResynthesisConfig::default(),
        }
    }
}
