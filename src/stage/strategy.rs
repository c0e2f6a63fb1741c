use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::StageKind;

/// One concrete way of invoking an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStrategy {
    /// Short label used in logs and failure reports
    pub name: String,

    /// Argument template; `{placeholder}` tokens are filled per attempt
    pub args: Vec<String>,

    /// Limit for a single attempt
    pub timeout: Duration,
}

impl StageStrategy {
    pub fn new(name: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            args,
            timeout,
        }
    }

    /// Arguments with every `{key}` replaced by its value
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{}}}", key), value)
                })
            })
            .collect()
    }
}

/// Strategy description as stored in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    /// Label for logs
    pub name: String,

    /// Argument template
    pub args: Vec<String>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
}

impl StrategyConfig {
    fn new(name: &str, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
        }
    }
}

impl From<&StrategyConfig> for StageStrategy {
    fn from(config: &StrategyConfig) -> Self {
        StageStrategy::new(
            config.name.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

/// Ordered, non-empty list of strategies for one stage.
///
/// Order encodes preference: best quality first, most compatible last.
#[derive(Debug, Clone)]
pub struct StrategyList {
    stage: StageKind,
    strategies: Vec<StageStrategy>,
}

impl StrategyList {
    pub fn new(stage: StageKind, strategies: Vec<StageStrategy>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(anyhow!("No strategies configured for {}", stage));
        }
        Ok(Self { stage, strategies })
    }

    pub fn from_config(stage: StageKind, configs: &[StrategyConfig]) -> Result<Self> {
        Self::new(stage, configs.iter().map(StageStrategy::from).collect())
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageStrategy> {
        self.strategies.iter()
    }
}

/// yt-dlp format selections, from best quality to most permissive.
///
/// Placeholders: `{source}`, `{output_template}`.
pub fn default_acquisition_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::new(
            "best mp4 up to 720p",
            &[
                "-f", "best[height<=720][ext=mp4]/best[ext=mp4]/best",
                "-o", "{output_template}",
                "--quiet", "--no-warnings", "--no-playlist",
                "--print", "after_move:filepath",
                "{source}",
            ],
            600,
        ),
        StrategyConfig::new(
            "smallest mp4, chunked",
            &[
                "-f", "worst[ext=mp4]/18/worst",
                "-o", "{output_template}",
                "--http-chunk-size", "10485760",
                "--quiet", "--no-warnings", "--no-playlist",
                "--print", "after_move:filepath",
                "{source}",
            ],
            600,
        ),
        StrategyConfig::new(
            "any format",
            &[
                "-f", "best/worst",
                "-o", "{output_template}",
                "--quiet", "--no-warnings", "--no-playlist",
                "--print", "after_move:filepath",
                "{source}",
            ],
            600,
        ),
    ]
}

/// ffmpeg commands producing a WAV track. Placeholders: `{input}`, `{output}`.
pub fn default_extraction_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::new(
            "pcm_s16le 16kHz mono",
            &["-i", "{input}", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "{output}", "-y"],
            120,
        ),
        StrategyConfig::new(
            "wav 16kHz mono",
            &["-i", "{input}", "-vn", "-ar", "16000", "-ac", "1", "-f", "wav", "{output}", "-y"],
            120,
        ),
        StrategyConfig::new("basic", &["-i", "{input}", "-vn", "{output}", "-y"], 120),
    ]
}

/// ffmpeg commands replacing the audio of `{video}` with `{audio}`
pub fn default_muxing_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::new(
            "copy video, aac audio",
            &[
                "-i", "{video}", "-i", "{audio}",
                "-c:v", "copy", "-c:a", "aac", "-b:a", "128k",
                "-map", "0:v:0", "-map", "1:a:0",
                "{output}", "-y",
            ],
            300,
        ),
        StrategyConfig::new(
            "re-encode video",
            &[
                "-i", "{video}", "-i", "{audio}",
                "-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac", "-b:a", "128k",
                "-map", "0:v:0", "-map", "1:a:0",
                "{output}", "-y",
            ],
            900,
        ),
    ]
}
