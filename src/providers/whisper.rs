use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::ProviderError;
use crate::pipeline::types::{Transcript, TranscriptSegment};
use crate::process::run_program;

use super::{path_arg, Transcriber};

/// JSON written by `whisper --output_format json`
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Speech-to-text through the `whisper` command-line tool
#[derive(Debug, Clone)]
pub struct WhisperCliTranscriber {
    program: String,
    model: String,
    extra_args: Vec<String>,
}

impl WhisperCliTranscriber {
    pub fn new(program: impl Into<String>, model: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
            extra_args,
        }
    }

    fn build_args(&self, audio: &Path, output_dir: &Path, language_hint: Option<&str>) -> Vec<String> {
        let mut args = vec![
            path_arg(audio),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            path_arg(output_dir),
            "--word_timestamps".to_string(),
            "True".to_string(),
            "--verbose".to_string(),
            "False".to_string(),
        ];
        if let Some(language) = language_hint {
            args.push("--language".to_string());
            args.push(language.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Parse whisper's JSON output. Segments with inverted bounds are kept;
    /// the orchestrator decides what to do with them.
    pub fn parse_output(json: &str) -> Result<Transcript, ProviderError> {
        let output: WhisperOutput =
            serde_json::from_str(json).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(Transcript {
            segments: output
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text.trim().to_string(),
                    start: s.start,
                    end: s.end,
                })
                .collect(),
            detected_language: output.language,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, ProviderError> {
        let output_dir = audio.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let args = self.build_args(audio, &output_dir, language_hint);
        run_program(&self.program, &args).await?;

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let json_path = output_dir.join(format!("{}.json", stem));
        let json = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            ProviderError::EmptyResult(format!("No transcript at {}: {}", json_path.display(), e))
        })?;

        let transcript = Self::parse_output(&json)?;
        if let Err(e) = tokio::fs::remove_file(&json_path).await {
            warn!("Could not remove {}: {}", json_path.display(), e);
        }

        debug!(
            "Transcribed {} segment(s), language {:?}",
            transcript.segments.len(),
            transcript.detected_language
        );
        Ok(transcript)
    }
}
