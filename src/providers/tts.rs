use async_trait::async_trait;
use std::path::Path;

use crate::audio::wav::read_wav;
use crate::audio::AudioBuffer;
use crate::errors::ProviderError;
use crate::process::run_program;

use super::{path_arg, SpeechSynthesizer};

/// Text-to-speech through a command writing a WAV file.
///
/// The argument template may use `{text}`, `{lang}` and `{output}`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `espeak-ng -v {lang} -w {output} {text}`
    pub fn espeak() -> Self {
        Self::new(
            "espeak-ng",
            ["-v", "{lang}", "-w", "{output}", "{text}"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
        )
    }

    fn render_args(&self, text: &str, language: &str, output: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                // {text} last so spoken text containing "{lang}" stays literal
                arg.replace("{lang}", language)
                    .replace("{output}", output)
                    .replace("{text}", text)
            })
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: &Path,
    ) -> Result<AudioBuffer, ProviderError> {
        let out = path_arg(output);
        let args = self.render_args(text, language, &out);
        run_program(&self.program, &args).await?;

        let output = output.to_path_buf();
        let buffer = tokio::task::spawn_blocking(move || read_wav(&output))
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?
            .map_err(|e| ProviderError::ParseError(format!("Unreadable speech clip: {}", e)))?;

        if buffer.is_empty() {
            return Err(ProviderError::EmptyResult("synthesizer produced no audio".to_string()));
        }
        Ok(buffer)
    }
}
