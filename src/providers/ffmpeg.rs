use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::errors::ProviderError;
use crate::process::run_program;
use crate::stage::StageStrategy;

use super::{path_arg, AudioExtractor, Muxer};

/// ffmpeg driven by strategy argument templates
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    program: String,
}

impl FfmpegTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioExtractor for FfmpegTool {
    async fn extract(
        &self,
        video: &Path,
        strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let input = path_arg(video);
        let out = path_arg(output);
        let args = strategy.render_args(&[("input", &input), ("output", &out)]);
        run_program(&self.program, &args).await?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Muxer for FfmpegTool {
    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let video = path_arg(video);
        let audio = path_arg(audio);
        let out = path_arg(output);
        let args = strategy.render_args(&[("video", &video), ("audio", &audio), ("output", &out)]);
        run_program(&self.program, &args).await?;
        Ok(output.to_path_buf())
    }
}
