use async_trait::async_trait;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::errors::ProviderError;
use crate::process::run_program;
use crate::stage::StageStrategy;

use super::{path_arg, FetchedMedia, MediaFetcher};

/// Base name of the fetched media inside the run area
const SOURCE_STEM: &str = "source";

/// Downloads remote media with yt-dlp; local files are copied instead
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn copy_local(&self, source: &Path, work_dir: &Path) -> Result<FetchedMedia, ProviderError> {
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string());
        let target = work_dir.join(format!("{}.{}", SOURCE_STEM, extension));

        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to copy {}: {}", source.display(), e)))?;

        info!("Using local file {}", source.display());
        let mut metadata = BTreeMap::new();
        metadata.insert("origin".to_string(), "local".to_string());
        metadata.insert("source".to_string(), path_arg(source));
        Ok(FetchedMedia { path: target, metadata })
    }

    /// The path yt-dlp printed last, or the first file named after the
    /// output template
    fn locate_download(stdout: &str, work_dir: &Path) -> Option<PathBuf> {
        let printed = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .next_back()
            .map(PathBuf::from)
            .filter(|path| path.is_file());
        if printed.is_some() {
            return printed;
        }

        let entries = std::fs::read_dir(work_dir).ok()?;
        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_stem().map(|s| s == SOURCE_STEM).unwrap_or(false)
                    && path.extension().map(|e| e != "part").unwrap_or(false)
            })
            .find(|path| path.is_file())
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source_ref: &str,
        strategy: &StageStrategy,
        work_dir: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        let local = Path::new(source_ref);
        if local.is_file() {
            return self.copy_local(local, work_dir).await;
        }

        let url = Url::parse(source_ref).map_err(|e| {
            ProviderError::RequestFailed(format!("'{}' is neither a URL nor an existing file: {}", source_ref, e))
        })?;

        let template = path_arg(&work_dir.join(format!("{}.%(ext)s", SOURCE_STEM)));
        let args = strategy.render_args(&[("source", url.as_str()), ("output_template", &template)]);
        let output = run_program(&self.program, &args).await?;

        let path = Self::locate_download(&output.stdout, work_dir)
            .ok_or_else(|| ProviderError::EmptyResult(format!("{} reported success but wrote no file", self.program)))?;
        debug!("Downloaded {} to {}", url, path.display());

        let mut metadata = BTreeMap::new();
        metadata.insert("origin".to_string(), "remote".to_string());
        metadata.insert("source".to_string(), url.to_string());
        if let Some(host) = url.host_str() {
            metadata.insert("host".to_string(), host.to_string());
        }
        metadata.insert("strategy".to_string(), strategy.name.clone());
        Ok(FetchedMedia { path, metadata })
    }
}
