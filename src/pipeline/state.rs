use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::file_utils::FileManager;

/// Position of a run in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Init,
    Acquiring,
    Extracting,
    Transcribing,
    Translating,
    Resynthesizing,
    Muxing,
    Done,
    Aborted,
}

impl PipelineState {
    /// The state that follows on success, `None` for terminal states
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Acquiring),
            Self::Acquiring => Some(Self::Extracting),
            Self::Extracting => Some(Self::Transcribing),
            Self::Transcribing => Some(Self::Translating),
            Self::Translating => Some(Self::Resynthesizing),
            Self::Resynthesizing => Some(Self::Muxing),
            Self::Muxing => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Acquiring => "acquiring",
            Self::Extracting => "extracting",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Resynthesizing => "resynthesizing",
            Self::Muxing => "muxing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bookkeeping for one run: identity, directories, current state and every
/// temporary file created so far.
///
/// Temporary files live in a run-scoped directory that is removed by
/// `cleanup`, or on drop if `cleanup` was never called.
#[derive(Debug)]
pub struct RunState {
    run_id: Uuid,
    run_name: Option<String>,
    target_language: String,
    work_dir: Option<TempDir>,
    work_path: PathBuf,
    output_dir: PathBuf,
    state: PipelineState,
    artifacts: BTreeSet<PathBuf>,
    started_at: DateTime<Local>,
    cleaned: bool,
}

impl RunState {
    /// Create the run-scoped work directory under `temp_root`
    pub fn create(
        temp_root: &Path,
        output_dir: &Path,
        run_name: Option<String>,
        target_language: &str,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(temp_root)?;
        let run_id = Uuid::new_v4();
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("revoice_{}_", run_id.simple()))
            .tempdir_in(temp_root)?;
        let work_path = work_dir.path().to_path_buf();
        debug!("Run {} working in {}", run_id, work_path.display());

        Ok(Self {
            run_id,
            run_name,
            target_language: target_language.to_string(),
            work_dir: Some(work_dir),
            work_path,
            output_dir: output_dir.to_path_buf(),
            state: PipelineState::Init,
            artifacts: BTreeSet::new(),
            started_at: Local::now(),
            cleaned: false,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Path of the final artifact, named from the run name or start time
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(FileManager::output_file_name(
            self.run_name.as_deref(),
            &self.target_language,
            self.started_at,
        ))
    }

    /// Path inside the work directory
    pub fn work_file(&self, name: &str) -> PathBuf {
        self.work_path.join(name)
    }

    /// Move to the next pipeline state. Terminal states stay put.
    pub fn advance(&mut self) -> PipelineState {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
        self.state
    }

    pub fn abort(&mut self) {
        self.state = PipelineState::Aborted;
    }

    /// Register a file to be deleted at the end of the run
    pub fn track<P: AsRef<Path>>(&mut self, path: P) {
        self.artifacts.insert(path.as_ref().to_path_buf());
    }

    /// Stop tracking a file so it survives cleanup
    pub fn release<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.artifacts.remove(path.as_ref())
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.iter().map(PathBuf::as_path)
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Delete every tracked file and the work directory.
    ///
    /// Only the first call does anything; it returns the number of tracked
    /// files that were removed. Later calls return 0.
    pub fn cleanup(&mut self) -> usize {
        if self.cleaned {
            return 0;
        }
        self.cleaned = true;

        let mut removed = 0;
        for path in std::mem::take(&mut self.artifacts) {
            match FileManager::remove_if_exists(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        if let Some(dir) = self.work_dir.take() {
            if let Err(e) = dir.close() {
                warn!("Could not remove work directory {}: {}", self.work_path.display(), e);
            }
        }

        debug!("Run {} cleaned up {} file(s)", self.run_id, removed);
        removed
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        self.cleanup();
    }
}
