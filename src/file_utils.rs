use anyhow::Result;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ValidationFailure;

// @module: File, directory and artifact utilities

/// A file that passed validation and may be trusted by the next stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    // @field: Location on disk
    pub path: PathBuf,

    // @field: Size observed during validation
    pub size_bytes: u64,
}

/// Checks that an artifact exists and is larger than a threshold
#[derive(Debug, Clone, Copy)]
pub struct ArtifactValidator {
    // @field: Files must be strictly larger than this
    min_bytes: u64,
}

impl ArtifactValidator {
    /// Threshold used by the media stages
    pub const MEDIA_MIN_BYTES: u64 = 1000;

    // @creates: Validator rejecting files of `min_bytes` or less
    pub fn new(min_bytes: u64) -> Self {
        Self { min_bytes }
    }

    /// Validator that only rejects missing or empty files
    pub fn non_empty() -> Self {
        Self::new(0)
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    // @validates: Existence, regular file, size above threshold
    pub fn validate<P: AsRef<Path>>(&self, path: P) -> Result<ArtifactHandle, ValidationFailure> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => return Err(ValidationFailure::Missing(path.to_path_buf())),
        };

        if !metadata.is_file() {
            return Err(ValidationFailure::NotAFile(path.to_path_buf()));
        }

        let size = metadata.len();
        if size <= self.min_bytes {
            return Err(ValidationFailure::TooSmall {
                path: path.to_path_buf(),
                size,
                min: self.min_bytes,
            });
        }

        Ok(ArtifactHandle {
            path: path.to_path_buf(),
            size_bytes: size,
        })
    }
}

impl Default for ArtifactValidator {
    fn default() -> Self {
        Self::new(Self::MEDIA_MIN_BYTES)
    }
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Base name shared by the run's artifacts: `{name}_{lang}`, or
    /// `video_{unix seconds}_{lang}` when no usable name was given.
    pub fn run_stem(run_name: Option<&str>, target_language: &str, now: DateTime<Local>) -> String {
        match run_name.map(Self::sanitize_name).filter(|name| !name.is_empty()) {
            Some(name) => format!("{}_{}", name, target_language),
            None => format!("video_{}_{}", now.timestamp(), target_language),
        }
    }

    /// Make a user-supplied name safe as a single file name component:
    /// separators and reserved characters become `_`, leading dots are dropped
    pub fn sanitize_name(name: &str) -> String {
        let replaced: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        replaced.trim_start_matches('.').trim().to_string()
    }

    // @generates: Final output file name for a run
    pub fn output_file_name(run_name: Option<&str>, target_language: &str, now: DateTime<Local>) -> String {
        format!("{}.mp4", Self::run_stem(run_name, target_language, now))
    }

    /// Remove a file, treating "already gone" as success
    pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Move a file, copying across filesystems when a rename is refused
    pub fn move_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> std::io::Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }
        fs::copy(from, to)?;
        fs::remove_file(from)
    }

    /// Human-readable size, in KB below one megabyte
    pub fn format_size(bytes: u64) -> String {
        if bytes >= 1024 * 1024 {
            format!("{} MB", bytes / (1024 * 1024))
        } else {
            format!("{} KB", bytes / 1024)
        }
    }
}
