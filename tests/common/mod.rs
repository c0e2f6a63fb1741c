/*!
 * Common test utilities for the revoice test suite
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use revoice::app_config::{Config, ResynthesisConfig};
use revoice::audio::AudioBuffer;
use revoice::pipeline::{Backends, SynthesizedClip, TimeSlot, Utterance};
use revoice::providers::mock::{MockExtractor, MockFetcher, MockMuxer, MockSynthesizer, MockTranscriber, MockTranslator};
use revoice::stage::strategy::StrategyConfig;
use revoice::stage::{StageKind, StageStrategy, StrategyList};

/// Sample rate used by timeline tests; one sample per millisecond
pub const TEST_RATE: u32 = 1000;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a file of `size` bytes in `dir`, creating `dir` if needed
pub fn create_sized_file(dir: &Path, filename: &str, size: usize) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, vec![1u8; size])?;
    Ok(path)
}

/// Resynthesis settings at `TEST_RATE`
pub fn test_resynthesis_config() -> ResynthesisConfig {
    ResynthesisConfig {
        sample_rate: TEST_RATE,
        ..ResynthesisConfig::default()
    }
}

/// Utterance with a translated text spanning `[start, end)` seconds
pub fn utterance(start: f64, end: f64, text: &str) -> Utterance {
    let slot = TimeSlot::new(start, end).expect("valid slot");
    Utterance::translated(slot, text, text)
}

/// Constant-amplitude clip of `ms` milliseconds at `TEST_RATE`
pub fn clip(index: usize, ms: u64, level: f32) -> SynthesizedClip {
    let len = (ms * TEST_RATE as u64 / 1000) as usize;
    SynthesizedClip::new(index, AudioBuffer::from_samples(vec![level; len], TEST_RATE))
}

/// Strategy list with `count` strategies of the given timeout
pub fn strategies(stage: StageKind, count: usize, timeout: Duration) -> StrategyList {
    let list = (0..count)
        .map(|i| StageStrategy::new(format!("strategy-{}", i + 1), vec!["{output}".to_string()], timeout))
        .collect();
    StrategyList::new(stage, list).expect("non-empty list")
}

/// Strategy configs for a config section
pub fn strategy_configs(count: usize, timeout_secs: u64) -> Vec<StrategyConfig> {
    (0..count)
        .map(|i| StrategyConfig {
            name: format!("strategy-{}", i + 1),
            args: vec!["{output}".to_string()],
            timeout_secs,
        })
        .collect()
}

/// Configuration writing into `root`, with no waits between attempts
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.target_language = "fr".to_string();
    config.temp_dir = root.join("tmp");
    config.output_dir = root.join("out");
    config.acquisition.retry_delay_ms = 0;
    config.acquisition.strategies = strategy_configs(3, 5);
    config.extraction.strategies = strategy_configs(2, 5);
    config.muxing.strategies = strategy_configs(2, 5);
    config.resynthesis = ResynthesisConfig {
        sample_rate: 8000,
        ..ResynthesisConfig::default()
    };
    config
}

/// Mock backends; keep clones of the mocks to inspect their call counts
pub struct MockSet {
    pub fetcher: MockFetcher,
    pub extractor: MockExtractor,
    pub transcriber: MockTranscriber,
    pub translator: MockTranslator,
    pub synthesizer: MockSynthesizer,
    pub muxer: MockMuxer,
}

impl MockSet {
    pub fn working() -> Self {
        Self {
            fetcher: MockFetcher::working(),
            extractor: MockExtractor::working(),
            transcriber: MockTranscriber::with_segments(&[
                ("Hello there.", 0.0, 2.0),
                ("How are you?", 3.0, 4.0),
                ("Goodbye.", 5.0, 6.5),
            ]),
            translator: MockTranslator::working(),
            synthesizer: MockSynthesizer::working(),
            muxer: MockMuxer::working(),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            fetcher: Arc::new(self.fetcher.clone()),
            extractor: Arc::new(self.extractor.clone()),
            transcriber: Arc::new(self.transcriber.clone()),
            translator: Arc::new(self.translator.clone()),
            synthesizer: Arc::new(self.synthesizer.clone()),
            muxer: Arc::new(self.muxer.clone()),
        }
    }
}

/// Regular files left under `dir`, recursively
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}
