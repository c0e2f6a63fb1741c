/*!
 * Tests for configuration loading and validation
 */

use anyhow::Result;
use std::time::Duration;

use revoice::app_config::{Config, LogLevel, TranslationProvider};
use revoice::audio::StretchMode;
use revoice::stage::StageKind;
use crate::common;

/// Default configuration is valid and carries the resynthesis constants
#[test]
fn test_default_config_shouldBeValid() -> Result<()> {
    let config = Config::default();

    config.validate()?;
    assert_eq!(config.resynthesis.max_speed_factor, 3.0);
    assert_eq!(config.resynthesis.fade_ms, 50);
    assert_eq!(config.resynthesis.fade_min_clip_ms, 100);
    assert_eq!(config.resynthesis.stretch_mode, StretchMode::OverlapAdd);
    assert_eq!(config.acquisition.retry_delay(), Duration::from_secs(1));
    assert_eq!(config.extraction.retry_delay(), Duration::ZERO);
    assert_eq!(config.acquisition.strategy_list(StageKind::Acquisition)?.len(), 3);
    assert_eq!(config.extraction.strategy_list(StageKind::Extraction)?.len(), 3);
    assert_eq!(config.muxing.strategy_list(StageKind::Muxing)?.len(), 2);
    Ok(())
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.target_language, Config::default().target_language);
    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded.acquisition, config.acquisition);
    assert_eq!(reloaded.resynthesis, config.resynthesis);
    Ok(())
}

/// Missing fields fall back to their defaults
#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{
            "target_language": "es",
            "log_level": "debug",
            "translation": { "provider": "anthropic", "api_key": "k" },
            "resynthesis": { "stretch_mode": "resample", "sample_rate": 16000 }
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.target_language, "es");
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.translation.provider, TranslationProvider::Anthropic);
    assert_eq!(config.translation.get_model(), "claude-3-haiku-20240307");
    assert_eq!(config.translation.concurrent_requests, 4);
    assert_eq!(config.resynthesis.stretch_mode, StretchMode::Resample);
    assert_eq!(config.resynthesis.sample_rate, 16000);
    assert_eq!(config.resynthesis.max_speed_factor, 3.0);
    assert_eq!(config.synthesis.program, "espeak-ng");
    config.validate()?;
    Ok(())
}

#[test]
fn test_loadOrCreate_withMalformedFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");
    std::fs::write(&path, "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

#[test]
fn test_validate_withInvalidLanguage_shouldFail() {
    let mut config = Config::default();
    config.target_language = "xx-not-a-language".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withEmptyStrategies_shouldFail() {
    let mut config = Config::default();
    config.muxing.strategies.clear();

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroTimeout_shouldFail() {
    let mut config = Config::default();
    config.extraction.strategies = common::strategy_configs(2, 0);

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withBadResynthesisSettings_shouldFail() {
    let mut config = Config::default();
    config.resynthesis.max_speed_factor = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.resynthesis.sample_rate = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withSynthesisArgsLackingOutput_shouldFail() {
    let mut config = Config::default();
    config.synthesis.args = vec!["{text}".to_string()];

    assert!(config.validate().is_err());
}

#[test]
fn test_translationProvider_fromStr_shouldBeCaseInsensitive() {
    assert_eq!("Ollama".parse::<TranslationProvider>().unwrap(), TranslationProvider::Ollama);
    assert_eq!("ANTHROPIC".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
    assert!("openai".parse::<TranslationProvider>().is_err());
    assert_eq!(TranslationProvider::Anthropic.to_string(), "anthropic");
}

#[test]
fn test_translationConfig_withCustomEndpoint_shouldPreferIt() {
    let mut config = Config::default();
    assert_eq!(config.translation.get_endpoint(), "http://localhost:11434");

    config.translation.endpoint = "http://gpu-box:11434".to_string();
    assert_eq!(config.translation.get_endpoint(), "http://gpu-box:11434");
}
