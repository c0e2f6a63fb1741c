/*!
 * Tests for artifact validation and file naming
 */

use anyhow::Result;
use chrono::{Local, TimeZone};

use revoice::errors::ValidationFailure;
use revoice::file_utils::{ArtifactValidator, FileManager};
use crate::common;

/// Artifacts must be strictly larger than the threshold
#[test]
fn test_validate_withThresholdSizedFile_shouldBeTooSmall() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let exact = common::create_sized_file(temp_dir.path(), "exact.mp4", 1000)?;
    let above = common::create_sized_file(temp_dir.path(), "above.mp4", 1001)?;
    let validator = ArtifactValidator::new(1000);

    assert!(matches!(
        validator.validate(&exact),
        Err(ValidationFailure::TooSmall { size: 1000, min: 1000, .. })
    ));
    let handle = validator.validate(&above)?;
    assert_eq!(handle.size_bytes, 1001);
    assert_eq!(handle.path, above);
    Ok(())
}

#[test]
fn test_validate_withMissingFile_shouldReportMissing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let missing = temp_dir.path().join("nope.wav");

    assert_eq!(
        ArtifactValidator::default().validate(&missing),
        Err(ValidationFailure::Missing(missing.clone()))
    );
    Ok(())
}

#[test]
fn test_validate_withDirectory_shouldReportNotAFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    assert!(matches!(
        ArtifactValidator::non_empty().validate(temp_dir.path()),
        Err(ValidationFailure::NotAFile(_))
    ));
    Ok(())
}

#[test]
fn test_nonEmptyValidator_shouldAcceptOneByte() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let empty = common::create_sized_file(temp_dir.path(), "empty.wav", 0)?;
    let one = common::create_sized_file(temp_dir.path(), "one.wav", 1)?;

    assert!(ArtifactValidator::non_empty().validate(&empty).is_err());
    assert!(ArtifactValidator::non_empty().validate(&one).is_ok());
    assert_eq!(ArtifactValidator::default().min_bytes(), ArtifactValidator::MEDIA_MIN_BYTES);
    Ok(())
}

#[test]
fn test_outputFileName_withRunName_shouldUseIt() {
    let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();

    assert_eq!(FileManager::output_file_name(Some("talk"), "fr", now), "talk_fr.mp4");
    assert_eq!(FileManager::output_file_name(Some("  "), "fr", now), "video_1700000000_fr.mp4");
    assert_eq!(FileManager::output_file_name(None, "de", now), "video_1700000000_de.mp4");
}

/// A run name can never point outside the output directory
#[test]
fn test_outputFileName_withPathInName_shouldStayOneComponent() {
    let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();

    assert_eq!(FileManager::output_file_name(Some("a/b"), "fr", now), "a_b_fr.mp4");
    assert_eq!(FileManager::output_file_name(Some("../../x"), "fr", now), "_.._x_fr.mp4");
    assert_eq!(FileManager::output_file_name(Some(r"..\evil"), "fr", now), "_evil_fr.mp4");
    assert_eq!(FileManager::output_file_name(Some(".."), "de", now), "video_1700000000_de.mp4");

    let output_dir = std::path::Path::new("out");
    let joined = output_dir.join(FileManager::output_file_name(Some("../../x"), "fr", now));
    assert_eq!(joined.parent(), Some(output_dir));
}

#[test]
fn test_moveFile_shouldReplaceExistingTarget() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let from = common::create_sized_file(temp_dir.path(), "staged.mp4", 2048)?;
    let to = common::create_sized_file(temp_dir.path(), "final.mp4", 10)?;

    FileManager::move_file(&from, &to)?;

    assert!(!FileManager::file_exists(&from));
    assert_eq!(std::fs::metadata(&to)?.len(), 2048);
    Ok(())
}

#[test]
fn test_removeIfExists_shouldReportWhetherFileWasThere() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_sized_file(temp_dir.path(), "gone.tmp", 3)?;

    assert!(FileManager::remove_if_exists(&file)?);
    assert!(!FileManager::remove_if_exists(&file)?);
    assert!(!FileManager::file_exists(&file));
    Ok(())
}

#[test]
fn test_ensureDir_withNestedPath_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b");

    FileManager::ensure_dir(&nested)?;

    assert!(FileManager::dir_exists(&nested));
    Ok(())
}

#[test]
fn test_formatSize_shouldPickUnit() {
    assert_eq!(FileManager::format_size(2048), "2 KB");
    assert_eq!(FileManager::format_size(5 * 1024 * 1024 + 1), "5 MB");
}
