/*!
 * End-to-end runs of the orchestrator against mock backends
 */

use anyhow::Result;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use revoice::errors::{AttemptFailure, ResynthesisFailure, RunError};
use revoice::pipeline::{PipelineOrchestrator, PipelineState, RunRequest};
use revoice::providers::mock::{MockBehavior, MockFetcher, MockMuxer, MockSynthesizer, MockTranscriber, MockTranslator};
use revoice::stage::StageKind;
use crate::common::{self, MockSet};

fn request(root: &Path) -> RunRequest {
    RunRequest {
        source_ref: "https://example.com/watch?v=demo".to_string(),
        target_language: "fr".to_string(),
        run_name: Some("demo".to_string()),
        output_dir: root.join("out"),
    }
}

/// Nothing but the final output survives a run
fn assert_no_temporary_files(root: &Path) {
    let leftovers = common::files_under(&root.join("tmp"));
    assert!(leftovers.is_empty(), "temporary files left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_run_withWorkingBackends_shouldProduceOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mocks = MockSet::working();
    let states = Arc::new(Mutex::new(Vec::new()));
    let seen = states.clone();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?
        .with_progress(Arc::new(move |state: PipelineState, _done: usize, total: usize| {
            if total == 0 {
                seen.lock().push(state);
            }
        }));

    let summary = orchestrator.run(request(temp_dir.path()), &CancellationToken::new()).await?;

    assert_eq!(summary.output_path, temp_dir.path().join("out").join("demo_fr.mp4"));
    assert!(summary.output_path.exists());
    assert_eq!(summary.output_size, 8192);
    assert_eq!(summary.segments_total, 3);
    assert_eq!(summary.translated_count, 3);
    assert_eq!(summary.fallback_count, 0);
    assert_eq!(summary.synthesized_count, 3);
    assert_eq!(summary.track_duration_ms, 6500);
    assert_eq!(summary.strategies[0], (StageKind::Acquisition, "strategy-1".to_string()));
    assert_eq!(mocks.synthesizer.calls(), 3);
    assert_no_temporary_files(temp_dir.path());

    assert_eq!(
        *states.lock(),
        vec![
            PipelineState::Acquiring,
            PipelineState::Extracting,
            PipelineState::Transcribing,
            PipelineState::Translating,
            PipelineState::Resynthesizing,
            PipelineState::Muxing,
            PipelineState::Done,
        ]
    );
    Ok(())
}

/// Three hanging downloads exhaust acquisition; later stages never start
#[tokio::test]
async fn test_run_withHangingAcquisition_shouldAbortAfterThreeTimeouts() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::test_config(temp_dir.path());
    config.acquisition.strategies = common::strategy_configs(3, 1);
    let mut mocks = MockSet::working();
    mocks.fetcher = MockFetcher::new(MockBehavior::Slow { delay_ms: 5000 });
    let orchestrator = PipelineOrchestrator::new(config, mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Acquiring);
    match &failure.error {
        RunError::Stage(stage) => {
            assert_eq!(stage.stage, StageKind::Acquisition);
            assert_eq!(stage.timeout_count(), 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(mocks.fetcher.calls(), 3);
    assert_eq!(mocks.extractor.calls(), 0);
    assert_no_temporary_files(temp_dir.path());
    assert!(!request(temp_dir.path()).output_dir.join("demo_fr.mp4").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withEveryDownloadFailing_shouldListEachStrategy() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.fetcher = MockFetcher::new(MockBehavior::Intermittent { fail_every: 1 });
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    // every call fails: one reason per strategy, in order
    match failure.error {
        RunError::Stage(stage) => {
            let names: Vec<String> = stage.attempts.iter().map(|(n, _)| n.clone()).collect();
            assert_eq!(names, vec!["strategy-1", "strategy-2", "strategy-3"]);
            assert!(stage.attempts.iter().all(|(_, f)| matches!(f, AttemptFailure::Invocation(_))));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

/// A crashed mux leaves a partial file that must not survive the abort
#[tokio::test]
async fn test_run_withFailingMuxer_shouldRemovePartialOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.muxer = MockMuxer::failing();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Muxing);
    assert_eq!(mocks.muxer.calls(), 2);
    assert!(common::files_under(&temp_dir.path().join("out")).is_empty());
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

/// An aborted mux must leave an earlier output with the same name untouched
#[tokio::test]
async fn test_run_withFailingMuxer_shouldKeepPreviousOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let previous = common::create_sized_file(&temp_dir.path().join("out"), "demo_fr.mp4", 5000)?;
    let mut mocks = MockSet::working();
    mocks.muxer = MockMuxer::failing();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Muxing);
    assert!(previous.exists(), "previous output was removed by the aborted run");
    assert_eq!(std::fs::metadata(&previous)?.len(), 5000);
    assert_eq!(common::files_under(&temp_dir.path().join("out")), vec![previous]);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

/// A successful run replaces an earlier output with the same name
#[tokio::test]
async fn test_run_withPreviousOutput_shouldReplaceItOnSuccess() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let previous = common::create_sized_file(&temp_dir.path().join("out"), "demo_fr.mp4", 5000)?;
    let mocks = MockSet::working();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let summary = orchestrator.run(request(temp_dir.path()), &CancellationToken::new()).await?;

    assert_eq!(summary.output_path, previous);
    assert_eq!(std::fs::metadata(&previous)?.len(), 8192);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

/// Path separators in the run name never move the output out of its directory
#[tokio::test]
async fn test_run_withPathInRunName_shouldWriteInsideOutputDir() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mocks = MockSet::working();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;
    let mut request = request(temp_dir.path());
    request.run_name = Some("../../escape".to_string());

    let summary = orchestrator.run(request, &CancellationToken::new()).await?;

    assert_eq!(summary.output_path.parent(), Some(temp_dir.path().join("out").as_path()));
    assert!(summary.output_path.exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withUndersizedMuxOutput_shouldFailValidation() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.muxer = MockMuxer::new(MockBehavior::Empty);
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    match failure.error {
        RunError::Stage(stage) => {
            assert!(stage.attempts.iter().all(|(_, f)| matches!(f, AttemptFailure::Validation(_))));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(common::files_under(&temp_dir.path().join("out")).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_run_withSilentAudio_shouldFailTranscription() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.transcriber = MockTranscriber::with_segments(&[("  ", 0.0, 1.0)]);
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Transcribing);
    assert_eq!(failure.error, RunError::EmptyTranscription);
    assert_eq!(mocks.translator.calls(), 0);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

#[tokio::test]
async fn test_run_withSlowTranscriber_shouldTimeOut() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::test_config(temp_dir.path());
    config.transcription.timeout_secs = 1;
    let mut mocks = MockSet::working();
    mocks.transcriber = MockTranscriber::new(MockBehavior::Slow { delay_ms: 5000 }, Default::default());
    let orchestrator = PipelineOrchestrator::new(config, mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Transcribing);
    assert!(matches!(failure.error, RunError::Timeout { .. }));
    Ok(())
}

/// Translation failures fall back to the source text without aborting
#[tokio::test]
async fn test_run_withFailingTranslator_shouldSpeakSourceText() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.translator = MockTranslator::failing();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let summary = orchestrator.run(request(temp_dir.path()), &CancellationToken::new()).await?;

    assert_eq!(summary.translated_count, 0);
    assert_eq!(summary.fallback_count, 3);
    assert_eq!(summary.synthesized_count, 3);
    Ok(())
}

#[tokio::test]
async fn test_run_withSomeSynthesisFailures_shouldLeaveGapsSilent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.synthesizer = MockSynthesizer::new(MockBehavior::Intermittent { fail_every: 2 });
    let mut config = common::test_config(temp_dir.path());
    config.synthesis.concurrent_jobs = 1;
    let orchestrator = PipelineOrchestrator::new(config, mocks.backends())?;

    let summary = orchestrator.run(request(temp_dir.path()), &CancellationToken::new()).await?;

    assert_eq!(summary.segments_total, 3);
    assert_eq!(summary.synthesized_count, 2);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

#[tokio::test]
async fn test_run_withEverySynthesisFailing_shouldAbortResynthesis() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.synthesizer = MockSynthesizer::failing();
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;

    let failure = orchestrator
        .run(request(temp_dir.path()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, PipelineState::Resynthesizing);
    assert_eq!(failure.error, RunError::Resynthesis(ResynthesisFailure::NoClipsProduced));
    assert_eq!(mocks.muxer.calls(), 0);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

#[tokio::test]
async fn test_run_cancelledDuringDownload_shouldAbortQuickly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut mocks = MockSet::working();
    mocks.fetcher = MockFetcher::new(MockBehavior::Slow { delay_ms: 10_000 });
    let orchestrator = PipelineOrchestrator::new(common::test_config(temp_dir.path()), mocks.backends())?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let failure = orchestrator.run(request(temp_dir.path()), &cancel).await.unwrap_err();

    assert!(failure.is_interrupted());
    assert_eq!(failure.stage, PipelineState::Acquiring);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(mocks.fetcher.calls(), 1);
    assert_no_temporary_files(temp_dir.path());
    Ok(())
}

#[test]
fn test_new_withEmptyStrategyList_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::test_config(temp_dir.path());
    config.extraction.strategies.clear();

    assert!(PipelineOrchestrator::new(config, MockSet::working().backends()).is_err());
    Ok(())
}
