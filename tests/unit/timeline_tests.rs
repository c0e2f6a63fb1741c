/*!
 * Tests for timed assembly of synthesized clips
 */

use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use revoice::app_config::ResynthesisConfig;
use revoice::audio::wav::read_wav;
use revoice::audio::{AudioBuffer, StretchMode};
use revoice::errors::ResynthesisFailure;
use revoice::pipeline::{SynthesizedClip, TimelineSynthesizer, TimeSlot, Utterance};
use crate::common::{self, clip, utterance, TEST_RATE};

fn resample_synthesizer() -> TimelineSynthesizer {
    TimelineSynthesizer::new(ResynthesisConfig {
        stretch_mode: StretchMode::Resample,
        ..common::test_resynthesis_config()
    })
}

fn clips(entries: Vec<SynthesizedClip>) -> BTreeMap<usize, SynthesizedClip> {
    entries.into_iter().map(|c| (c.owner_utterance_index, c)).collect()
}

/// Stretch one clip, pad the other, total length from the last slot end
#[test]
fn test_assembleBuffer_withLongAndShortClips_shouldStretchAndPad() {
    let utterances = vec![utterance(0.0, 2.0, "hi"), utterance(3.0, 4.0, "bye")];
    let clips = clips(vec![clip(0, 3000, 0.5), clip(1, 500, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.audio.duration_ms(), 4000);
    assert_eq!(track.audio.len(), 4000);
    assert_eq!(track.success_count, 2);
    assert_eq!(track.total_count, 2);
    assert_eq!(track.placements.stretched, 1);
    assert_eq!(track.placements.padded, 1);

    let samples = track.audio.samples();
    // stretched clip fills [0, 2000) with fades at both ends
    assert!((samples[1000] - 0.5).abs() < 1e-4);
    assert!(samples[1999].abs() < 1e-6);
    // gap between the slots stays silent
    assert!(samples[2000..3000].iter().all(|s| *s == 0.0));
    // second clip speaks for 500ms, then padding
    assert!((samples[3200] - 0.5).abs() < 1e-4);
    assert!(samples[3500..].iter().all(|s| s.abs() < 1e-6));
}

/// Utterances given out of order are mixed by slot start and land in their own slots
#[test]
fn test_assembleBuffer_withUnsortedUtterances_shouldMixBySlotStart() {
    let utterances = vec![utterance(3.0, 4.0, "later"), utterance(0.0, 2.0, "earlier")];
    let clips = clips(vec![clip(0, 500, 0.25), clip(1, 500, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.mix_order, vec![1, 0]);
    assert_eq!(track.audio.duration_ms(), 4000);
    let samples = track.audio.samples();
    assert!((samples[200] - 0.5).abs() < 1e-4);
    assert!(samples[600..3000].iter().all(|s| s.abs() < 1e-6));
    assert!((samples[3200] - 0.25).abs() < 1e-4);
    assert!(samples[3500..].iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn test_assembleBuffer_withFactorAboveMax_shouldTruncateToSlot() {
    let utterances = vec![utterance(0.0, 1.0, "long"), utterance(2.0, 3.0, "absent")];
    let clips = clips(vec![clip(0, 3500, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.placements.truncated, 1);
    assert_eq!(track.success_count, 1);
    // nothing spills past the slot end
    assert!(track.audio.samples()[1000..].iter().all(|s| *s == 0.0));
    assert!((track.audio.samples()[500] - 0.5).abs() < 1e-6);
}

#[test]
fn test_assembleBuffer_withFactorExactlyMax_shouldStretch() {
    let utterances = vec![utterance(0.0, 1.0, "three times")];
    let clips = clips(vec![clip(0, 3000, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.placements.stretched, 1);
    assert_eq!(track.placements.truncated, 0);
    assert_eq!(track.audio.len(), 1000);
}

#[test]
fn test_assembleBuffer_withOverlapAdd_shouldFillSlotExactly() {
    let synthesizer = TimelineSynthesizer::new(common::test_resynthesis_config());
    assert_eq!(synthesizer.config().stretch_mode, StretchMode::OverlapAdd);

    let utterances = vec![utterance(1.0, 3.0, "pitch kept"), utterance(3.0, 4.0, "tail")];
    let clips = clips(vec![clip(0, 2600, 0.4)]);

    let track = synthesizer
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.placements.stretched, 1);
    assert_eq!(track.audio.len(), 4000);
    assert!(track.audio.samples()[..1000].iter().all(|s| *s == 0.0));
    assert!(track.audio.samples()[3000..].iter().all(|s| *s == 0.0));
    assert!(track.audio.samples()[2000].abs() > 0.0);
}

#[test]
fn test_assembleBuffer_withShortClips_shouldSpanLastSlotEnd() {
    let utterances: Vec<Utterance> = (0..5)
        .map(|i| utterance(i as f64 * 1.5, i as f64 * 1.5 + 1.0, "word"))
        .collect();
    let clips = clips((0..5).map(|i| clip(i, 400 + i as u64 * 100, 0.2)).collect());

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.audio.duration_ms(), 7000);
    assert_eq!(track.placements.padded, 5);
}

#[test]
fn test_assembleBuffer_withEveryClipAbsent_shouldReturnNoClipsProduced() {
    let utterances = vec![utterance(0.0, 1.0, "a"), utterance(1.0, 2.0, "b")];

    let result = resample_synthesizer().assemble_buffer(&utterances, BTreeMap::new(), &CancellationToken::new());

    assert_eq!(result.unwrap_err(), ResynthesisFailure::NoClipsProduced);
}

#[test]
fn test_assembleBuffer_withNoUtterances_shouldReturnNoSegments() {
    let result = resample_synthesizer().assemble_buffer(&[], clips(vec![clip(0, 100, 0.1)]), &CancellationToken::new());

    assert_eq!(result.unwrap_err(), ResynthesisFailure::NoSegments);
}

#[test]
fn test_assembleBuffer_withEmptyTextOrAudio_shouldSkipSegment() {
    let slot = TimeSlot::new(0.0, 1.0).unwrap();
    let utterances = vec![
        Utterance::translated(slot, "source", "   "),
        utterance(1.0, 2.0, "empty audio"),
        utterance(2.0, 3.0, "kept"),
    ];
    let clips = clips(vec![
        clip(0, 800, 0.5),
        SynthesizedClip::new(1, AudioBuffer::from_samples(Vec::new(), TEST_RATE)),
        clip(2, 800, 0.5),
    ]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.success_count, 1);
    assert!(track.audio.samples()[..2000].iter().all(|s| *s == 0.0));
}

#[test]
fn test_assembleBuffer_withZeroLengthSlot_shouldOverlayUnmodified() {
    let utterances = vec![utterance(0.0, 0.0004, "blip"), utterance(1.0, 2.0, "end")];
    let clips = clips(vec![clip(0, 300, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.placements.unmodified, 1);
    // 300ms clip placed in full, faded at both ends
    assert!((track.audio.samples()[150] - 0.5).abs() < 1e-6);
    assert_eq!(track.audio.samples()[0], 0.0);
}

#[test]
fn test_assembleBuffer_withClipOfHundredMs_shouldNotFade() {
    let utterances = vec![utterance(0.0, 0.1, "short")];
    let clips = clips(vec![clip(0, 100, 0.5)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert!(track.audio.samples().iter().all(|s| (*s - 0.5).abs() < 1e-6));
}

#[test]
fn test_assembleBuffer_withCancelledToken_shouldReturnInterrupted() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let utterances = vec![utterance(0.0, 1.0, "a")];

    let result = resample_synthesizer().assemble_buffer(&utterances, clips(vec![clip(0, 500, 0.1)]), &cancel);

    assert_eq!(result.unwrap_err(), ResynthesisFailure::Interrupted);
}

#[test]
fn test_assembleBuffer_withSameInputs_shouldBeDeterministic() {
    let utterances = vec![utterance(0.0, 2.0, "one"), utterance(1.5, 3.0, "two")];
    let input = clips(vec![clip(0, 2500, 0.3), clip(1, 900, 0.3)]);
    let synthesizer = TimelineSynthesizer::new(common::test_resynthesis_config());

    let first = synthesizer
        .assemble_buffer(&utterances, input.clone(), &CancellationToken::new())
        .unwrap();
    let second = synthesizer
        .assemble_buffer(&utterances, input, &CancellationToken::new())
        .unwrap();

    assert_eq!(first.audio, second.audio);
}

#[test]
fn test_assembleBuffer_withClipAtOtherRate_shouldResampleFirst() {
    let utterances = vec![utterance(0.0, 1.0, "resampled")];
    let audio = AudioBuffer::from_samples(vec![0.25; 8000], 16000);
    let clips = clips(vec![SynthesizedClip::new(0, audio)]);

    let track = resample_synthesizer()
        .assemble_buffer(&utterances, clips, &CancellationToken::new())
        .unwrap();

    assert_eq!(track.placements.padded, 1);
    assert!((track.audio.samples()[250] - 0.25).abs() < 1e-4);
}

#[test]
fn test_assemble_shouldExportReadableWav() -> anyhow::Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("track.wav");
    let utterances = vec![utterance(0.0, 2.0, "hi"), utterance(3.0, 4.0, "bye")];
    let clips = clips(vec![clip(0, 3000, 0.5), clip(1, 500, 0.5)]);

    let handle = resample_synthesizer().assemble(&utterances, clips, &output, &CancellationToken::new())?;

    assert_eq!(handle.path, output);
    assert_eq!(handle.duration_ms, 4000);
    assert_eq!(handle.success_count, 2);
    let audio = read_wav(&output)?;
    assert_eq!(audio.sample_rate(), TEST_RATE);
    assert_eq!(audio.duration_ms(), 4000);
    Ok(())
}
