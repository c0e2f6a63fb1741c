/*!
 * Timed assembly of synthesized speech.
 *
 * The `TimelineSynthesizer` takes the utterances of a run, each with a fixed
 * time slot, and the clips synthesized for them, and builds one continuous
 * track. Every clip is reconciled with its slot:
 *
 * - longer than the slot, up to `max_speed_factor`: time-stretched to fit
 * - longer than that: cut at the slot end
 * - shorter than the slot: padded with trailing silence
 *
 * Clips are then faded at both ends and mixed into the track at their slot
 * start, lowest start first. Overlapping slots are summed.
 */

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::app_config::ResynthesisConfig;
use crate::audio::buffer::ms_to_samples;
use crate::audio::wav::write_wav;
use crate::audio::{stretch_to_len, AudioBuffer};
use crate::errors::ResynthesisFailure;
use crate::file_utils::ArtifactValidator;

use super::types::{seconds_to_ms, SynthesizedClip, Utterance};

/// How a clip was fitted into its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Sped up to the slot length
    Stretched,
    /// Cut at the slot length
    Truncated,
    /// Extended with silence to the slot length
    Padded,
    /// Already the slot length, or the slot was too short to fit into
    Unmodified,
}

/// Counters describing one assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub stretched: usize,
    pub truncated: usize,
    pub padded: usize,
    pub unmodified: usize,
}

impl PlacementStats {
    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Stretched => self.stretched += 1,
            Placement::Truncated => self.truncated += 1,
            Placement::Padded => self.padded += 1,
            Placement::Unmodified => self.unmodified += 1,
        }
    }
}

/// In-memory result of an assembly
#[derive(Debug, Clone)]
pub struct AssembledTrack {
    pub audio: AudioBuffer,
    /// Clips placed on the track
    pub success_count: usize,
    /// Utterances considered
    pub total_count: usize,
    pub placements: PlacementStats,
    /// Utterance indices in the order their clips were mixed in
    pub mix_order: Vec<usize>,
}

/// Exported track ready for muxing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    pub path: std::path::PathBuf,
    pub duration_ms: u64,
    pub success_count: usize,
    pub total_count: usize,
}

/// Builds a continuous track from slotted clips
#[derive(Debug, Clone)]
pub struct TimelineSynthesizer {
    config: ResynthesisConfig,
}

impl TimelineSynthesizer {
    pub fn new(config: ResynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResynthesisConfig {
        &self.config
    }

    /// Place every clip of `clips` on a silent track spanning all slots.
    ///
    /// `clips` is keyed by utterance index; missing keys are utterances whose
    /// synthesis failed. Clips are consumed as they are placed.
    pub fn assemble_buffer(
        &self,
        utterances: &[Utterance],
        mut clips: BTreeMap<usize, SynthesizedClip>,
        cancel: &CancellationToken,
    ) -> Result<AssembledTrack, ResynthesisFailure> {
        if utterances.is_empty() {
            return Err(ResynthesisFailure::NoSegments);
        }

        let rate = self.config.sample_rate;
        let max_end = utterances
            .iter()
            .map(|u| u.slot.end())
            .fold(0.0_f64, f64::max);
        let total_ms = seconds_to_ms(max_end);
        let mut track = AudioBuffer::silent(total_ms, rate);

        // stable: equal starts keep utterance order
        let mut order: Vec<usize> = (0..utterances.len()).collect();
        order.sort_by(|a, b| utterances[*a].slot.start().total_cmp(&utterances[*b].slot.start()));

        let mut success_count = 0;
        let mut placements = PlacementStats::default();
        let mut mix_order = Vec::with_capacity(clips.len());

        for index in order {
            if cancel.is_cancelled() {
                warn!("Resynthesis interrupted after {} clip(s)", success_count);
                return Err(ResynthesisFailure::Interrupted);
            }

            let utterance = &utterances[index];
            let Some(clip) = clips.remove(&index) else {
                debug!("Segment {}: no clip, leaving silence", index);
                continue;
            };
            if utterance.translated_text().trim().is_empty() || clip.is_empty() {
                debug!("Segment {}: empty text or audio, skipping", index);
                continue;
            }

            let (fitted, placement) = self.fit_to_slot(clip.audio, utterance.slot.duration_ms());
            track.overlay(&fitted, utterance.slot.start_ms());
            placements.record(placement);
            mix_order.push(index);
            success_count += 1;
        }

        if !clips.is_empty() {
            warn!("{} clip(s) had no matching utterance and were ignored", clips.len());
        }

        if success_count == 0 {
            return Err(ResynthesisFailure::NoClipsProduced);
        }

        info!(
            "Placed {}/{} clips ({} stretched, {} truncated, {} padded)",
            success_count,
            utterances.len(),
            placements.stretched,
            placements.truncated,
            placements.padded
        );

        Ok(AssembledTrack {
            audio: track,
            success_count,
            total_count: utterances.len(),
            placements,
            mix_order,
        })
    }

    /// Assemble the track and write it to `output_path` as 16-bit WAV
    pub fn assemble<P: AsRef<Path>>(
        &self,
        utterances: &[Utterance],
        clips: BTreeMap<usize, SynthesizedClip>,
        output_path: P,
        cancel: &CancellationToken,
    ) -> Result<TrackHandle, ResynthesisFailure> {
        let output_path = output_path.as_ref();
        let assembled = self.assemble_buffer(utterances, clips, cancel)?;

        if cancel.is_cancelled() {
            return Err(ResynthesisFailure::Interrupted);
        }

        write_wav(output_path, &assembled.audio)
            .map_err(|e| ResynthesisFailure::Export(e.to_string()))?;
        let handle = ArtifactValidator::non_empty()
            .validate(output_path)
            .map_err(|e| ResynthesisFailure::Export(e.to_string()))?;

        Ok(TrackHandle {
            path: handle.path,
            duration_ms: assembled.audio.duration_ms(),
            success_count: assembled.success_count,
            total_count: assembled.total_count,
        })
    }

    /// Reconcile a clip with a slot of `slot_ms`, then fade its edges
    fn fit_to_slot(&self, audio: AudioBuffer, slot_ms: u64) -> (AudioBuffer, Placement) {
        let rate = self.config.sample_rate;
        let mut audio = if audio.sample_rate() == rate {
            audio
        } else {
            audio.resampled(rate)
        };
        let clip_ms = audio.duration_ms();

        let placement = if slot_ms == 0 {
            Placement::Unmodified
        } else if clip_ms > slot_ms {
            let speed_factor = clip_ms as f64 / slot_ms as f64;
            if speed_factor <= self.config.max_speed_factor {
                debug!("Stretching {}ms clip into {}ms (x{:.2})", clip_ms, slot_ms, speed_factor);
                audio = stretch_to_len(&audio, ms_to_samples(slot_ms, rate), self.config.stretch_mode);
                Placement::Stretched
            } else {
                debug!("Clip {}ms is x{:.2} its slot, truncating to {}ms", clip_ms, speed_factor, slot_ms);
                audio.truncate_ms(slot_ms);
                Placement::Truncated
            }
        } else if clip_ms < slot_ms {
            audio.pad_to_ms(slot_ms);
            Placement::Padded
        } else {
            Placement::Unmodified
        };

        if audio.duration_ms() > self.config.fade_min_clip_ms {
            audio.fade_in(self.config.fade_ms);
            audio.fade_out(self.config.fade_ms);
        }

        (audio, placement)
    }
}
