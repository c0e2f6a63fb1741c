/*!
 * Time-stretching to an exact output length.
 *
 * Two deterministic algorithms are available:
 * - `Resample`: plain linear-interpolation resampling. Speed and pitch
 *   change together, like playing a tape faster.
 * - `OverlapAdd`: windowed overlap-add. Frames are read from the input with
 *   a wider hop than they are written, which shortens the clip while keeping
 *   its pitch.
 *
 * Both always return exactly the requested number of samples.
 */

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use super::buffer::{interpolate_to_len, AudioBuffer};

/// Frame length of the overlap-add stretcher, in milliseconds
const OLA_FRAME_MS: u64 = 40;

/// Time-stretch algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StretchMode {
    /// Change speed and pitch together
    Resample,
    /// Change speed while keeping pitch
    #[default]
    OverlapAdd,
}

/// Stretch (or squeeze) `buffer` so it holds exactly `target_len` samples
pub fn stretch_to_len(buffer: &AudioBuffer, target_len: usize, mode: StretchMode) -> AudioBuffer {
    let rate = buffer.sample_rate();

    if buffer.len() == target_len {
        return buffer.clone();
    }

    let samples = match mode {
        StretchMode::Resample => interpolate_to_len(buffer.samples(), target_len),
        StretchMode::OverlapAdd => {
            let frame = ola_frame_len(rate);
            if buffer.len() < frame * 2 || target_len < frame * 2 {
                // Too short for windowed frames to overlap meaningfully
                interpolate_to_len(buffer.samples(), target_len)
            } else {
                overlap_add(buffer.samples(), target_len, frame)
            }
        }
    };

    AudioBuffer::from_samples(samples, rate)
}

fn ola_frame_len(sample_rate: u32) -> usize {
    let len = (OLA_FRAME_MS * sample_rate as u64 / 1000) as usize;
    // even length keeps the half-frame hop exact
    (len.max(64) / 2) * 2
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / len as f32).cos())
        .collect()
}

fn overlap_add(input: &[f32], target_len: usize, frame: usize) -> Vec<f32> {
    let synthesis_hop = frame / 2;
    let analysis_hop = synthesis_hop as f64 * input.len() as f64 / target_len as f64;
    let window = hann_window(frame);

    let mut output = vec![0.0_f32; target_len + frame];
    let mut weights = vec![0.0_f32; target_len + frame];

    let mut k = 0usize;
    loop {
        let out_pos = k * synthesis_hop;
        if out_pos >= target_len {
            break;
        }
        let in_pos = (k as f64 * analysis_hop).round() as usize;

        for n in 0..frame {
            let src = input.get(in_pos + n).copied().unwrap_or(0.0);
            output[out_pos + n] += src * window[n];
            weights[out_pos + n] += window[n];
        }
        k += 1;
    }

    output.truncate(target_len);
    for (sample, weight) in output.iter_mut().zip(weights.iter()) {
        if *weight > 1e-3 {
            *sample /= *weight;
        }
    }
    output
}
