use std::borrow::Cow;

// @module: Mono sample buffer

/// Mono audio held as `f32` samples in [-1.0, 1.0] at a fixed sample rate.
///
/// Mixing is additive and is allowed to leave the nominal range; values are
/// clamped only when the buffer is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    // @field: PCM samples
    samples: Vec<f32>,

    // @field: Samples per second
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from raw samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Create a silent buffer lasting `duration_ms`
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let len = ms_to_samples(duration_ms, sample_rate);
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration rounded to the nearest millisecond
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }

    /// Number of samples covering `ms` at this buffer's rate
    pub fn ms_to_samples(&self, ms: u64) -> usize {
        ms_to_samples(ms, self.sample_rate)
    }

    /// Keep only the first `ms` milliseconds
    pub fn truncate_ms(&mut self, ms: u64) {
        let len = self.ms_to_samples(ms);
        self.samples.truncate(len);
    }

    /// Append trailing silence until the buffer lasts exactly `ms`.
    /// Longer buffers are left untouched.
    pub fn pad_to_ms(&mut self, ms: u64) {
        let len = self.ms_to_samples(ms);
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    /// Linear gain ramp from silence over the first `ms` milliseconds
    pub fn fade_in(&mut self, ms: u64) {
        let n = self.ms_to_samples(ms).min(self.samples.len());
        if n == 0 {
            return;
        }
        for (i, sample) in self.samples.iter_mut().take(n).enumerate() {
            *sample *= i as f32 / n as f32;
        }
    }

    /// Linear gain ramp to silence over the last `ms` milliseconds
    pub fn fade_out(&mut self, ms: u64) {
        let n = self.ms_to_samples(ms).min(self.samples.len());
        if n == 0 {
            return;
        }
        let start = self.samples.len() - n;
        for (i, sample) in self.samples[start..].iter_mut().enumerate() {
            *sample *= (n - 1 - i) as f32 / n as f32;
        }
    }

    /// Mix `other` into this buffer starting at `offset_ms`.
    ///
    /// Samples are summed. Anything that would land past the end of this
    /// buffer is dropped; the buffer never grows. A clip at a different
    /// sample rate is resampled first.
    pub fn overlay(&mut self, other: &AudioBuffer, offset_ms: u64) {
        let other: Cow<'_, AudioBuffer> = if other.sample_rate == self.sample_rate {
            Cow::Borrowed(other)
        } else {
            Cow::Owned(other.resampled(self.sample_rate))
        };

        let start = self.ms_to_samples(offset_ms);
        if start >= self.samples.len() {
            return;
        }

        for (dst, src) in self.samples[start..].iter_mut().zip(other.samples.iter()) {
            *dst += *src;
        }
    }

    /// Convert to another sample rate by linear interpolation
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        if target_rate == self.sample_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return AudioBuffer::from_samples(self.samples.clone(), target_rate);
        }

        let target_len = ((self.samples.len() as u64 * target_rate as u64) as f64
            / self.sample_rate as f64)
            .round() as usize;

        AudioBuffer::from_samples(
            interpolate_to_len(&self.samples, target_len),
            target_rate,
        )
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

/// Samples covering `ms` milliseconds at `sample_rate`
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Milliseconds covered by `len` samples, rounded to the nearest ms
pub fn samples_to_ms(len: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    ((len as f64 * 1000.0) / sample_rate as f64).round() as u64
}

/// Linear interpolation of `input` onto exactly `target_len` points, keeping
/// the first and last samples aligned.
pub(crate) fn interpolate_to_len(input: &[f32], target_len: usize) -> Vec<f32> {
    if target_len == 0 || input.is_empty() {
        return vec![0.0; target_len];
    }
    if input.len() == 1 || target_len == 1 {
        return vec![input[0]; target_len];
    }

    let step = (input.len() - 1) as f64 / (target_len - 1) as f64;
    (0..target_len)
        .map(|j| {
            let pos = j as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}
