use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::buffer::AudioBuffer;

// @module: WAV reading and writing

/// Read a WAV file into a mono buffer.
///
/// Integer and float encodings are accepted; multi-channel audio is averaged
/// down to a single channel.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(AudioBuffer::from_samples(mono, spec.sample_rate))
}

/// Duration of a WAV file from its header, without decoding samples
pub fn wav_duration_ms<P: AsRef<Path>>(path: P) -> Result<u64, hound::Error> {
    let reader = WavReader::open(path)?;
    let rate = reader.spec().sample_rate.max(1) as u64;
    Ok(reader.duration() as u64 * 1000 / rate)
}

/// Write a buffer as 16-bit PCM mono, clamping samples to [-1.0, 1.0]
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in buffer.samples() {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()
}
