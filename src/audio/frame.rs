//! Fixed-duration PCM frames handed to the consumer.

use anyhow::{Result, ensure};
use bytes::Bytes;

use super::adpcm::SAMPLES_PER_PACKET;

/// Frame geometry derived from the stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
}

impl FrameFormat {
    /// Validate a sample rate / duration pair.
    pub fn new(sample_rate: u32, frame_duration_ms: u32) -> Result<Self> {
        ensure!(sample_rate > 0, "sample rate must be positive");
        ensure!(frame_duration_ms > 0, "frame duration must be positive");
        ensure!(
            (sample_rate as u64 * frame_duration_ms as u64) % 1000 == 0,
            "{} Hz x {} ms is not a whole number of samples",
            sample_rate,
            frame_duration_ms
        );
        Ok(Self { sample_rate, frame_duration_ms })
    }

    /// Mono samples per frame.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    /// Bytes per frame (16-bit samples).
    pub fn frame_byte_length(&self) -> usize {
        self.samples_per_frame() * 2
    }

    /// Number of wearable packets that make up one frame.
    pub fn packets_per_frame(&self) -> Result<usize> {
        let samples = self.samples_per_frame();
        ensure!(
            samples % SAMPLES_PER_PACKET == 0,
            "{} samples per frame is not a multiple of the {}-sample packet",
            samples,
            SAMPLES_PER_PACKET
        );
        Ok(samples / SAMPLES_PER_PACKET)
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self { sample_rate: 16000, frame_duration_ms: 20 }
    }
}

/// One frame of mono 16-bit little-endian PCM.
///
/// Cloning is cheap; the bytes are shared and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub(crate) fn from_bytes(data: Vec<u8>) -> Self {
        Self { data: Bytes::from(data) }
    }

    /// Build a frame from samples, serialized little-endian.
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        extend_le(&mut data, samples);
        Self::from_bytes(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate the frame as samples.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Root-mean-square level normalized to `[0.0, 1.0]`.
    pub fn rms(&self) -> f32 {
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for s in self.samples() {
            let n = s as f64 / i16::MAX as f64;
            sum_sq += n * n;
            count += 1;
        }
        if count == 0 {
            return 0.0;
        }
        ((sum_sq / count as f64).sqrt() as f32).clamp(0.0, 1.0)
    }
}

/// Append samples to `buf` as little-endian bytes.
pub(crate) fn extend_le(buf: &mut Vec<u8>, samples: &[i16]) {
    for s in samples {
        buf.extend_from_slice(&s.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let fmt = FrameFormat::default();
        assert_eq!(fmt.samples_per_frame(), 320);
        assert_eq!(fmt.frame_byte_length(), 640);
        assert_eq!(fmt.packets_per_frame().unwrap(), 8);
    }

    #[test]
    fn test_rejects_uneven_geometry() {
        assert!(FrameFormat::new(0, 20).is_err());
        assert!(FrameFormat::new(16000, 0).is_err());
        assert!(FrameFormat::new(11025, 10).is_err());
        // 8000 Hz x 10 ms = 80 samples = 2 packets
        assert_eq!(FrameFormat::new(8000, 10).unwrap().packets_per_frame().unwrap(), 2);
        // 16000 Hz x 5 ms = 80 samples, fine; 16000 x 1 ms = 16 samples, not packet aligned
        assert!(FrameFormat::new(16000, 1).unwrap().packets_per_frame().is_err());
    }

    #[test]
    fn test_samples_are_little_endian() {
        let frame = Frame::from_samples(&[0x0102, -2]);
        assert_eq!(frame.as_bytes(), &[0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(frame.samples().collect::<Vec<_>>(), vec![0x0102, -2]);
    }

    #[test]
    fn test_rms() {
        assert_eq!(Frame::from_samples(&[0; 8]).rms(), 0.0);
        let full = Frame::from_samples(&[i16::MAX; 8]).rms();
        assert!((full - 1.0).abs() < 1e-6);
        assert_eq!(Frame::from_bytes(Vec::new()).rms(), 0.0);
    }
}
