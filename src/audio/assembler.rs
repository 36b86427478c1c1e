//! Reassembly of decoded transport packets into fixed-size frames.

use super::frame::{Frame, extend_le};
use super::stream_decoder::StreamDecoder;

/// What happened to one incoming packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Stopped with no frame in progress; the packet was not decoded.
    Discarded,
    /// Decoding produced no samples; the buffer is unchanged.
    Malformed,
    /// Samples were appended; the frame is still incomplete.
    Buffered,
    /// The packet completed a frame.
    Completed(Frame),
}

/// Accumulates `packets_per_frame` decoded packets per frame.
///
/// Once a frame has started it is always finished, even if streaming stops
/// in between, so the decoder state and the frame stay consistent.
pub struct FrameAssembler<D: StreamDecoder> {
    decoder: D,
    buffer: Vec<u8>,
    n_buffer: usize,
    packets_per_frame: usize,
    frame_bytes: usize,
}

impl<D: StreamDecoder> FrameAssembler<D> {
    pub fn new(decoder: D, packets_per_frame: usize) -> Self {
        let frame_bytes = decoder.samples_per_packet() * packets_per_frame * 2;
        Self {
            decoder,
            buffer: Vec::with_capacity(frame_bytes),
            n_buffer: 0,
            packets_per_frame,
            frame_bytes,
        }
    }

    /// Packets already buffered toward the current frame.
    pub fn pending_packets(&self) -> usize {
        self.n_buffer
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Feed one packet. `streaming` is the stream state observed for it.
    pub fn push_packet(&mut self, packet: &[u8], streaming: bool) -> PacketOutcome {
        if !streaming && self.n_buffer == 0 {
            return PacketOutcome::Discarded;
        }

        let samples = self.decoder.decode(packet);
        if samples.is_empty() {
            return PacketOutcome::Malformed;
        }

        extend_le(&mut self.buffer, &samples);
        self.n_buffer += 1;

        if self.n_buffer < self.packets_per_frame {
            return PacketOutcome::Buffered;
        }

        let data = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.frame_bytes));
        self.n_buffer = 0;
        PacketOutcome::Completed(Frame::from_bytes(data))
    }
}
