//! 4-bit ADPCM decoder for the wearable's compressed audio link.
//!
//! Each transport packet carries 20 bytes = 40 nibble codes. Codes are
//! decoded low nibble first. The decoder keeps a running prediction and a
//! step-size index that adapt per code, so packets must be fed in arrival
//! order through a single decoder instance.

use super::stream_decoder::StreamDecoder;

/// Size of one compressed transport packet in bytes.
pub const PACKET_BYTES: usize = 20;

/// Samples produced by fully decoding one packet.
pub const SAMPLES_PER_PACKET: usize = PACKET_BYTES * 2;

/// Quantizer step sizes, indexed by `QuantizerState::index`.
pub const STEP_SIZE_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Step index adjustment, indexed by the 4-bit code.
pub const INDEX_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const MAX_INDEX: i32 = STEP_SIZE_TABLE.len() as i32 - 1;

/// Running decoder state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantizerState {
    /// Step-size index, always in `[0, 88]`.
    pub index: i32,
    /// Last reconstructed sample, always in `i16` range.
    pub predicted_sample: i32,
}

/// Stateful ADPCM decoder.
///
/// Not `Sync` by intent of use: one instance belongs to one ingest worker
/// and is moved into that worker's thread.
#[derive(Debug, Clone, Default)]
pub struct AdpcmDecoder {
    state: QuantizerState,
}

impl AdpcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit state instead of silence.
    pub fn with_state(state: QuantizerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> QuantizerState {
        self.state
    }

    /// Decode one 4-bit code into one sample. Only the low nibble of `code`
    /// is used.
    pub fn decode(&mut self, code: u8) -> i16 {
        let code = code & 0x0F;
        let step = STEP_SIZE_TABLE[self.state.index as usize];

        let mut diff = step >> 3;
        if code & 0x04 != 0 {
            diff += step;
        }
        if code & 0x02 != 0 {
            diff += step >> 1;
        }
        if code & 0x01 != 0 {
            diff += step >> 2;
        }

        if code & 0x08 != 0 {
            self.state.predicted_sample -= diff;
        } else {
            self.state.predicted_sample += diff;
        }
        self.state.predicted_sample = self
            .state
            .predicted_sample
            .clamp(i16::MIN as i32, i16::MAX as i32);

        self.state.index = (self.state.index + INDEX_TABLE[code as usize]).clamp(0, MAX_INDEX);

        self.state.predicted_sample as i16
    }

    /// Decode a whole transport packet into `SAMPLES_PER_PACKET` samples.
    ///
    /// A packet that is not exactly `PACKET_BYTES` long yields no samples and
    /// leaves the state untouched.
    pub fn unpack_packet(&mut self, packet: &[u8]) -> Vec<i16> {
        if packet.len() != PACKET_BYTES {
            return Vec::new();
        }

        let mut samples = Vec::with_capacity(SAMPLES_PER_PACKET);
        for &byte in packet {
            samples.push(self.decode(byte & 0x0F));
            samples.push(self.decode((byte >> 4) & 0x0F));
        }
        samples
    }
}

impl StreamDecoder for AdpcmDecoder {
    fn decode(&mut self, data: &[u8]) -> Vec<i16> {
        self.unpack_packet(data)
    }

    fn samples_per_packet(&self) -> usize {
        SAMPLES_PER_PACKET
    }
}
