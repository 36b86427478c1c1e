//! Packet decoder trait used by the wearable ingest path.

/// A decoder that turns one compressed transport packet into mono i16 PCM.
///
/// Decoders are stateful and owned by a single ingest worker. A packet the
/// decoder cannot handle yields an empty vector; it must not panic or
/// disturb the stream.
pub trait StreamDecoder: Send {
    /// Decode one packet into PCM samples.
    fn decode(&mut self, data: &[u8]) -> Vec<i16>;

    /// Samples produced by one well-formed packet.
    fn samples_per_packet(&self) -> usize;
}
