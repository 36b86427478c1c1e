//! audio - Wearable and microphone ingest into fixed-size PCM frames
//!
//! The wearable path decodes 4-bit ADPCM packets on a polling worker thread.
//! The microphone path takes PCM from a driver callback. Both push frames
//! of the same size into one queue owned by the `StreamController`.

pub mod adpcm;
#[cfg(feature = "alsa")]
mod alsa_device;
mod assembler;
#[cfg(any(feature = "alsa", test))]
mod capture;
mod controller;
pub mod driver;
mod frame;
mod microphone;
mod queue;
mod state;
pub mod stream_decoder;
pub mod transport;
mod wearable;

pub use adpcm::{AdpcmDecoder, QuantizerState};
#[cfg(feature = "alsa")]
pub use alsa_device::AlsaDriver;
pub use assembler::{FrameAssembler, PacketOutcome};
pub use controller::{AudioSource, StreamConfig, StreamController};
pub use driver::{AudioCallback, AudioDriver, CaptureRequest, DriverStream};
pub use frame::{Frame, FrameFormat};
pub use queue::{OutputQueue, StatsSnapshot, StreamStats};
pub use state::StreamState;
pub use stream_decoder::StreamDecoder;
pub use transport::{ChannelTransport, Transport, UdpTransport};
