//! Normalizes a local microphone and a wearable's ADPCM link into one
//! stream of fixed-duration 16-bit mono PCM frames.

pub mod audio;
pub mod config;

pub use audio::{AudioSource, Frame, StreamConfig, StreamController, StreamState};
