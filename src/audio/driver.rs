//! Boundary to the platform audio driver that feeds the microphone path.

use anyhow::Result;

/// Invoked by the driver with one block of mono samples. Runs on the
/// driver's own thread and must not block.
pub type AudioCallback = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// What the microphone path asks the driver for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub sample_rate: u32,
    /// Samples handed to each callback invocation.
    pub samples_per_callback: usize,
    pub callbacks_per_second: u32,
}

pub trait AudioDriver {
    /// Open a capture stream in the stopped state with `callback` registered.
    fn open_stream(
        &mut self,
        request: CaptureRequest,
        callback: AudioCallback,
    ) -> Result<Box<dyn DriverStream>>;
}

/// An opened capture stream. The callback is never invoked while stopped.
pub trait DriverStream: Send + Sync {
    fn start(&mut self) -> Result<()>;

    /// Once this returns, the callback is not invoked again until `start`.
    fn stop(&mut self) -> Result<()>;

    /// Release the stream. Stops it first if needed.
    fn close(self: Box<Self>) -> Result<()>;
}
