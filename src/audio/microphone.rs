//! Microphone ingest: adapts a driver callback to the frame queue.

use std::sync::Arc;

use anyhow::{Result, ensure};

use super::driver::{AudioCallback, AudioDriver, CaptureRequest, DriverStream};
use super::frame::{Frame, FrameFormat};
use super::queue::OutputQueue;

pub struct MicrophoneSource {
    stream: Box<dyn DriverStream>,
    started: bool,
}

impl MicrophoneSource {
    /// Open (but do not start) a driver stream that pushes every callback
    /// buffer to `queue` as one frame.
    pub fn open(
        driver: &mut dyn AudioDriver,
        format: FrameFormat,
        frame_per_seconds: u32,
        queue: Arc<OutputQueue>,
    ) -> Result<Self> {
        ensure!(
            frame_per_seconds as u64 * format.frame_duration_ms as u64 == 1000,
            "{} frames/s does not match {} ms frames",
            frame_per_seconds,
            format.frame_duration_ms
        );

        let request = CaptureRequest {
            sample_rate: format.sample_rate,
            samples_per_callback: format.samples_per_frame(),
            callbacks_per_second: frame_per_seconds,
        };
        let stream = driver.open_stream(request, frame_callback(request.samples_per_callback, queue))?;

        Ok(Self {
            stream,
            started: false,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        if !self.started {
            self.stream.start()?;
            self.started = true;
            log::info!("Microphone stream started");
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.started {
            self.stream.stop()?;
            self.started = false;
            log::info!("Microphone stream stopped");
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        if let Err(e) = self.stop() {
            log::warn!("Failed to stop microphone stream before close: {:#}", e);
        }
        self.stream.close()
    }
}

fn frame_callback(samples_per_frame: usize, queue: Arc<OutputQueue>) -> AudioCallback {
    Box::new(move |samples: &[i16]| {
        // a short or long block would break the fixed frame size
        if samples.len() != samples_per_frame {
            log::warn!(
                "Dropping {}-sample driver block, expected {}",
                samples.len(),
                samples_per_frame
            );
            return;
        }
        queue.push(Frame::from_samples(samples));
    })
}
