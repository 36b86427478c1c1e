//! Public lifecycle API over the two ingest paths.
//!
//! Real-time work stays on std threads (wearable worker, driver callback);
//! the controller itself only flips state and touches the queue, so every
//! call except `read()` returns promptly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use super::adpcm::AdpcmDecoder;
use super::assembler::FrameAssembler;
use super::driver::AudioDriver;
use super::frame::{Frame, FrameFormat};
use super::microphone::MicrophoneSource;
use super::queue::{OutputQueue, StatsSnapshot};
use super::state::{SharedStreamState, StreamState};
use super::transport::Transport;
use super::wearable::WearableWorker;

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// PCM sample rate of every emitted frame
    pub sample_rate: u32,
    /// Duration of one frame in ms
    pub frame_duration_ms: u32,
    /// Driver callback rate for the microphone path; must equal 1000 / frame_duration_ms
    pub frame_per_seconds: u32,
    /// How long the wearable worker blocks on the transport per poll
    pub poll_timeout: Duration,
    /// Upper bound on waiting for the wearable worker in `destroy()`
    pub join_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_duration_ms: 20,
            frame_per_seconds: 50,
            poll_timeout: Duration::from_secs(1),
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl StreamConfig {
    pub fn frame_format(&self) -> Result<FrameFormat> {
        FrameFormat::new(self.sample_rate, self.frame_duration_ms)
    }
}

/// Where the audio comes from, with what that source needs at construction.
pub enum AudioSource {
    Microphone(Box<dyn AudioDriver>),
    WearableDevice(Box<dyn Transport>),
}

impl AudioSource {
    fn name(&self) -> &'static str {
        match self {
            AudioSource::Microphone(_) => "microphone",
            AudioSource::WearableDevice(_) => "wearable",
        }
    }
}

enum Ingest {
    Microphone(MicrophoneSource),
    Wearable(WearableWorker),
}

pub struct StreamController {
    ingest: Ingest,
    state: Arc<SharedStreamState>,
    queue: Arc<OutputQueue>,
    format: FrameFormat,
    join_timeout: Duration,
}

impl StreamController {
    /// Build the controller in the `Stopped` state.
    ///
    /// For the wearable the ingest worker starts polling right away. For the
    /// microphone the driver stream is opened but not started. Any failure
    /// to acquire the driver or transport is returned here.
    pub fn new(source: AudioSource, config: StreamConfig) -> Result<Self> {
        let format = config.frame_format()?;
        let state = Arc::new(SharedStreamState::new());
        let queue = Arc::new(OutputQueue::new());

        log::info!(
            "StreamController starting — source: {}, rate: {}Hz, frame: {}ms / {} bytes",
            source.name(),
            format.sample_rate,
            format.frame_duration_ms,
            format.frame_byte_length(),
        );

        let ingest = match source {
            AudioSource::Microphone(mut driver) => Ingest::Microphone(MicrophoneSource::open(
                driver.as_mut(),
                format,
                config.frame_per_seconds,
                queue.clone(),
            )?),
            AudioSource::WearableDevice(transport) => {
                let assembler = FrameAssembler::new(AdpcmDecoder::new(), format.packets_per_frame()?);
                Ingest::Wearable(WearableWorker::spawn(
                    transport,
                    assembler,
                    state.clone(),
                    queue.clone(),
                    config.poll_timeout,
                )?)
            }
        };

        Ok(Self {
            ingest,
            state,
            queue,
            format,
            join_timeout: config.join_timeout,
        })
    }

    /// Begin emitting frames. Idempotent.
    ///
    /// The quantizer state is deliberately carried over from any previous
    /// run; restarting after a long pause resumes from the old prediction.
    pub fn start_stream(&mut self) -> Result<()> {
        if let Ingest::Microphone(mic) = &mut self.ingest {
            mic.start()?;
        }
        if !self.state.is_streaming() {
            log::info!("Streaming started");
        }
        self.state.set(StreamState::Streaming);
        Ok(())
    }

    /// Stop emitting frames. Idempotent. A wearable frame already in
    /// progress is still completed and queued.
    pub fn stop_stream(&mut self) -> Result<()> {
        if let Ingest::Microphone(mic) = &mut self.ingest {
            mic.stop()?;
        }
        if self.state.is_streaming() {
            log::info!("Streaming stopped");
        }
        self.state.set(StreamState::Stopped);
        Ok(())
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Discard every queued frame, including any a producer offers while
    /// the drain is running. Returns how many queued frames were dropped.
    pub fn clear(&self) -> usize {
        self.queue.clear()
    }

    /// Block until a frame is available and return it. No timeout.
    pub fn read(&self) -> Result<Frame> {
        self.queue.pop()
    }

    pub fn read_timeout(&self, timeout: Duration) -> Option<Frame> {
        self.queue.pop_timeout(timeout)
    }

    pub fn try_read(&self) -> Option<Frame> {
        self.queue.try_pop()
    }

    /// Frames waiting to be read.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.format
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.queue.stats().snapshot()
    }

    /// Stop everything and release the driver or transport.
    ///
    /// Consumes the controller, so nothing can be called afterwards. Fails
    /// if the wearable worker had to be detached after `join_timeout`.
    pub fn destroy(self) -> Result<()> {
        self.state.set(StreamState::Stopped);
        match self.ingest {
            Ingest::Wearable(mut worker) => {
                if !worker.shutdown(self.join_timeout) {
                    bail!(
                        "Wearable ingest worker still running after {:?}",
                        self.join_timeout
                    );
                }
            }
            Ingest::Microphone(mic) => mic.close()?,
        }
        log::info!("StreamController destroyed");
        Ok(())
    }
}
