//! ALSA capture driver for the microphone path.
//!
//! The PCM lives on its own capture thread. The thread reads one period at
//! a time and downmixes it to mono; the capture loop invokes the registered
//! callback once per full block, as a callback-style audio API would.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result, bail};

use super::capture::{PcmCapture, spawn_capture};
use super::driver::{AudioCallback, AudioDriver, CaptureRequest, DriverStream};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames (one frame = channels × sample_width)
    pub period_size: usize,
}

/// Open a PCM device for capture (recording).
pub fn open_capture(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, Direction::Capture, false)
        .with_context(|| format!("Failed to open PCM device '{}' for Capture", device))?;

    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    let (actual_rate, actual_channels, period_size) = {
        let hwp = pcm.hw_params_current()?;
        let rate = hwp.get_rate()?;
        let ch = hwp.get_channels()?;
        let ps = hwp.get_period_size()? as usize;
        (rate, ch, ps)
    };

    log::info!(
        "ALSA Capture: device={}, rate={}, channels={}, period_size={}",
        device,
        actual_rate,
        actual_channels,
        period_size,
    );

    Ok((
        pcm,
        AlsaParams {
            sample_rate: actual_rate,
            channels: actual_channels,
            period_size,
        },
    ))
}

/// Opens ALSA capture streams on a named device ("default", "plughw:0,0", ...).
pub struct AlsaDriver {
    device: String,
}

impl AlsaDriver {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into() }
    }
}

impl AudioDriver for AlsaDriver {
    fn open_stream(
        &mut self,
        request: CaptureRequest,
        callback: AudioCallback,
    ) -> Result<Box<dyn DriverStream>> {
        let device = self.device.clone();
        let stream = spawn_capture(
            "alsa-capture",
            move || AlsaCapture::open(&device, request),
            request.samples_per_callback,
            callback,
        )?;
        Ok(Box::new(stream))
    }
}

struct AlsaCapture {
    pcm: PCM,
    channels: usize,
    read_buf: Vec<i16>,
}

impl AlsaCapture {
    fn open(device: &str, request: CaptureRequest) -> Result<Self> {
        let (pcm, params) = open_capture(
            device,
            request.sample_rate,
            1,
            Some(request.samples_per_callback),
        )?;

        if params.sample_rate != request.sample_rate {
            bail!(
                "Device '{}' runs at {} Hz, {} Hz required (no resampling)",
                device,
                params.sample_rate,
                request.sample_rate
            );
        }

        let channels = params.channels as usize;
        Ok(Self {
            pcm,
            channels,
            read_buf: vec![0i16; params.period_size * channels],
        })
    }
}

impl PcmCapture for AlsaCapture {
    fn prepare(&mut self) -> Result<()> {
        Ok(self.pcm.prepare()?)
    }

    fn halt(&mut self) -> Result<()> {
        Ok(self.pcm.drop()?)
    }

    fn read(&mut self, out: &mut Vec<i16>) -> Result<()> {
        let io = self.pcm.io_i16()?;
        let frames = io.readi(&mut self.read_buf)?;
        // downmix interleaved → mono
        for frame in self.read_buf[..frames * self.channels].chunks_exact(self.channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            out.push((sum / self.channels as i32) as i16);
        }
        Ok(())
    }
}
