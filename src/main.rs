use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use audio_stream_rs::audio::{AudioSource, StreamController, UdpTransport};
use audio_stream_rs::config::{Config, SourceKind};
use tokio::signal;

/// What the reader thread reports back to the main loop.
#[derive(Default)]
struct ReadProgress {
    frames: AtomicU64,
    // f32 bits of the last frame's RMS level
    level: AtomicU32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new()?;
    log::info!(
        "{} {} — source: {:?}",
        config.app_name,
        config.app_version,
        config.source
    );

    let source = build_source(&config)?;
    let mut controller = StreamController::new(source, config.stream_config())?;
    controller.start_stream()?;

    let controller = Arc::new(controller);
    let running = Arc::new(AtomicBool::new(true));
    let progress = Arc::new(ReadProgress::default());

    // read() blocks, so the consumer lives on the blocking pool
    let reader = {
        let controller = controller.clone();
        let running = running.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || read_loop(&controller, &running, &progress))
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            _ = ticker.tick() => {
                let stats = controller.stats();
                let level = f32::from_bits(progress.level.load(Ordering::Relaxed));
                log::info!(
                    "frames read={} pushed={} dropped={} | packets decoded={} discarded={} malformed={} | level={:.3}",
                    progress.frames.load(Ordering::Relaxed),
                    stats.frames_pushed,
                    stats.frames_dropped_clearing,
                    stats.packets_decoded,
                    stats.packets_discarded,
                    stats.packets_malformed,
                    level,
                );
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    reader.await.context("Reader task panicked")?;

    let mut controller =
        Arc::try_unwrap(controller).map_err(|_| anyhow!("Controller is still shared"))?;
    controller.stop_stream()?;
    let dropped = controller.clear();
    if dropped > 0 {
        log::info!("Discarded {} unread frames", dropped);
    }
    controller.destroy()?;

    Ok(())
}

fn build_source(config: &Config) -> Result<AudioSource> {
    match config.source {
        SourceKind::Wearable => {
            let transport = UdpTransport::bind(config.transport_addr())?;
            Ok(AudioSource::WearableDevice(Box::new(transport)))
        }
        SourceKind::Microphone => microphone_source(config),
    }
}

#[cfg(feature = "alsa")]
fn microphone_source(config: &Config) -> Result<AudioSource> {
    Ok(AudioSource::Microphone(Box::new(
        audio_stream_rs::audio::AlsaDriver::new(config.capture_device),
    )))
}

#[cfg(not(feature = "alsa"))]
fn microphone_source(_config: &Config) -> Result<AudioSource> {
    anyhow::bail!("Microphone source requires building with the `alsa` feature")
}

fn read_loop(controller: &StreamController, running: &AtomicBool, progress: &ReadProgress) {
    let frame_bytes = controller.frame_format().frame_byte_length();
    while running.load(Ordering::Relaxed) {
        // bounded wait so shutdown is noticed
        let Some(frame) = controller.read_timeout(Duration::from_millis(100)) else {
            continue;
        };
        debug_assert_eq!(frame.len(), frame_bytes);
        progress.frames.fetch_add(1, Ordering::Relaxed);
        progress.level.store(frame.rms().to_bits(), Ordering::Relaxed);
    }
}
