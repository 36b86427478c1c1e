//! Command-driven capture thread for blocking PCM devices.
//!
//! The device lives on its own thread. Start and stop are acknowledged by
//! that thread after the device call has run, and only between periods, so
//! once `stop()` returns no further callback can happen.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};

use super::driver::{AudioCallback, DriverStream};

/// A blocking capture device as seen by the capture thread.
pub(crate) trait PcmCapture {
    /// Arm the device for reading; also used to recover after a read error.
    fn prepare(&mut self) -> Result<()>;

    /// Stop the device and discard whatever it has buffered.
    fn halt(&mut self) -> Result<()>;

    /// Block for one period and append its mono samples to `out`.
    fn read(&mut self, out: &mut Vec<i16>) -> Result<()>;
}

type Ack = Sender<Result<()>>;

enum Command {
    Start(Ack),
    Stop(Ack),
    Close,
}

/// Open a device on a named thread and return the stream that drives it.
///
/// `open` runs on the capture thread; its error is returned here.
pub(crate) fn spawn_capture<P, F>(
    name: &str,
    open: F,
    block: usize,
    callback: AudioCallback,
) -> Result<CaptureStream>
where
    P: PcmCapture,
    F: FnOnce() -> Result<P> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        let mut pcm = match open() {
            Ok(pcm) => pcm,
            Err(e) => {
                log::error!("Capture thread error: {:#}", e);
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));
        capture_loop(&mut pcm, block, callback, &cmd_rx);
        log::info!("Capture thread exiting");
    })?;

    ready_rx
        .recv()
        .context("Capture thread exited before opening the device")??;

    Ok(CaptureStream {
        cmd_tx,
        handle: Some(handle),
    })
}

fn capture_loop<P: PcmCapture>(
    pcm: &mut P,
    block: usize,
    mut callback: AudioCallback,
    cmd_rx: &Receiver<Command>,
) {
    let mut accum_buf: Vec<i16> = Vec::with_capacity(block * 2);
    let mut running = false;

    loop {
        // Stopped: block until told otherwise. Running: check between periods.
        let cmd = if running {
            match cmd_rx.try_recv() {
                Ok(cmd) => Some(cmd),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Command::Close),
            }
        } else {
            Some(cmd_rx.recv().unwrap_or(Command::Close))
        };

        match cmd {
            Some(Command::Start(ack)) => {
                let result = if running { Ok(()) } else { pcm.prepare() };
                if result.is_ok() && !running {
                    accum_buf.clear();
                    running = true;
                }
                let _ = ack.send(result);
            }
            Some(Command::Stop(ack)) => {
                if running {
                    if let Err(e) = pcm.halt() {
                        log::warn!("Capture halt failed: {:#}", e);
                    }
                    running = false;
                }
                let _ = ack.send(Ok(()));
            }
            Some(Command::Close) => break,
            None => {}
        }

        if !running {
            continue;
        }

        match pcm.read(&mut accum_buf) {
            Ok(()) => {
                while accum_buf.len() >= block {
                    callback(&accum_buf[..block]);
                    accum_buf.drain(..block);
                }
            }
            Err(e) => {
                log::warn!("Capture error: {:#}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover capture: {:#}", e2);
                    break;
                }
            }
        }
    }
}

pub(crate) struct CaptureStream {
    cmd_tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureStream {
    /// Send a command and wait for the capture thread to carry it out.
    fn request(&self, cmd: fn(Ack) -> Command) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.cmd_tx
            .send(cmd(ack_tx))
            .map_err(|_| anyhow!("Capture thread is gone"))?;
        ack_rx
            .recv()
            .map_err(|_| anyhow!("Capture thread exited before acknowledging"))?
    }
}

impl DriverStream for CaptureStream {
    fn start(&mut self) -> Result<()> {
        self.request(Command::Start)
    }

    fn stop(&mut self) -> Result<()> {
        self.request(Command::Stop)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        let sent = self
            .cmd_tx
            .send(Command::Close)
            .map_err(|_| anyhow!("Capture thread is gone"));
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                bail!("Capture thread panicked");
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const BLOCK: usize = 40;

    /// Device that takes a few ms per period, like a real PCM read.
    #[derive(Clone, Default)]
    struct SlowPcm {
        reads: Arc<AtomicUsize>,
        fail_prepare: Arc<AtomicBool>,
        halted: Arc<AtomicBool>,
    }

    impl PcmCapture for SlowPcm {
        fn prepare(&mut self) -> Result<()> {
            if self.fail_prepare.load(Ordering::SeqCst) {
                bail!("device busy");
            }
            self.halted.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn halt(&mut self) -> Result<()> {
            self.halted.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn read(&mut self, out: &mut Vec<i16>) -> Result<()> {
            thread::sleep(Duration::from_millis(3));
            self.reads.fetch_add(1, Ordering::SeqCst);
            out.extend(std::iter::repeat_n(7, BLOCK / 2));
            Ok(())
        }
    }

    fn open(pcm: &SlowPcm) -> (Box<CaptureStream>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: AudioCallback = Box::new(move |samples: &[i16]| {
            assert_eq!(samples.len(), BLOCK);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let device = pcm.clone();
        let stream = spawn_capture("test-capture", move || Ok(device), BLOCK, callback).unwrap();
        (Box::new(stream), calls)
    }

    #[test]
    fn test_no_callback_after_stop_returns() {
        let pcm = SlowPcm::default();
        let (mut stream, calls) = open(&pcm);

        for _ in 0..20 {
            stream.start().unwrap();
            while calls.load(Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            stream.stop().unwrap();
            assert!(pcm.halted.load(Ordering::SeqCst));

            let after_stop = calls.load(Ordering::SeqCst);
            thread::sleep(Duration::from_millis(15));
            assert_eq!(calls.load(Ordering::SeqCst), after_stop);
            calls.store(0, Ordering::SeqCst);
        }

        stream.close().unwrap();
    }

    #[test]
    fn test_failed_prepare_is_reported_by_start() {
        let pcm = SlowPcm::default();
        pcm.fail_prepare.store(true, Ordering::SeqCst);
        let (mut stream, calls) = open(&pcm);

        assert!(stream.start().is_err());
        thread::sleep(Duration::from_millis(15));
        assert_eq!(pcm.reads.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // the thread survived and can still be started
        pcm.fail_prepare.store(false, Ordering::SeqCst);
        stream.start().unwrap();
        stream.stop().unwrap();
        stream.close().unwrap();
    }

    #[test]
    fn test_open_error_is_returned() {
        let result = spawn_capture::<SlowPcm, _>(
            "test-capture",
            || Err(anyhow!("no such device")),
            BLOCK,
            Box::new(|_: &[i16]| {}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_close_while_running_joins() {
        let pcm = SlowPcm::default();
        let (mut stream, _calls) = open(&pcm);
        stream.start().unwrap();
        stream.close().unwrap();
    }
}
