//! Polling worker for the wearable path.
//!
//! Runs on a dedicated std::thread for the controller's whole lifetime, not
//! only while streaming: packets that arrive while stopped still have to be
//! discarded, or used to finish a frame already in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use super::assembler::{FrameAssembler, PacketOutcome};
use super::queue::OutputQueue;
use super::state::SharedStreamState;
use super::stream_decoder::StreamDecoder;
use super::transport::Transport;

pub struct WearableWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    // never sent on; disconnects when the worker thread exits
    exited: Receiver<()>,
}

impl WearableWorker {
    pub fn spawn<D: StreamDecoder + 'static>(
        mut transport: Box<dyn Transport>,
        mut assembler: FrameAssembler<D>,
        state: Arc<SharedStreamState>,
        queue: Arc<OutputQueue>,
        poll_timeout: Duration,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (exit_tx, exited) = bounded::<()>(1);

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("wearable-ingest".into())
                .spawn(move || {
                    let _exit_tx = exit_tx;
                    log::info!("Wearable ingest worker started");
                    ingest_loop(
                        transport.as_mut(),
                        &mut assembler,
                        &state,
                        &queue,
                        &running,
                        poll_timeout,
                    );
                    log::info!("Wearable ingest worker stopped");
                })?
        };

        Ok(Self {
            running,
            handle: Some(handle),
            exited,
        })
    }

    /// Signal the worker to stop and wait up to `join_timeout` for it.
    ///
    /// Returns false if the worker did not exit in time; it is then detached.
    pub fn shutdown(&mut self, join_timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.exited.recv_timeout(join_timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if handle.join().is_err() {
                    log::error!("Wearable ingest worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Wearable ingest worker did not exit within {:?}, detaching",
                    join_timeout
                );
                false
            }
        }
    }
}

impl Drop for WearableWorker {
    fn drop(&mut self) {
        // Stop without waiting; an explicit shutdown() has already joined.
        self.running.store(false, Ordering::SeqCst);
    }
}

fn ingest_loop<D: StreamDecoder>(
    transport: &mut dyn Transport,
    assembler: &mut FrameAssembler<D>,
    state: &SharedStreamState,
    queue: &OutputQueue,
    running: &AtomicBool,
    poll_timeout: Duration,
) {
    let stats = queue.stats();

    while running.load(Ordering::Relaxed) {
        match transport.poll(poll_timeout) {
            Ok(true) => {}
            Ok(false) => {
                if state.is_streaming() {
                    log::warn!("No audio data from wearable while streaming");
                }
                continue;
            }
            Err(e) => {
                log::error!("Transport poll error: {:#}", e);
                // keep the stop flag responsive without spinning on a dead transport
                thread::sleep(poll_timeout);
                continue;
            }
        }

        let packet = match transport.receive() {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("Transport receive error: {:#}", e);
                continue;
            }
        };

        match assembler.push_packet(&packet, state.is_streaming()) {
            PacketOutcome::Discarded => stats.packet_discarded(),
            PacketOutcome::Malformed => {
                stats.packet_malformed();
                log::warn!("Skipping malformed {}-byte packet", packet.len());
            }
            PacketOutcome::Buffered => stats.packet_decoded(),
            PacketOutcome::Completed(frame) => {
                stats.packet_decoded();
                queue.push(frame);
            }
        }
    }
}
