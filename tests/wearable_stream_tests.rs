//! Wearable path, end to end through the controller.

use std::time::{Duration, Instant};

use anyhow::Result;
use audio_stream_rs::audio::{
    AdpcmDecoder, AudioSource, ChannelTransport, StatsSnapshot, StreamConfig, StreamController,
    StreamState, Transport,
};
use crossbeam_channel::Sender;

const PACKET: [u8; 20] = [0x3A; 20];
const NO_FRAME_WAIT: Duration = Duration::from_millis(200);
const FRAME_WAIT: Duration = Duration::from_secs(2);

fn wearable_controller() -> (Sender<Vec<u8>>, StreamController) {
    wearable_controller_with(StreamConfig::default())
}

fn wearable_controller_with(config: StreamConfig) -> (Sender<Vec<u8>>, StreamController) {
    let (tx, transport) = ChannelTransport::pair();
    let config = StreamConfig {
        poll_timeout: Duration::from_millis(20),
        join_timeout: Duration::from_secs(1),
        ..config
    };
    let controller =
        StreamController::new(AudioSource::WearableDevice(Box::new(transport)), config).unwrap();
    (tx, controller)
}

fn send(tx: &Sender<Vec<u8>>, count: usize) {
    for _ in 0..count {
        tx.send(PACKET.to_vec()).unwrap();
    }
}

/// Wait until the worker has handled everything the test sent.
fn wait_for(controller: &StreamController, done: impl Fn(&StatsSnapshot) -> bool) {
    let deadline = Instant::now() + FRAME_WAIT;
    while !done(&controller.stats()) {
        assert!(Instant::now() < deadline, "worker stalled: {:?}", controller.stats());
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_initial_state_is_stopped() {
    let (_tx, controller) = wearable_controller();
    assert_eq!(controller.state(), StreamState::Stopped);
    assert_eq!(controller.frame_format().frame_byte_length(), 640);
    controller.destroy().unwrap();
}

#[test]
fn test_eight_packets_one_frame() {
    let (tx, mut controller) = wearable_controller();
    controller.start_stream().unwrap();
    assert_eq!(controller.state(), StreamState::Streaming);

    send(&tx, 8);
    let frame = controller.read_timeout(FRAME_WAIT).expect("one frame");
    assert_eq!(frame.len(), 640);

    // the 9th packet only starts a new buffer
    send(&tx, 1);
    wait_for(&controller, |s| s.packets_decoded == 9);
    assert_eq!(controller.read_timeout(NO_FRAME_WAIT), None);

    send(&tx, 7);
    let frame = controller.read().unwrap();
    assert_eq!(frame.len(), 640);
    assert_eq!(controller.stats().frames_pushed, 2);

    controller.destroy().unwrap();
}

#[test]
fn test_custom_geometry_four_packets_per_frame() {
    // 8 kHz x 10 ms = 80 samples = 2 packets, 160 bytes
    let (tx, mut controller) = wearable_controller_with(StreamConfig {
        sample_rate: 8000,
        frame_duration_ms: 10,
        frame_per_seconds: 100,
        ..StreamConfig::default()
    });
    assert_eq!(controller.frame_format().frame_byte_length(), 160);
    controller.start_stream().unwrap();

    send(&tx, 4);
    for _ in 0..2 {
        let frame = controller.read_timeout(FRAME_WAIT).expect("frame");
        assert_eq!(frame.len(), 160);
    }
    assert_eq!(controller.read_timeout(NO_FRAME_WAIT), None);
    assert_eq!(controller.stats().frames_pushed, 2);

    controller.destroy().unwrap();
}

#[test]
fn test_frame_contents_match_decoder() {
    let (tx, mut controller) = wearable_controller();
    controller.start_stream().unwrap();
    send(&tx, 8);
    let frame = controller.read_timeout(FRAME_WAIT).unwrap();

    let mut reference = AdpcmDecoder::new();
    let expected: Vec<i16> = (0..8).flat_map(|_| reference.unpack_packet(&PACKET)).collect();
    assert_eq!(frame.samples().collect::<Vec<_>>(), expected);

    controller.destroy().unwrap();
}

#[test]
fn test_stopped_packets_are_discarded() {
    let (tx, controller) = wearable_controller();
    send(&tx, 16);
    wait_for(&controller, |s| s.packets_discarded == 16);
    assert_eq!(controller.read_timeout(NO_FRAME_WAIT), None);
    assert_eq!(controller.stats().packets_decoded, 0);
    controller.destroy().unwrap();
}

#[test]
fn test_stop_finishes_in_flight_frame() {
    let (tx, mut controller) = wearable_controller();
    controller.start_stream().unwrap();
    send(&tx, 3);
    wait_for(&controller, |s| s.packets_decoded == 3);

    controller.stop_stream().unwrap();
    assert_eq!(controller.state(), StreamState::Stopped);

    send(&tx, 5);
    let frame = controller.read_timeout(FRAME_WAIT).expect("in-flight frame completed");
    assert_eq!(frame.len(), 640);

    // nothing is in progress now, so these are dropped
    send(&tx, 8);
    wait_for(&controller, |s| s.packets_discarded == 8);
    assert_eq!(controller.read_timeout(NO_FRAME_WAIT), None);

    controller.destroy().unwrap();
}

#[test]
fn test_quantizer_state_survives_restart() {
    let (tx, mut controller) = wearable_controller();
    let mut reference = AdpcmDecoder::new();

    controller.start_stream().unwrap();
    send(&tx, 8);
    controller.read_timeout(FRAME_WAIT).unwrap();
    for _ in 0..8 {
        reference.unpack_packet(&PACKET);
    }

    controller.stop_stream().unwrap();
    controller.start_stream().unwrap();
    // idempotent
    controller.start_stream().unwrap();

    send(&tx, 8);
    let frame = controller.read_timeout(FRAME_WAIT).unwrap();
    let expected: Vec<i16> = (0..8).flat_map(|_| reference.unpack_packet(&PACKET)).collect();
    assert_eq!(frame.samples().collect::<Vec<_>>(), expected);

    controller.destroy().unwrap();
}

#[test]
fn test_malformed_packet_is_skipped() {
    let (tx, mut controller) = wearable_controller();
    controller.start_stream().unwrap();

    send(&tx, 4);
    tx.send(vec![0x11; 19]).unwrap();
    tx.send(Vec::new()).unwrap();
    send(&tx, 4);

    let frame = controller.read_timeout(FRAME_WAIT).unwrap();
    assert_eq!(frame.len(), 640);
    let stats = controller.stats();
    assert_eq!(stats.packets_malformed, 2);
    assert_eq!(stats.packets_decoded, 8);

    controller.destroy().unwrap();
}

#[test]
fn test_clear_drops_pending_frames() {
    let (tx, mut controller) = wearable_controller();
    assert_eq!(controller.clear(), 0);

    controller.start_stream().unwrap();
    send(&tx, 16);
    wait_for(&controller, |s| s.frames_pushed == 2);
    assert_eq!(controller.pending(), 2);

    assert_eq!(controller.clear(), 2);
    assert_eq!(controller.pending(), 0);
    assert_eq!(controller.read_timeout(NO_FRAME_WAIT), None);

    // only a genuinely new frame comes back
    send(&tx, 8);
    let mut reference = AdpcmDecoder::new();
    for _ in 0..16 {
        reference.unpack_packet(&PACKET);
    }
    let expected: Vec<i16> = (0..8).flat_map(|_| reference.unpack_packet(&PACKET)).collect();
    let frame = controller.read_timeout(FRAME_WAIT).unwrap();
    assert_eq!(frame.samples().collect::<Vec<_>>(), expected);

    controller.destroy().unwrap();
}

#[test]
fn test_destroy_is_bounded() {
    let (_tx, mut controller) = wearable_controller();
    controller.start_stream().unwrap();
    let started = Instant::now();
    controller.destroy().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_destroy_with_closed_transport() {
    let (tx, controller) = wearable_controller();
    drop(tx);
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    controller.destroy().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// Transport whose poll overruns its timeout, like a wedged device read.
struct StuckTransport {
    stall: Duration,
}

impl Transport for StuckTransport {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        std::thread::sleep(self.stall);
        Ok(false)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        unreachable!("poll never reports data")
    }
}

#[test]
fn test_destroy_reports_detached_worker() {
    let config = StreamConfig {
        join_timeout: Duration::from_millis(50),
        ..StreamConfig::default()
    };
    let transport = StuckTransport {
        stall: Duration::from_millis(500),
    };
    let controller =
        StreamController::new(AudioSource::WearableDevice(Box::new(transport)), config).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    assert!(controller.destroy().is_err());
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn test_unaligned_frame_geometry_is_rejected() {
    let (_tx, transport) = ChannelTransport::pair();
    // 16 kHz x 1 ms = 16 samples, not a whole number of 40-sample packets
    let config = StreamConfig {
        frame_duration_ms: 1,
        frame_per_seconds: 1000,
        ..StreamConfig::default()
    };
    let result = StreamController::new(AudioSource::WearableDevice(Box::new(transport)), config);
    assert!(result.is_err());
}
