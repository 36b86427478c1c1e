//! Transports that deliver compressed packets from the wearable.
//!
//! A transport hands over discrete packets; it does no framing of its own.
//! The ingest worker calls `poll` with a bounded timeout and, when it
//! returns true, `receive` exactly once.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

pub trait Transport: Send {
    /// Wait up to `timeout` for a packet. `Ok(true)` means `receive` will not block.
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Take the packet announced by the last successful `poll`.
    fn receive(&mut self) -> Result<Vec<u8>>;
}

/// In-process transport backed by a channel.
pub struct ChannelTransport {
    rx: Receiver<Vec<u8>>,
    pending: Option<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self { rx, pending: None }
    }

    /// Create a transport plus the sender the packet source writes to.
    pub fn pair() -> (Sender<Vec<u8>>, Self) {
        let (tx, rx) = unbounded();
        (tx, Self::new(rx))
    }
}

impl Transport for ChannelTransport {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => {
                self.pending = Some(packet);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Packet channel closed")),
        }
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        if let Some(packet) = self.pending.take() {
            return Ok(packet);
        }
        self.rx.try_recv().context("No packet available on channel")
    }
}

/// One datagram per packet, e.g. from a BLE bridge process on the same host.
pub struct UdpTransport {
    socket: UdpSocket,
    buf: [u8; 2048],
    pending: Option<Vec<u8>>,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(addr).context("Failed to bind UDP transport socket")?;
        log::info!("UDP transport listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            buf: [0u8; 2048],
            pending: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpTransport {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        // a zero read timeout is rejected by the OS
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, _)) => {
                self.pending = Some(self.buf[..len].to_vec());
                Ok(true)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
            Err(e) => Err(e).context("UDP transport receive failed"),
        }
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        self.pending
            .take()
            .ok_or_else(|| anyhow!("receive called without a polled packet"))
    }
}
