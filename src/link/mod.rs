//! # Drone Link Module
//!
//! Handles the TCP control connection to the drone.
//!
//! This module handles:
//! - Connecting once to the drone's control port (no reconnect)
//! - Disabling Nagle so every 8-byte frame leaves immediately
//! - Writing frames through the [`FrameSink`] seam
//! - The fixed-cadence [`transmitter`] task

pub mod transmitter;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{JoylinkError, Result};

/// Default drone address (the drone's own access point)
pub const DEFAULT_ADDRESS: &str = "192.168.1.1";

/// Default control port
pub const DEFAULT_PORT: u16 = 8888;

/// Destination for encoded frames.
///
/// Implemented by [`DroneLink`] for the real TCP socket and by test doubles.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one complete frame.
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Flushes and closes the write side.
    async fn close(&mut self) -> io::Result<()>;
}

/// TCP control connection to the drone
pub struct DroneLink {
    stream: TcpStream,
    peer: String,
}

impl std::fmt::Debug for DroneLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DroneLink")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl DroneLink {
    /// Connect to the drone's control port
    ///
    /// Makes a single attempt bounded by `timeout`.
    ///
    /// # Arguments
    ///
    /// * `address` - Drone IP address or hostname
    /// * `port` - Control port (8888 on the stock firmware)
    /// * `timeout` - Upper bound for the connect attempt
    ///
    /// # Errors
    ///
    /// Returns `Connect` if the connection is refused, times out, or
    /// `TCP_NODELAY` cannot be set.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use joylink::link::DroneLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = DroneLink::connect("192.168.1.1", 8888, Duration::from_secs(3)).await?;
    ///     println!("Connected to {}", link.peer());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = format!("{}:{}", address, port);
        debug!("Connecting to {}", peer);

        let connect_err = |source: io::Error| JoylinkError::Connect {
            addr: peer.clone(),
            source,
        };

        let stream = tokio::time::timeout(timeout, TcpStream::connect(peer.as_str()))
            .await
            .map_err(|_| {
                connect_err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {}ms", timeout.as_millis()),
                ))
            })?
            .map_err(connect_err)?;

        stream.set_nodelay(true).map_err(connect_err)?;

        info!("Connected to drone at {}", peer);
        Ok(Self { stream, peer })
    }

    /// Address of the connected drone.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

#[async_trait]
impl FrameSink for DroneLink {
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.stream.flush().await?;
        self.stream.shutdown().await
    }
}
