//! # Transmitter
//!
//! Sends the current command to the drone on a fixed cadence, whether or
//! not the joystick moved. The drone treats a silent link as lost control,
//! so the stream doubles as a keep-alive.
//!
//! Each cycle: snapshot the [`SharedCommand`], encode a frame, write all 8
//! bytes, wait for the next tick. A write failure ends the task with
//! `Transmission`; there is no reconnect. Cancellation is only observed
//! between cycles, so a frame is never cut short.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::FrameSink;
use crate::control::state::SharedCommand;
use crate::error::{JoylinkError, Result};
use crate::protocol::frame::{decode, encode};

/// Cadence the stock drone firmware expects (50 Hz)
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(20);

/// Frames between status log messages (~5 s at 50 Hz)
pub const DEFAULT_LOG_INTERVAL_FRAMES: u64 = 250;

/// Counters reported when the transmitter stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitStats {
    pub frames_sent: u64,
}

/// Fixed-cadence frame transmitter.
pub struct Transmitter<S> {
    sink: S,
    state: SharedCommand,
    cadence: Duration,
    log_interval_frames: u64,
}

impl<S: FrameSink + 'static> Transmitter<S> {
    pub fn new(sink: S, state: SharedCommand, cadence: Duration) -> Self {
        Self {
            sink,
            state,
            cadence,
            log_interval_frames: DEFAULT_LOG_INTERVAL_FRAMES,
        }
    }

    /// Sets how many frames pass between status log lines.
    #[must_use]
    pub fn with_log_interval(mut self, frames: u64) -> Self {
        self.log_interval_frames = frames.max(1);
        self
    }

    /// Transmits until `cancel` fires or a write fails.
    ///
    /// # Errors
    ///
    /// Returns `Transmission` on the first failed write.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<TransmitStats> {
        let mut ticker = interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = TransmitStats::default();
        info!(
            "Transmitting control frames every {}ms",
            self.cadence.as_millis()
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let command = self.state.snapshot();
                    let frame = encode(&command);
                    debug_assert_eq!(decode(&frame).ok(), Some(command));

                    if let Err(e) = self.sink.send_frame(&frame).await {
                        warn!("Frame write failed after {} frames: {}", stats.frames_sent, e);
                        let _ = self.sink.close().await;
                        return Err(JoylinkError::Transmission(e.to_string()));
                    }

                    stats.frames_sent += 1;
                    if stats.frames_sent % self.log_interval_frames == 0 {
                        debug!("Sent {} frames, current {}", stats.frames_sent, command);
                    }
                }
            }
        }

        if let Err(e) = self.sink.close().await {
            debug!("Closing link failed: {}", e);
        }
        info!("Transmitter stopped after {} frames", stats.frames_sent);
        Ok(stats)
    }

    /// Spawns [`run`](Self::run) on the tokio runtime.
    pub fn spawn(self) -> TransmitterHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        TransmitterHandle { cancel, task }
    }
}

/// Handle to a spawned transmitter.
#[derive(Debug)]
pub struct TransmitterHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<TransmitStats>>,
}

impl TransmitterHandle {
    /// Resolves when the transmitter ends on its own, i.e. on failure.
    ///
    /// Cancel-safe; use it in a `select!` alongside the control cycle.
    pub async fn finished(&mut self) -> Result<TransmitStats> {
        join_result((&mut self.task).await)
    }

    /// Stops the transmitter after its current cycle and waits for it.
    pub async fn stop(self) -> Result<TransmitStats> {
        self.cancel.cancel();
        join_result(self.task.await)
    }

    /// True once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn join_result(
    joined: std::result::Result<Result<TransmitStats>, tokio::task::JoinError>,
) -> Result<TransmitStats> {
    joined.map_err(|e| JoylinkError::Transmission(format!("transmitter task failed: {}", e)))?
}
