//! # User Confirmation
//!
//! Blocking "operator acknowledged" signal used once, at the end of
//! calibration, after the drone's LED stops blinking.
//!
//! Lines are read on a dedicated OS thread and handed back over a oneshot
//! channel, so an abandoned wait never holds up runtime shutdown.

use std::io::BufRead;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{JoylinkError, Result};

/// Source of the operator's go-ahead.
#[async_trait]
pub trait Confirmation: Send {
    /// Waits until the operator acknowledges.
    async fn wait_for_ack(&mut self) -> Result<()>;
}

/// Waits for a line (Enter) on a reader, stdin by default.
pub struct LineConfirmation<R> {
    reader: Arc<Mutex<R>>,
    prompt: String,
}

impl LineConfirmation<std::io::BufReader<std::io::Stdin>> {
    /// Reads the acknowledgement from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> LineConfirmation<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            prompt: "Press Enter when the LED stops blinking".to_string(),
        }
    }

    /// Replaces the prompt logged before waiting.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[async_trait]
impl<R: BufRead + Send + 'static> Confirmation for LineConfirmation<R> {
    async fn wait_for_ack(&mut self) -> Result<()> {
        info!("{}", self.prompt);

        let (tx, rx) = oneshot::channel();
        let reader = Arc::clone(&self.reader);
        std::thread::Builder::new()
            .name("joylink-confirm".to_string())
            .spawn(move || {
                let mut line = String::new();
                let read = reader
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .read_line(&mut line);
                // Receiver is gone if the wait was abandoned
                let _ = tx.send(read);
            })
            .map_err(|e| {
                JoylinkError::Confirmation(format!("Failed to start input reader: {}", e))
            })?;

        let read = rx
            .await
            .map_err(|_| JoylinkError::Confirmation("input reader exited".to_string()))?
            .map_err(|e| JoylinkError::Confirmation(format!("Failed to read input: {}", e)))?;

        if read == 0 {
            return Err(JoylinkError::Confirmation(
                "input closed before confirmation".to_string(),
            ));
        }
        Ok(())
    }
}

/// Confirms immediately. For unattended rigs with `skip_confirmation`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn wait_for_ack(&mut self) -> Result<()> {
        warn!("Skipping operator confirmation");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use tokio_test::{assert_err, assert_ok};

    /// Blocks every read until the paired sender is dropped, like an idle terminal.
    struct IdleTerminal(mpsc::Receiver<()>);

    impl Read for IdleTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    fn lines(input: &str) -> Cursor<Vec<u8>> {
        Cursor::new(input.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_line_confirmation_accepts_enter() {
        let mut confirm = LineConfirmation::new(lines("\n"));
        assert_ok!(confirm.wait_for_ack().await);
    }

    #[tokio::test]
    async fn test_line_confirmation_accepts_any_line() {
        let mut confirm = LineConfirmation::new(lines("ok\nsecond\n")).with_prompt("go?");
        assert_ok!(confirm.wait_for_ack().await);
        assert_ok!(confirm.wait_for_ack().await);
    }

    #[tokio::test]
    async fn test_line_confirmation_eof_is_error() {
        let mut confirm = LineConfirmation::new(lines(""));
        match confirm.wait_for_ack().await {
            Err(JoylinkError::Confirmation(msg)) => assert!(msg.contains("closed")),
            other => panic!("Expected Confirmation error, got: {:?}", other),
        }
    }

    #[test]
    fn test_abandoned_wait_does_not_hold_up_runtime_shutdown() {
        let (keep_idle, idle) = mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut confirm = LineConfirmation::new(std::io::BufReader::new(IdleTerminal(idle)));
            let waited =
                tokio::time::timeout(Duration::from_millis(50), confirm.wait_for_ack()).await;
            assert!(waited.is_err(), "Idle terminal should not confirm");
        });

        let started = Instant::now();
        drop(runtime);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "Runtime shutdown took {:?}",
            started.elapsed()
        );

        drop(keep_idle);
    }

    #[tokio::test]
    async fn test_auto_confirm() {
        assert_ok!(AutoConfirm.wait_for_ack().await);
    }

    #[tokio::test]
    async fn test_signal_confirmation() {
        let (tx, mut confirm) = mocks::SignalConfirmation::new();
        tx.send(()).unwrap();
        assert_ok!(confirm.wait_for_ack().await);
        assert_err!(confirm.wait_for_ack().await);
    }
}
