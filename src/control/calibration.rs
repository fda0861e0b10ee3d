//! # Calibration Sequencer
//!
//! One-shot startup sequence that the drone needs before it accepts flight
//! commands. It runs while the transmitter is already streaming frames:
//!
//! 1. **Hold**: write the calibration command (default `FB=255 LR=244 UD=0
//!    TURN=244`, flags cleared) and keep it for the dwell time (3.5 s).
//! 2. **Release**: center all four axes. Flags are left alone.
//! 3. **Confirm**: wait for the operator to acknowledge (LED stopped blinking).
//!
//! [`CalibrationSequencer::run`] consumes the sequencer and returns a
//! [`Calibrated`] token, which the input mapper requires before it starts.
//! A session can therefore calibrate at most once.

use std::time::Duration;

use tracing::info;

use super::state::{Command, SharedCommand};
use crate::confirm::Confirmation;
use crate::error::Result;

/// Default calibration dwell time.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(3500);

/// Calibration command observed on the stock controller app.
pub const DEFAULT_HOLD_COMMAND: Command = Command {
    forward_back: 255,
    left_right: 244,
    up_down: 0,
    turn: 244,
    flags: 0,
};

/// Phases of the calibration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Hold,
    Release,
    Confirm,
    Done,
}

/// Proof that calibration has completed.
///
/// Only [`CalibrationSequencer::run`] hands these out.
#[derive(Debug)]
pub struct Calibrated {
    _private: (),
}

impl Calibrated {
    /// Test-only shortcut for exercising the mapper without a calibration run.
    #[cfg(test)]
    pub(crate) fn assume() -> Self {
        Self { _private: () }
    }
}

/// Calibration command and dwell time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationPlan {
    /// Axis bytes held during the Hold phase; flags are always cleared
    pub hold: Command,
    /// How long the Hold phase lasts
    pub dwell: Duration,
}

impl Default for CalibrationPlan {
    fn default() -> Self {
        Self {
            hold: DEFAULT_HOLD_COMMAND,
            dwell: DEFAULT_DWELL,
        }
    }
}

/// Drives the Hold → Release → Confirm sequence.
#[derive(Debug)]
pub struct CalibrationSequencer {
    plan: CalibrationPlan,
    phase: CalibrationPhase,
}

impl CalibrationSequencer {
    #[must_use]
    pub fn new(plan: CalibrationPlan) -> Self {
        Self {
            plan,
            phase: CalibrationPhase::Hold,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Applies the Hold command (flags cleared).
    fn hold(&self, state: &SharedCommand) {
        let hold = Command {
            flags: 0,
            ..self.plan.hold
        };
        state.set(hold);
        info!(
            "Calibrating: holding {} for {}ms",
            hold,
            self.plan.dwell.as_millis()
        );
    }

    /// Centers the axes; flags are left alone.
    fn release(&self, state: &SharedCommand) {
        state.apply(Command::center_axes);
        info!("Calibration released, sticks centered");
    }

    /// Performs the current phase and moves to the next one.
    async fn advance<C>(&mut self, state: &SharedCommand, confirm: &mut C) -> Result<()>
    where
        C: Confirmation + ?Sized,
    {
        self.phase = match self.phase {
            CalibrationPhase::Hold => {
                self.hold(state);
                tokio::time::sleep(self.plan.dwell).await;
                CalibrationPhase::Release
            }
            CalibrationPhase::Release => {
                self.release(state);
                CalibrationPhase::Confirm
            }
            CalibrationPhase::Confirm => {
                confirm.wait_for_ack().await?;
                info!("Calibration complete");
                CalibrationPhase::Done
            }
            CalibrationPhase::Done => CalibrationPhase::Done,
        };
        Ok(())
    }

    /// Runs the full sequence.
    ///
    /// The transmitter must already be running; the drone only calibrates if
    /// it sees the Hold command for the whole dwell.
    ///
    /// # Errors
    ///
    /// Returns `Confirmation` if the operator acknowledgement cannot be read.
    pub async fn run<C>(mut self, state: &SharedCommand, confirm: &mut C) -> Result<Calibrated>
    where
        C: Confirmation + ?Sized,
    {
        while self.phase != CalibrationPhase::Done {
            self.advance(state, confirm).await?;
        }
        Ok(Calibrated { _private: () })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::mocks::SignalConfirmation;
    use crate::confirm::AutoConfirm;
    use crate::error::JoylinkError;

    #[test]
    fn test_default_plan() {
        let plan = CalibrationPlan::default();
        assert_eq!(plan.hold.to_bytes(), [255, 244, 0, 244, 0]);
        assert_eq!(plan.dwell, Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_advance_in_order() {
        let state = SharedCommand::new();
        let mut confirm = AutoConfirm;
        let mut seq = CalibrationSequencer::new(CalibrationPlan::default());
        assert_eq!(seq.phase(), CalibrationPhase::Hold);

        let started = tokio::time::Instant::now();
        seq.advance(&state, &mut confirm).await.unwrap();
        assert_eq!(seq.phase(), CalibrationPhase::Release);
        assert_eq!(state.snapshot(), DEFAULT_HOLD_COMMAND);
        assert!(started.elapsed() >= DEFAULT_DWELL);

        seq.advance(&state, &mut confirm).await.unwrap();
        assert_eq!(seq.phase(), CalibrationPhase::Confirm);
        assert_eq!(state.snapshot(), Command::neutral());

        seq.advance(&state, &mut confirm).await.unwrap();
        assert_eq!(seq.phase(), CalibrationPhase::Done);

        // Done is terminal
        seq.advance(&state, &mut confirm).await.unwrap();
        assert_eq!(seq.phase(), CalibrationPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_confirmation_stays_in_confirm() {
        let state = SharedCommand::new();
        let (ack, mut confirm) = SignalConfirmation::new();
        drop(ack);
        let mut seq = CalibrationSequencer::new(CalibrationPlan::default());

        seq.advance(&state, &mut confirm).await.unwrap();
        seq.advance(&state, &mut confirm).await.unwrap();
        assert!(seq.advance(&state, &mut confirm).await.is_err());
        assert_eq!(seq.phase(), CalibrationPhase::Confirm);
    }

    #[test]
    fn test_hold_clears_flags() {
        let state = SharedCommand::with_command(Command {
            flags: 0b11_1111,
            ..Command::neutral()
        });
        let plan = CalibrationPlan {
            hold: Command {
                flags: 0b1,
                ..DEFAULT_HOLD_COMMAND
            },
            dwell: DEFAULT_DWELL,
        };
        let seq = CalibrationSequencer::new(plan);

        seq.hold(&state);
        assert_eq!(state.snapshot().flags, 0);
    }

    #[test]
    fn test_release_keeps_flags() {
        let state = SharedCommand::with_command(Command {
            flags: 0b1_0010,
            ..DEFAULT_HOLD_COMMAND
        });
        let seq = CalibrationSequencer::new(CalibrationPlan::default());

        seq.release(&state);
        assert_eq!(state.snapshot().to_bytes(), [128, 128, 128, 128, 0b1_0010]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_sequence_timing() {
        let state = SharedCommand::new();
        let (ack, mut confirm) = SignalConfirmation::new();

        let task = {
            let state = state.clone();
            tokio::spawn(async move {
                CalibrationSequencer::new(CalibrationPlan::default())
                    .run(&state, &mut confirm)
                    .await
            })
        };

        // Hold for the whole dwell
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.snapshot().to_bytes(), [255, 244, 0, 244, 0]);
        tokio::time::sleep(Duration::from_millis(3480)).await;
        assert_eq!(state.snapshot().to_bytes(), [255, 244, 0, 244, 0]);

        // Released after the dwell, still waiting on the operator
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(state.snapshot(), Command::neutral());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!task.is_finished(), "Confirm must block until acknowledged");

        ack.send(()).unwrap();
        let calibrated = task.await.unwrap();
        assert!(calibrated.is_ok());
        assert_eq!(state.snapshot(), Command::neutral());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_failure_propagates() {
        let state = SharedCommand::new();
        let (ack, mut confirm) = SignalConfirmation::new();
        drop(ack);

        let result = CalibrationSequencer::new(CalibrationPlan::default())
            .run(&state, &mut confirm)
            .await;

        assert!(matches!(result, Err(JoylinkError::Confirmation(_))));
        // Axes were still released before the confirmation step
        assert_eq!(state.snapshot(), Command::neutral());
    }
}
