//! # Session
//!
//! Wires the pipeline together for one flight session:
//!
//! ```text
//! joystick ──► InputMapper ──┐
//!                            ├──► SharedCommand ──► Transmitter ──► TCP
//! CalibrationSequencer ──────┘
//! ```
//!
//! Two units run concurrently: the spawned transmitter and the control
//! cycle (calibration, then input mapping) on the caller's task. The first
//! of these to fail ends the session; the transmitter is then stopped after
//! its current frame and the link is closed.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::confirm::Confirmation;
use crate::control::calibration::CalibrationSequencer;
use crate::control::input_mapper::InputMapper;
use crate::control::state::SharedCommand;
use crate::error::{JoylinkError, Result};
use crate::joystick::evdev_source::EvdevJoystick;
use crate::joystick::JoystickSource;
use crate::link::transmitter::{TransmitStats, Transmitter};
use crate::link::{DroneLink, FrameSink};

/// Why the session ended.
enum Exit {
    Shutdown,
    Control(Result<()>),
    Link(Result<TransmitStats>),
}

/// Acquires the joystick and the drone link.
///
/// The joystick is opened first; if the connection then fails, it is
/// released before returning.
///
/// # Errors
///
/// Any error here is a setup failure; nothing has been transmitted yet.
pub async fn open_devices(config: &Config) -> Result<(EvdevJoystick, DroneLink)> {
    acquire(
        || {
            let joystick = EvdevJoystick::open(&config.joystick.device_path)?;
            info!(
                "Using joystick \"{}\" at {}",
                joystick.name(),
                joystick.device_path()
            );
            Ok(joystick)
        },
        || {
            DroneLink::connect(
                &config.link.address,
                config.link.port,
                config.connect_timeout(),
            )
        },
    )
    .await
}

/// Opens the joystick, then connects; the joystick is dropped if connecting fails.
async fn acquire<J, S, OpenJ, Connect, Fut>(open_joystick: OpenJ, connect: Connect) -> Result<(J, S)>
where
    OpenJ: FnOnce() -> Result<J>,
    Connect: FnOnce() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let joystick = open_joystick()?;
    let link = connect().await?;
    Ok((joystick, link))
}

/// Runs a session until `shutdown` fires or a component fails.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `sink` - Open drone link, owned by the transmitter from here on
/// * `joystick` - Event source for the input mapper
/// * `confirm` - Operator acknowledgement for the calibration step
/// * `shutdown` - Cancelled to end the session gracefully
///
/// # Errors
///
/// - `Transmission` if a frame write fails
/// - `InputSource` if the joystick becomes unreadable
/// - `Confirmation` if the acknowledgement cannot be read
pub async fn run<S, J, C>(
    config: &Config,
    sink: S,
    joystick: &mut J,
    confirm: &mut C,
    shutdown: CancellationToken,
) -> Result<TransmitStats>
where
    S: FrameSink + 'static,
    J: JoystickSource + ?Sized,
    C: Confirmation + ?Sized,
{
    let state = SharedCommand::new();
    let mut transmitter = Transmitter::new(sink, state.clone(), config.cadence())
        .with_log_interval(config.link.log_interval_frames)
        .spawn();

    let control = async {
        let calibrated = CalibrationSequencer::new(config.calibration_plan())
            .run(&state, confirm)
            .await?;
        InputMapper::new(config.axis_layout())
            .run(joystick, &state, config.poll_interval(), calibrated, &shutdown)
            .await
    };

    let exit = tokio::select! {
        _ = shutdown.cancelled() => Exit::Shutdown,
        result = control => Exit::Control(result),
        result = transmitter.finished() => Exit::Link(result),
    };

    match exit {
        Exit::Shutdown | Exit::Control(Ok(())) => {
            info!("Shutting down session");
            transmitter.stop().await
        }
        Exit::Control(Err(e)) => {
            error!("Control cycle failed: {}", e);
            if let Err(stop_err) = transmitter.stop().await {
                error!("Transmitter also failed: {}", stop_err);
            }
            Err(e)
        }
        Exit::Link(result) => {
            let stats = result?;
            Err(JoylinkError::Transmission(format!(
                "transmitter exited after {} frames",
                stats.frames_sent
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::mocks::SignalConfirmation;
    use crate::confirm::AutoConfirm;
    use crate::control::state::Command;
    use crate::joystick::mocks::ScriptedJoystick;
    use crate::joystick::JoystickEvent;
    use crate::link::mocks::MockSink;
    use crate::protocol::frame::decode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Orders frames by the phase they belong to.
    fn phase_of(cmd: &Command) -> usize {
        if cmd.to_bytes() == [255, 244, 0, 244, 0] {
            0
        } else if *cmd == Command::neutral() {
            1
        } else {
            2
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_phases_reach_the_wire_in_order() {
        let config = Config::default();
        let sink = MockSink::new();
        let mut joystick = ScriptedJoystick::new(vec![vec![JoystickEvent::axis(1, -25600)]]);
        let (ack, mut confirm) = SignalConfirmation::new();
        let shutdown = CancellationToken::new();

        let driver = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(3600)).await;
                ack.send(()).unwrap();
                tokio::time::sleep(Duration::from_millis(400)).await;
                shutdown.cancel();
            })
        };

        let stats = run(&config, sink.clone(), &mut joystick, &mut confirm, shutdown)
            .await
            .unwrap();
        driver.await.unwrap();

        let frames = sink.frames();
        assert_eq!(stats.frames_sent as usize, frames.len());
        assert!(sink.is_closed());

        let commands: Vec<Command> = frames.iter().map(|f| decode(f).unwrap()).collect();
        let phases: Vec<usize> = commands.iter().map(phase_of).collect();

        assert_eq!(phases.first(), Some(&0), "Calibration must be on the wire first");
        assert!(phases.contains(&1), "Neutral frames expected while awaiting confirmation");
        assert!(phases.windows(2).all(|w| w[0] <= w[1]), "Phases went backwards");
        assert_eq!(commands.last().unwrap().forward_back, 228);

        // ~3.5 s of calibration at 50 Hz
        let held = phases.iter().filter(|&&p| p == 0).count();
        assert!((174..=176).contains(&held), "held {} calibration frames", held);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_input_mapping_before_confirmation() {
        let config = Config::default();
        let sink = MockSink::new();
        let mut joystick = ScriptedJoystick::new(vec![vec![JoystickEvent::axis(0, 32767)]]);
        let (_ack, mut confirm) = SignalConfirmation::new();
        let shutdown = CancellationToken::new();

        let stopper = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                shutdown.cancel();
            })
        };

        run(&config, sink.clone(), &mut joystick, &mut confirm, shutdown)
            .await
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(joystick.drains, 0, "Joystick polled before confirmation");
        assert!(sink
            .frames()
            .iter()
            .all(|f| phase_of(&decode(f).unwrap()) < 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmission_failure_ends_session() {
        let config = Config::default();
        let sink = MockSink::failing_after(10);
        let mut joystick = ScriptedJoystick::new(vec![]);
        let (_ack, mut confirm) = SignalConfirmation::new();

        let result = run(
            &config,
            sink.clone(),
            &mut joystick,
            &mut confirm,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(JoylinkError::Transmission(_))));
        assert_eq!(sink.frames().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_failure_stops_transmitter() {
        let mut config = Config::default();
        config.calibration.dwell_ms = 100;
        let sink = MockSink::new();
        let mut joystick = ScriptedJoystick::failing_after(vec![vec![JoystickEvent::button(0, true)]]);
        let mut confirm = AutoConfirm;

        let result = run(
            &config,
            sink.clone(),
            &mut joystick,
            &mut confirm,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(JoylinkError::InputSource(_))));
        assert!(sink.is_closed(), "Link should be closed after input failure");
        let last = decode(sink.frames().last().unwrap()).unwrap();
        assert_eq!(last.flags, 0, "Press queued during calibration must be discarded");
    }

    /// Joystick stand-in that records when it is released.
    struct TrackedJoystick(Arc<AtomicBool>);

    impl Drop for TrackedJoystick {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_joystick_released_when_connect_fails() {
        let released = Arc::new(AtomicBool::new(false));
        let tracked = released.clone();

        let result = acquire(
            move || Ok(TrackedJoystick(tracked)),
            || async {
                Err::<MockSink, _>(JoylinkError::Connect {
                    addr: "192.168.1.1:8888".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                })
            },
        )
        .await;

        assert!(matches!(result, Err(JoylinkError::Connect { .. })));
        assert!(released.load(Ordering::SeqCst), "Joystick should be released");
    }

    #[tokio::test]
    async fn test_connect_skipped_when_joystick_missing() {
        let mut connected = false;

        let result = acquire(
            || Err::<TrackedJoystick, _>(JoylinkError::JoystickNotFound),
            || {
                connected = true;
                async { Ok(MockSink::new()) }
            },
        )
        .await;

        assert!(matches!(result, Err(JoylinkError::JoystickNotFound)));
        assert!(!connected, "Connect must not be attempted without a joystick");
    }
}
