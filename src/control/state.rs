//! # Command State
//!
//! The single source of truth for what the transmitter sends next.
//!
//! A [`Command`] is a plain `Copy` value. [`SharedCommand`] guards one behind a
//! mutex and only hands out whole snapshots, so a reader never sees fields
//! from two different updates. The lock is never held across an `.await` or
//! any I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Neutral axis value (stick centered)
pub const AXIS_NEUTRAL: u8 = 0x80;

/// Number of defined flag bits (bits 6 and 7 are reserved)
pub const FLAG_COUNT: usize = 6;

/// Flag bit assignments as observed on the drone.
pub mod flags {
    /// Toggle takeoff
    pub const TAKEOFF: u8 = 1 << 0;
    /// Toggle landing
    pub const LAND: u8 = 1 << 1;
    /// Toggle headless mode
    pub const HEADLESS: u8 = 1 << 2;
    /// Toggle obstacle avoidance
    pub const OBSTACLE_AVOIDANCE: u8 = 1 << 3;
    /// 360 photo / flip action
    pub const ACTION: u8 = 1 << 4;
    /// Restart access point
    pub const RESTART_AP: u8 = 1 << 5;
}

/// One control command: four axis bytes and the flag byte.
///
/// Axis bytes are centered at 128; 0 and 255 are the physical extremes.
///
/// # Examples
///
/// ```
/// use joylink::control::state::Command;
///
/// let cmd = Command::default();
/// assert_eq!(cmd.forward_back, 128);
/// assert_eq!(cmd.flags, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// Fly forward/back
    pub forward_back: u8,
    /// Fly left/right
    pub left_right: u8,
    /// Climb/descend
    pub up_down: u8,
    /// Yaw left/right
    pub turn: u8,
    /// Toggle bitfield, see [`flags`]
    pub flags: u8,
}

impl Default for Command {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Command {
    /// All axes centered, no flags set.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            forward_back: AXIS_NEUTRAL,
            left_right: AXIS_NEUTRAL,
            up_down: AXIS_NEUTRAL,
            turn: AXIS_NEUTRAL,
            flags: 0,
        }
    }

    /// Centers all four axes, leaving flags untouched.
    pub fn center_axes(&mut self) {
        self.forward_back = AXIS_NEUTRAL;
        self.left_right = AXIS_NEUTRAL;
        self.up_down = AXIS_NEUTRAL;
        self.turn = AXIS_NEUTRAL;
    }

    /// Command bytes in wire order (frame bytes 1 through 5).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        [
            self.forward_back,
            self.left_right,
            self.up_down,
            self.turn,
            self.flags,
        ]
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fb:{:02x} lr:{:02x} ud:{:02x} turn:{:02x} flags:{:06b}",
            self.forward_back, self.left_right, self.up_down, self.turn, self.flags
        )
    }
}

/// Lock-guarded command shared between the control cycle and the transmitter.
///
/// Cloning is cheap and yields a handle to the same state.
///
/// # Examples
///
/// ```
/// use joylink::control::state::SharedCommand;
///
/// let state = SharedCommand::new();
/// state.apply(|cmd| cmd.flags ^= 0b100);
/// assert_eq!(state.snapshot().flags, 0b100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedCommand {
    inner: Arc<Mutex<Command>>,
}

impl SharedCommand {
    /// Creates shared state holding the neutral command.
    #[must_use]
    pub fn new() -> Self {
        Self::with_command(Command::neutral())
    }

    /// Creates shared state holding `command`.
    #[must_use]
    pub fn with_command(command: Command) -> Self {
        Self {
            inner: Arc::new(Mutex::new(command)),
        }
    }

    /// Returns a consistent copy of the current command.
    #[must_use]
    pub fn snapshot(&self) -> Command {
        *self.lock()
    }

    /// Runs `update` against the command under the lock.
    ///
    /// `update` must not block; the transmitter waits on the same lock.
    pub fn apply<F>(&self, update: F)
    where
        F: FnOnce(&mut Command),
    {
        let mut guard = self.lock();
        update(&mut guard);
    }

    /// Replaces all five fields at once.
    pub fn set(&self, command: Command) {
        self.apply(|cmd| *cmd = command);
    }

    fn lock(&self) -> MutexGuard<'_, Command> {
        // A panicking writer cannot leave a torn Command behind: every update
        // goes through a `&mut Command` and `Command` is plain data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
