//! # Input Mapper
//!
//! Folds joystick events into the shared [`Command`].
//!
//! Each poll cycle drains every pending joystick event into the
//! [`SampleCache`], then, if at least one event arrived, recomputes the four
//! axis bytes and toggles flag bits for buttons pressed since the last
//! cycle, all in one locked update. A cycle with no events leaves the
//! command untouched.
//!
//! ## Buttons
//!
//! Buttons 0-5 toggle flag bits 0-5. A press increments the button's
//! counter; the next update flips the bit once and clears the counter, so
//! holding a button never re-toggles. Buttons 6 and up are counted but not
//! mapped.
//!
//! Events queued before [`InputMapper::run`] starts (during calibration)
//! are absorbed once: stick positions are kept, presses are discarded.
//!
//! ## Usage
//!
//! ```
//! use joylink::control::input_mapper::SampleCache;
//! use joylink::joystick::JoystickEvent;
//!
//! let mut cache = SampleCache::new();
//! cache.ingest(&JoystickEvent::axis(1, -25600));
//! cache.ingest(&JoystickEvent::button(2, true));
//!
//! let mut flags = 0;
//! cache.fold_toggles(&mut flags);
//! assert_eq!(flags, 0b100);
//! ```

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::axis::AxisLayout;
use super::calibration::Calibrated;
use super::state::{Command, SharedCommand, FLAG_COUNT};
use crate::error::Result;
use crate::joystick::{EventKind, JoystickEvent, JoystickSource};

/// Number of raw axes tracked.
pub const MAX_AXES: usize = 16;

/// Number of raw buttons tracked.
pub const MAX_BUTTONS: usize = 20;

/// Last known joystick values, owned by the mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCache {
    axes: [i32; MAX_AXES],
    presses: [u32; MAX_BUTTONS],
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleCache {
    /// All axes centered, no pending presses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            axes: [0; MAX_AXES],
            presses: [0; MAX_BUTTONS],
        }
    }

    /// Records one event. Out-of-range indices and button releases are ignored.
    pub fn ingest(&mut self, event: &JoystickEvent) {
        match event.kind {
            EventKind::Axis => {
                if let Some(slot) = self.axes.get_mut(event.index) {
                    *slot = event.value;
                }
            }
            EventKind::Button => {
                if event.value == 0 {
                    return;
                }
                if let Some(count) = self.presses.get_mut(event.index) {
                    *count = count.saturating_add(1);
                }
            }
        }
    }

    /// Last value of raw axis `index`, 0 if never seen or out of range.
    #[must_use]
    pub fn axis(&self, index: usize) -> i32 {
        self.axes.get(index).copied().unwrap_or(0)
    }

    /// Presses of `index` not yet folded into flags.
    #[must_use]
    pub fn pending_presses(&self, index: usize) -> u32 {
        self.presses.get(index).copied().unwrap_or(0)
    }

    /// Drops all pending presses without toggling anything.
    pub fn clear_presses(&mut self) {
        self.presses = [0; MAX_BUTTONS];
    }

    /// Toggles one flag bit per button with pending presses, then clears
    /// those counters.
    pub fn fold_toggles(&mut self, flags: &mut u8) {
        for (bit, count) in self.presses.iter_mut().take(FLAG_COUNT).enumerate() {
            if *count != 0 {
                *flags ^= 1 << bit;
                *count = 0;
            }
        }
    }
}

/// Maps joystick samples onto the shared command.
#[derive(Debug)]
pub struct InputMapper {
    layout: AxisLayout,
    cache: SampleCache,
    pending: Vec<JoystickEvent>,
}

impl InputMapper {
    /// Creates a mapper with an empty sample cache.
    #[must_use]
    pub fn new(layout: AxisLayout) -> Self {
        Self {
            layout,
            cache: SampleCache::new(),
            pending: Vec::with_capacity(64),
        }
    }

    /// Read-only view of the sample cache.
    #[must_use]
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// Runs one mapping cycle.
    ///
    /// # Returns
    ///
    /// The command as written, or `None` if no events were pending.
    ///
    /// # Errors
    ///
    /// Propagates `InputSource` errors from the joystick.
    pub fn poll<S>(&mut self, source: &mut S, state: &SharedCommand) -> Result<Option<Command>>
    where
        S: JoystickSource + ?Sized,
    {
        self.pending.clear();
        if source.drain(&mut self.pending)? == 0 {
            return Ok(None);
        }

        for event in &self.pending {
            self.cache.ingest(event);
        }

        let written = self.write(state, true);
        debug!("{} events -> {}", self.pending.len(), written);
        Ok(Some(written))
    }

    /// Absorbs events queued before mapping started.
    ///
    /// Axis positions are written to the command; button presses are
    /// discarded so flags stay as calibration left them.
    ///
    /// # Errors
    ///
    /// Propagates `InputSource` errors from the joystick.
    pub fn absorb_backlog<S>(&mut self, source: &mut S, state: &SharedCommand) -> Result<usize>
    where
        S: JoystickSource + ?Sized,
    {
        self.pending.clear();
        let count = source.drain(&mut self.pending)?;
        if count == 0 {
            return Ok(0);
        }

        for event in &self.pending {
            self.cache.ingest(event);
        }
        self.cache.clear_presses();

        let written = self.write(state, false);
        debug!("Absorbed {} queued events -> {}", count, written);
        Ok(count)
    }

    /// Writes the mapped axes, and optionally the toggles, in one locked update.
    fn write(&mut self, state: &SharedCommand, toggle: bool) -> Command {
        let layout = &self.layout;
        let forward_back = layout.forward_back.map(self.cache.axis(layout.forward_back.axis_index));
        let left_right = layout.left_right.map(self.cache.axis(layout.left_right.axis_index));
        let up_down = layout.up_down.map(self.cache.axis(layout.up_down.axis_index));
        let turn = layout.turn.map(self.cache.axis(layout.turn.axis_index));

        let cache = &mut self.cache;
        let mut written = Command::neutral();
        state.apply(|cmd| {
            cmd.forward_back = forward_back;
            cmd.left_right = left_right;
            cmd.up_down = up_down;
            cmd.turn = turn;
            if toggle {
                cache.fold_toggles(&mut cmd.flags);
            }
            written = *cmd;
        });
        written
    }

    /// Polls the joystick every `poll_interval` until `cancel` fires.
    ///
    /// Requires the [`Calibrated`] token, so mapping can only start after
    /// the calibration sequence has finished.
    ///
    /// # Errors
    ///
    /// Returns the first `InputSource` error; the mapper does not retry.
    pub async fn run<S>(
        mut self,
        source: &mut S,
        state: &SharedCommand,
        poll_interval: Duration,
        _calibrated: Calibrated,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: JoystickSource + ?Sized,
    {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.absorb_backlog(source, state)?;
        info!("Input mapping started ({}ms poll)", poll_interval.as_millis());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Input mapping stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.poll(source, state)?;
                }
            }
        }
    }
}
