//! # evdev Joystick Source
//!
//! Reads a Linux gamepad through the evdev interface and presents it with
//! joystick-driver conventions:
//!
//! - Axis index is the `ABS_*` code (`ABS_X` = 0, `ABS_Y` = 1, `ABS_RX` = 3, ...)
//! - Axis values are rescaled from the device's absinfo range to −32767..=32767
//! - Button index is the rank of the key among the device's buttons
//!   (codes ≥ `BTN_MISC`), in ascending code order
//!
//! A background task reads the async event stream into a bounded channel;
//! [`drain`] only empties that channel, so it never blocks. While nothing
//! drains the channel (calibration) it fills up and newer events are dropped.
//!
//! [`drain`]: JoystickSource::drain

use std::collections::HashMap;
use std::path::Path;

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use tokio::sync::mpsc::{
    self,
    error::{TryRecvError, TrySendError},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EventKind, JoystickEvent, JoystickSource};
use crate::error::{JoylinkError, Result};

/// Normalized axis extreme (joystick driver convention).
pub const NORMALIZED_AXIS_MAX: i32 = 32767;

/// Directory scanned during auto-detection
const INPUT_DIR: &str = "/dev/input";

/// Events buffered between drains
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// First button code (`BTN_MISC`); lower key codes are keyboard keys
const BTN_MISC_CODE: u16 = 0x100;

/// Converts raw evdev events into normalized joystick events.
#[derive(Debug, Clone, Default)]
pub struct EventTranslator {
    /// Absinfo range per `ABS_*` code
    axis_ranges: HashMap<u16, (i32, i32)>,
    /// Button rank per key code
    button_ranks: HashMap<u16, usize>,
}

impl EventTranslator {
    /// Builds a translator from explicit axis ranges and button codes.
    ///
    /// `button_codes` need not be sorted; ranks follow ascending code order
    /// and codes below `BTN_MISC` are ignored.
    #[must_use]
    pub fn new(axis_ranges: HashMap<u16, (i32, i32)>, button_codes: &[u16]) -> Self {
        let mut codes: Vec<u16> = button_codes
            .iter()
            .copied()
            .filter(|&code| code >= BTN_MISC_CODE)
            .collect();
        codes.sort_unstable();
        codes.dedup();

        let button_ranks = codes
            .into_iter()
            .enumerate()
            .map(|(rank, code)| (code, rank))
            .collect();

        Self {
            axis_ranges,
            button_ranks,
        }
    }

    /// Reads axis ranges and button set from an open device.
    pub fn from_device(device: &Device) -> Result<Self> {
        let mut axis_ranges = HashMap::new();

        if let Some(axes) = device.supported_absolute_axes() {
            let abs_state = device.get_abs_state().map_err(|e| {
                JoylinkError::Joystick(format!("Failed to read axis ranges: {}", e))
            })?;

            for axis in axes.iter() {
                if let Some(info) = abs_state.get(axis.0 as usize) {
                    axis_ranges.insert(axis.0, (info.minimum, info.maximum));
                }
            }
        }

        let button_codes: Vec<u16> = device
            .supported_keys()
            .map(|keys| keys.iter().map(|key| key.code()).collect())
            .unwrap_or_default();

        Ok(Self::new(axis_ranges, &button_codes))
    }

    /// Number of buttons the device exposes.
    #[must_use]
    pub fn button_count(&self) -> usize {
        self.button_ranks.len()
    }

    /// Number of absolute axes the device exposes.
    #[must_use]
    pub fn axis_count(&self) -> usize {
        self.axis_ranges.len()
    }

    /// Translates one evdev event.
    ///
    /// Returns `None` for sync/misc events, unknown codes and key auto-repeat.
    #[must_use]
    pub fn translate(&self, event: &InputEvent) -> Option<JoystickEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                let &(min, max) = self.axis_ranges.get(&axis.0)?;
                Some(JoystickEvent {
                    kind: EventKind::Axis,
                    index: axis.0 as usize,
                    value: normalize_axis(event.value(), min, max),
                })
            }
            InputEventKind::Key(key) => {
                // 2 is auto-repeat, not a new press
                if event.value() > 1 {
                    return None;
                }
                let &rank = self.button_ranks.get(&key.code())?;
                Some(JoystickEvent::button(rank, event.value() == 1))
            }
            _ => None,
        }
    }
}

/// Rescales `value` from `min..=max` to −32767..=32767.
///
/// A degenerate range maps everything to center.
#[must_use]
pub fn normalize_axis(value: i32, min: i32, max: i32) -> i32 {
    if max <= min {
        return 0;
    }
    let span = i64::from(max) - i64::from(min);
    let offset = i64::from(value.clamp(min, max)) - i64::from(min);
    let full = 2 * i64::from(NORMALIZED_AXIS_MAX);
    (offset * full / span - i64::from(NORMALIZED_AXIS_MAX)) as i32
}

/// Gamepad read through evdev.
pub struct EvdevJoystick {
    events: mpsc::Receiver<std::io::Result<JoystickEvent>>,
    reader: JoinHandle<()>,
    device_path: String,
    name: String,
}

impl std::fmt::Debug for EvdevJoystick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevJoystick")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EvdevJoystick {
    /// Opens `device_path`, or auto-detects a gamepad when it is empty.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `JoystickNotFound`: auto-detection found no gamepad
    /// - `Joystick`: the device could not be opened or read
    pub fn open(device_path: &str) -> Result<Self> {
        let (path, device) = if device_path.is_empty() {
            Self::detect()?
        } else {
            let device = Device::open(device_path).map_err(|e| {
                JoylinkError::Joystick(format!("Failed to open {}: {}", device_path, e))
            })?;
            (device_path.to_string(), device)
        };

        Self::start(path, device)
    }

    /// Scans `/dev/input/event*` for the first device that looks like a gamepad.
    fn detect() -> Result<(String, Device)> {
        let mut entries: Vec<_> = std::fs::read_dir(INPUT_DIR)
            .map_err(|e| JoylinkError::Joystick(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_event_node(path))
            .collect();

        // Deterministic choice when several pads are plugged in
        entries.sort();

        for path in entries {
            match Device::open(&path) {
                Ok(device) if is_gamepad(&device) => {
                    info!(
                        "Found joystick \"{}\" at {}",
                        device.name().unwrap_or("unknown"),
                        path.display()
                    );
                    return Ok((path.to_string_lossy().to_string(), device));
                }
                Ok(_) => debug!("Skipping non-joystick device {}", path.display()),
                Err(e) => debug!("Could not open {}: {}", path.display(), e),
            }
        }

        Err(JoylinkError::JoystickNotFound)
    }

    fn start(device_path: String, device: Device) -> Result<Self> {
        let translator = EventTranslator::from_device(&device)?;
        let name = device.name().unwrap_or("unknown").to_string();
        info!(
            "Joystick \"{}\" ready: {} axes, {} buttons",
            name,
            translator.axis_count(),
            translator.button_count()
        );

        let mut stream = device.into_event_stream().map_err(|e| {
            JoylinkError::Joystick(format!("Failed to stream {}: {}", device_path, e))
        })?;

        let (tx, events) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let reader = tokio::spawn(async move {
            let mut dropped: u64 = 0;
            loop {
                match stream.next_event().await {
                    Ok(raw) => {
                        let Some(event) = translator.translate(&raw) else {
                            continue;
                        };
                        match tx.try_send(Ok(event)) {
                            Ok(()) => {
                                if dropped > 0 {
                                    debug!("Joystick queue drained, {} events dropped", dropped);
                                    dropped = 0;
                                }
                            }
                            Err(TrySendError::Full(_)) => dropped += 1,
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                    Err(e) => {
                        warn!("Joystick read failed: {}", e);
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            events,
            reader,
            device_path,
            name,
        })
    }

    /// Path of the opened `/dev/input/eventX` device.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Device name reported by the kernel.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl JoystickSource for EvdevJoystick {
    fn drain(&mut self, out: &mut Vec<JoystickEvent>) -> Result<usize> {
        let mut count = 0;
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => {
                    out.push(event);
                    count += 1;
                }
                Ok(Err(e)) => {
                    return Err(JoylinkError::InputSource(format!(
                        "{}: {}",
                        self.device_path, e
                    )))
                }
                Err(TryRecvError::Empty) => return Ok(count),
                Err(TryRecvError::Disconnected) => {
                    return Err(JoylinkError::InputSource(format!(
                        "{}: device stream closed",
                        self.device_path
                    )))
                }
            }
        }
    }
}

impl Drop for EvdevJoystick {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// A gamepad or joystick has absolute axes and at least one stick button.
fn is_gamepad(device: &Device) -> bool {
    let has_axes = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X))
        .unwrap_or(false);
    let has_buttons = device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER))
        .unwrap_or(false);
    has_axes && has_buttons
}

/// Returns true if `path` looks like an evdev node.
pub fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with("event"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn xbox_translator() -> EventTranslator {
        let mut ranges = HashMap::new();
        ranges.insert(AbsoluteAxisType::ABS_X.0, (-32768, 32767));
        ranges.insert(AbsoluteAxisType::ABS_Y.0, (-32768, 32767));
        ranges.insert(AbsoluteAxisType::ABS_Z.0, (0, 255));
        ranges.insert(AbsoluteAxisType::ABS_RX.0, (-32768, 32767));
        ranges.insert(AbsoluteAxisType::ABS_RY.0, (-32768, 32767));

        let buttons = [
            Key::BTN_WEST.code(),
            Key::BTN_SOUTH.code(),
            Key::BTN_EAST.code(),
            Key::BTN_NORTH.code(),
            Key::BTN_TL.code(),
            Key::BTN_TR.code(),
            Key::KEY_A.code(), // keyboard key, not a button
        ];
        EventTranslator::new(ranges, &buttons)
    }

    #[test]
    fn test_normalize_full_range() {
        assert_eq!(normalize_axis(-32768, -32768, 32767), -32767);
        assert_eq!(normalize_axis(32767, -32768, 32767), 32767);
    }

    #[test]
    fn test_normalize_byte_range() {
        assert_eq!(normalize_axis(0, 0, 255), -32767);
        assert_eq!(normalize_axis(255, 0, 255), 32767);
        let mid = normalize_axis(128, 0, 255);
        assert!(mid.abs() < 256, "Byte center should land near zero, got {}", mid);
    }

    #[test]
    fn test_normalize_clamps_and_degenerate_range() {
        assert_eq!(normalize_axis(400, 0, 255), 32767);
        assert_eq!(normalize_axis(-5, 0, 255), -32767);
        assert_eq!(normalize_axis(10, 5, 5), 0);
    }

    #[test]
    fn test_translate_axis_uses_abs_code_as_index() {
        let t = xbox_translator();
        let raw = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_RX.0, 32767);
        let event = t.translate(&raw).unwrap();
        assert_eq!(event.kind, EventKind::Axis);
        assert_eq!(event.index, 3);
        assert_eq!(event.value, 32767);
    }

    #[test]
    fn test_translate_unknown_axis_is_dropped() {
        let t = xbox_translator();
        let raw = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_HAT0X.0, 1);
        assert!(t.translate(&raw).is_none());
    }

    #[test]
    fn test_button_ranks_follow_code_order() {
        let t = xbox_translator();
        assert_eq!(t.button_count(), 6);

        let south = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1);
        let east = InputEvent::new(EventType::KEY, Key::BTN_EAST.code(), 1);
        let tr = InputEvent::new(EventType::KEY, Key::BTN_TR.code(), 0);

        assert_eq!(t.translate(&south), Some(JoystickEvent::button(0, true)));
        assert_eq!(t.translate(&east), Some(JoystickEvent::button(1, true)));
        assert_eq!(t.translate(&tr), Some(JoystickEvent::button(5, false)));
    }

    #[test]
    fn test_autorepeat_is_dropped() {
        let t = xbox_translator();
        let repeat = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 2);
        assert!(t.translate(&repeat).is_none());
    }

    #[test]
    fn test_sync_events_are_dropped() {
        let t = xbox_translator();
        let sync = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        assert!(t.translate(&sync).is_none());
    }

    #[test]
    fn test_is_event_node() {
        assert!(is_event_node(Path::new("/dev/input/event3")));
        assert!(!is_event_node(Path::new("/dev/input/js0")));
        assert!(!is_event_node(Path::new("/dev/input/mice")));
    }

    #[tokio::test]
    async fn test_open_nonexistent_device_returns_error() {
        let result = EvdevJoystick::open("/dev/input/nonexistent_event_12345");
        match result {
            Err(JoylinkError::Joystick(msg)) => {
                assert!(msg.contains("/dev/input/nonexistent_event_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Joystick error, got: {:?}", other),
        }
    }

    // Integration test - only runs with real hardware
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_detect_with_real_hardware() {
        let mut joystick = EvdevJoystick::open("").expect("No joystick connected");
        println!("Opened {} at {}", joystick.name(), joystick.device_path());

        println!("Move a stick within 5 seconds...");
        let mut out = Vec::new();
        for _ in 0..100 {
            if joystick.drain(&mut out).unwrap() > 0 {
                println!("Received: {:?}", out);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("No events received from joystick");
    }
}
