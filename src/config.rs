//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::control::axis::{AxisBinding, AxisLayout};
use crate::control::calibration::CalibrationPlan;
use crate::control::input_mapper::MAX_AXES;
use crate::control::state::Command;
use crate::error::{JoylinkError, Result};
use crate::link::transmitter::{DEFAULT_CADENCE, DEFAULT_LOG_INTERVAL_FRAMES};
use crate::link::{DEFAULT_ADDRESS, DEFAULT_PORT};

/// Configuration file used when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub joystick: JoystickConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Drone connection configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LinkConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_log_interval_frames")]
    pub log_interval_frames: u64,
}

/// Joystick configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct JoystickConfig {
    /// Empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_forward_back")]
    pub forward_back: AxisBinding,

    #[serde(default = "default_left_right")]
    pub left_right: AxisBinding,

    #[serde(default = "default_up_down")]
    pub up_down: AxisBinding,

    #[serde(default = "default_turn")]
    pub turn: AxisBinding,
}

/// Calibration configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CalibrationConfig {
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    #[serde(default = "default_calib_forward_back")]
    pub forward_back: u8,

    #[serde(default = "default_calib_left_right")]
    pub left_right: u8,

    #[serde(default = "default_calib_up_down")]
    pub up_down: u8,

    #[serde(default = "default_calib_turn")]
    pub turn: u8,

    #[serde(default)]
    pub skip_confirmation: bool,
}

// Default value functions
fn default_address() -> String { DEFAULT_ADDRESS.to_string() }
fn default_port() -> u16 { DEFAULT_PORT }
fn default_cadence_ms() -> u64 { DEFAULT_CADENCE.as_millis() as u64 }
fn default_connect_timeout_ms() -> u64 { 3000 }
fn default_log_interval_frames() -> u64 { DEFAULT_LOG_INTERVAL_FRAMES }

fn default_poll_interval_ms() -> u64 { 20 }
fn default_forward_back() -> AxisBinding { AxisLayout::default().forward_back }
fn default_left_right() -> AxisBinding { AxisLayout::default().left_right }
fn default_up_down() -> AxisBinding { AxisLayout::default().up_down }
fn default_turn() -> AxisBinding { AxisLayout::default().turn }

fn default_dwell_ms() -> u64 { 3500 }
fn default_calib_forward_back() -> u8 { 255 }
fn default_calib_left_right() -> u8 { 244 }
fn default_calib_up_down() -> u8 { 0 }
fn default_calib_turn() -> u8 { 244 }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            cadence_ms: default_cadence_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            log_interval_frames: default_log_interval_frames(),
        }
    }
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            forward_back: default_forward_back(),
            left_right: default_left_right(),
            up_down: default_up_down(),
            turn: default_turn(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            forward_back: default_calib_forward_back(),
            left_right: default_calib_left_right(),
            up_down: default_calib_up_down(),
            turn: default_calib_turn(),
            skip_confirmation: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joylink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `config/default.toml` if present, else
    /// the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.link.address.is_empty() {
            return Err(invalid("link address cannot be empty"));
        }

        if self.link.port == 0 {
            return Err(invalid("link port cannot be 0"));
        }

        if self.link.cadence_ms == 0 || self.link.cadence_ms > 1000 {
            return Err(invalid("cadence_ms must be between 1 and 1000"));
        }

        if self.link.connect_timeout_ms == 0 || self.link.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        if self.link.log_interval_frames == 0 {
            return Err(invalid("log_interval_frames must be greater than 0"));
        }

        if self.joystick.poll_interval_ms == 0 || self.joystick.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        for (name, binding) in [
            ("forward_back", &self.joystick.forward_back),
            ("left_right", &self.joystick.left_right),
            ("up_down", &self.joystick.up_down),
            ("turn", &self.joystick.turn),
        ] {
            if binding.axis_index >= MAX_AXES {
                return Err(invalid(format!(
                    "{} axis_index {} is out of bounds (must be 0-{})",
                    name,
                    binding.axis_index,
                    MAX_AXES - 1
                )));
            }
        }

        if self.calibration.dwell_ms == 0 || self.calibration.dwell_ms > 60000 {
            return Err(invalid("calibration dwell_ms must be between 1 and 60000"));
        }

        Ok(())
    }

    /// Transmit cadence
    #[must_use]
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.link.cadence_ms)
    }

    /// Connection attempt timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.link.connect_timeout_ms)
    }

    /// Joystick poll interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.joystick.poll_interval_ms)
    }

    /// Logical axis bindings
    #[must_use]
    pub fn axis_layout(&self) -> AxisLayout {
        AxisLayout {
            forward_back: self.joystick.forward_back,
            left_right: self.joystick.left_right,
            up_down: self.joystick.up_down,
            turn: self.joystick.turn,
        }
    }

    /// Calibration command and dwell
    #[must_use]
    pub fn calibration_plan(&self) -> CalibrationPlan {
        CalibrationPlan {
            hold: Command {
                forward_back: self.calibration.forward_back,
                left_right: self.calibration.left_right,
                up_down: self.calibration.up_down,
                turn: self.calibration.turn,
                flags: 0,
            },
            dwell: Duration::from_millis(self.calibration.dwell_ms),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> JoylinkError {
    JoylinkError::Config(toml::de::Error::custom(msg))
}
