//! # Joylink
//!
//! Fly a TCP-controlled toy drone with a Linux joystick.
//!
//! ## Control Flow
//!
//! 1. **Setup**
//!    - Load configuration (first argument, else `config/default.toml`)
//!    - Open the joystick and connect to the drone's control port
//!
//! 2. **Session**
//!    - Stream control frames every 20 ms
//!    - Hold the calibration command for 3.5 s, then center the sticks
//!    - Wait for Enter once the drone's LED stops blinking
//!    - Map joystick input onto the command until Ctrl+C
//!
//! 3. **Teardown**
//!    - Stop the transmitter after its current frame and close the link
//!
//! Expected output:
//! ```text
//! INFO joylink: Joylink v0.1.0 starting...
//! INFO joylink::link: Connected to drone at 192.168.1.1:8888
//! INFO joylink::control::calibration: Calibrating: holding fb:ff lr:f4 ud:00 turn:f4 flags:000000 for 3500ms
//! INFO joylink::confirm: Press Enter when the LED stops blinking
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use joylink::config::Config;
use joylink::confirm::{AutoConfirm, Confirmation, LineConfirmation};
use joylink::error::Stage;
use joylink::session;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Joylink v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref())
        .context("setup failed: invalid configuration")?;

    let (mut joystick, link) = session::open_devices(&config)
        .await
        .map_err(|e| {
            error!("{} failure: {}", e.stage(), e);
            e
        })
        .context("setup failed: could not open devices")?;

    let mut confirm: Box<dyn Confirmation> = if config.calibration.skip_confirmation {
        Box::new(AutoConfirm)
    } else {
        Box::new(LineConfirmation::stdin())
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down...");
                    shutdown.cancel();
                }
                Err(e) => error!("Cannot listen for Ctrl+C: {}", e),
            }
        });
    }

    info!("Press Ctrl+C to exit");

    match session::run(&config, link, &mut joystick, confirm.as_mut(), shutdown).await {
        Ok(stats) => {
            info!("Total frames sent: {}", stats.frames_sent);
            Ok(())
        }
        Err(e) => {
            let stage = e.stage();
            error!("{} failure: {}", stage, e);
            Err(e).context(match stage {
                Stage::Setup => "session failed during setup",
                Stage::SteadyState => "session failed while flying",
            })
        }
    }
}
