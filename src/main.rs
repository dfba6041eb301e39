//! ALSA Loopback - copy the default capture device to the default playback device.
//!
//! Both devices are opened with fixed parameters (S32_LE, stereo, nearest
//! to 192 kHz) and serviced by a single blocking transfer loop that runs until
//! the readiness wait fails or the process is asked to stop.

mod audio;
mod config;
mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use audio::{AlsaBackend, Loopback, PcmBackend};
use config::{AppConfig, StreamSettings};

/// Open, start and run the loopback, returning the process exit status.
///
/// Negotiation and start failures return their negative error code. A failed
/// readiness wait returns its code after both devices are closed; a requested
/// shutdown returns 0.
fn run_loopback<B: PcmBackend>(backend: &B, settings: StreamSettings, shutdown: &AtomicBool) -> i32 {
    let mut loopback = match Loopback::open(backend, settings) {
        Ok(loopback) => loopback,
        Err(e) => {
            error!("{}", e);
            return e.code();
        }
    };

    if let Err(e) = loopback.start() {
        error!("{}", e);
        return e.code();
    }

    let exit = loopback.run(shutdown);
    loopback.close();
    exit.exit_code()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .context("Failed to build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🔁 ALSA Loopback v{}", env!("CARGO_PKG_VERSION"));
    config.log_config();

    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_shutdown = shutdown.clone();
    let settings = config.stream.clone();

    // The transfer loop blocks on the device, so it gets its own thread
    let mut transfer = tokio::task::spawn_blocking(move || run_loopback(&AlsaBackend, settings, &loop_shutdown));

    let finished = tokio::select! {
        result = &mut transfer => Some(result),
        _ = wait_for_shutdown() => None,
    };

    // On a signal, let the loop notice the flag and close both devices
    let result = match finished {
        Some(result) => result,
        None => {
            shutdown.store(true, Ordering::SeqCst);
            transfer.await
        }
    };
    let code = result.context("Transfer loop panicked")?;

    if code != 0 {
        std::process::exit(code);
    }

    info!("✅ Loopback stopped");
    Ok(())
}
