//! Application configuration and CLI argument parsing.

use clap::Parser;
use tracing::info;

/// Buffer capacity in frames, shared by avail-min and per-iteration clamping.
pub const BUFFER_FRAMES: usize = 4096;

/// Interleaved channel count of both streams.
pub const CHANNELS: u32 = 2;

/// Sample encoding negotiated on both streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 32-bit little-endian
    #[default]
    S32Le,
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::S32Le => write!(f, "S32_LE"),
        }
    }
}

/// Stream parameters negotiated on both devices.
///
/// These are fixed; there is no command-line or environment override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub device: &'static str,      // PCM name opened for both directions
    pub rate: u32,                 // Target rate, negotiated to nearest
    pub format: SampleFormat,      // Sample encoding
    pub channels: u32,             // Interleaved channels
    pub buffer_frames: usize,      // Transfer buffer capacity and avail-min
    pub start_threshold: usize,    // Frames queued before the device starts
    pub wait_timeout_ms: u32,      // Readiness wait bound
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            device: "default",
            rate: 192_000,
            format: SampleFormat::S32Le,
            channels: CHANNELS,
            buffer_frames: BUFFER_FRAMES,
            start_threshold: 0,
            wait_timeout_ms: 1000,
        }
    }
}

impl StreamSettings {
    /// Number of interleaved samples in one full buffer.
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames * self.channels as usize
    }
}

/// Loopback application configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "alsa-loopback")]
#[command(author, version, about = "Copy the default capture device to the default playback device", long_about = None)]
pub struct AppConfig {
    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Fixed stream settings (not exposed on the command line)
    #[arg(skip)]
    pub stream: StreamSettings,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        let stream = &self.stream;
        info!("Configuration:");
        info!("  Device: {}", stream.device);
        info!("  Sample rate: {} Hz (nearest supported)", stream.rate);
        info!("  Sample format: {}", stream.format);
        info!("  Channels: {}", stream.channels);
        info!("  Buffer: {} frames", stream.buffer_frames);
        info!("  Start threshold: {} frames", stream.start_threshold);
        info!("  Wait timeout: {}ms", stream.wait_timeout_ms);
    }
}
