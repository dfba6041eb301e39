//! PCM device abstraction and stream initialization.
//!
//! The transfer loop only talks to the sound system through [`PcmBackend`] and
//! [`PcmDevice`], so the ALSA implementation can be swapped for a scripted one
//! in tests.

use tracing::{debug, info};

use crate::config::{SampleFormat, StreamSettings};
use crate::error::{BackendError, DeviceError, Step, StepContext};

/// Stream direction of a PCM handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Playback,
    Capture,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Playback => write!(f, "playback"),
            Direction::Capture => write!(f, "capture"),
        }
    }
}

/// Buffer access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Interleaved frames transferred with read/write calls
    RwInterleaved,
}

/// Opens PCM handles by name.
pub trait PcmBackend {
    type Device: PcmDevice;

    fn open(&self, name: &str, direction: Direction) -> Result<Self::Device, BackendError>;
}

/// An open PCM handle.
///
/// Dropping the handle closes it. Parameter descriptors are freed when they go
/// out of scope.
pub trait PcmDevice {
    type HwParams<'a>
    where
        Self: 'a;
    type SwParams<'a>
    where
        Self: 'a;

    fn direction(&self) -> Direction;

    /// Allocate a hardware descriptor covering every supported configuration.
    fn hw_params_any(&self) -> Result<Self::HwParams<'_>, BackendError>;
    fn set_access(&self, hwp: &Self::HwParams<'_>, access: Access) -> Result<(), BackendError>;
    fn set_format(&self, hwp: &Self::HwParams<'_>, format: SampleFormat) -> Result<(), BackendError>;
    /// Restrict the rate to the supported value nearest `rate`, returning it.
    fn set_rate_near(&self, hwp: &Self::HwParams<'_>, rate: u32) -> Result<u32, BackendError>;
    fn set_channels(&self, hwp: &Self::HwParams<'_>, channels: u32) -> Result<(), BackendError>;
    fn commit_hw_params(&self, hwp: &Self::HwParams<'_>) -> Result<(), BackendError>;

    /// Allocate a software descriptor holding the handle's current values.
    fn sw_params_current(&self) -> Result<Self::SwParams<'_>, BackendError>;
    fn set_avail_min(&self, swp: &Self::SwParams<'_>, frames: usize) -> Result<(), BackendError>;
    fn set_start_threshold(&self, swp: &Self::SwParams<'_>, frames: usize) -> Result<(), BackendError>;
    fn commit_sw_params(&self, swp: &Self::SwParams<'_>) -> Result<(), BackendError>;

    fn prepare(&self) -> Result<(), BackendError>;
    fn start(&self) -> Result<(), BackendError>;

    /// Block until the device is ready. `Ok(false)` means the timeout expired.
    fn wait(&self, timeout_ms: u32) -> Result<bool, BackendError>;
    /// Frames available to read (capture) or write (playback).
    fn avail_update(&self) -> Result<i64, BackendError>;
    /// Read interleaved frames into `buf`, returning the frame count.
    fn readi(&self, buf: &mut [i32]) -> Result<usize, BackendError>;
    /// Write interleaved frames from `buf`, returning the frame count.
    fn writei(&self, buf: &[i32]) -> Result<usize, BackendError>;
}

/// Open the named device and negotiate hardware and software parameters.
///
/// The first failing step aborts and is returned; anything acquired up to that
/// point is released on the way out.
pub fn open_stream<B: PcmBackend>(backend: &B, direction: Direction, settings: &StreamSettings) -> Result<B::Device, DeviceError> {
    debug!("Opening {} device '{}'", direction, settings.device);
    let pcm = backend.open(settings.device, direction).step(Step::Open)?;

    let rate = configure_hw(&pcm, settings)?;
    if rate != settings.rate {
        info!("Negotiated {} rate {} Hz (requested {} Hz)", direction, rate, settings.rate);
    }

    configure_sw(&pcm, settings)?;

    info!("Opened {} device '{}'", pcm.direction(), settings.device);
    Ok(pcm)
}

fn configure_hw<D: PcmDevice>(pcm: &D, settings: &StreamSettings) -> Result<u32, DeviceError> {
    let hwp = pcm.hw_params_any().step(Step::HwParamsAny)?;
    pcm.set_access(&hwp, Access::RwInterleaved).step(Step::Access)?;
    pcm.set_format(&hwp, settings.format).step(Step::Format)?;
    let rate = pcm.set_rate_near(&hwp, settings.rate).step(Step::Rate)?;
    pcm.set_channels(&hwp, settings.channels).step(Step::Channels)?;
    pcm.commit_hw_params(&hwp).step(Step::CommitHwParams)?;
    Ok(rate)
}

fn configure_sw<D: PcmDevice>(pcm: &D, settings: &StreamSettings) -> Result<(), DeviceError> {
    let swp = pcm.sw_params_current().step(Step::SwParamsCurrent)?;
    pcm.set_avail_min(&swp, settings.buffer_frames).step(Step::AvailMin)?;
    pcm.set_start_threshold(&swp, settings.start_threshold).step(Step::StartThreshold)?;
    pcm.commit_sw_params(&swp).step(Step::CommitSwParams)
}
