//! Error types for device negotiation and the transfer loop.
//!
//! Backend failures carry the failing call and its errno. Device errors wrap a
//! backend failure with the negotiation step that produced it, and render as
//! `"<description>(<library error>)"` on the diagnostic stream.

use std::fmt;

/// A failure reported by the audio backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe_errno(.errno))]
pub struct BackendError {
    /// Backend function that failed (e.g. `snd_pcm_open`).
    pub func: &'static str,
    /// Positive errno value.
    pub errno: i32,
}

impl BackendError {
    pub fn new(func: &'static str, errno: i32) -> Self {
        Self { func, errno: errno.abs() }
    }

    /// Negative error code, as returned by the C library and used as exit status.
    pub fn code(&self) -> i32 {
        -self.errno
    }
}

impl From<alsa::Error> for BackendError {
    fn from(e: alsa::Error) -> Self {
        Self::new(e.func(), e.errno())
    }
}

/// Render an errno the way `strerror` does, without the `(os error N)` suffix.
fn describe_errno(errno: &i32) -> String {
    let text = std::io::Error::from_raw_os_error(*errno).to_string();
    match text.rfind(" (os error ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}

/// Operation during which a device call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Open,
    HwParamsAny,
    Access,
    Format,
    Rate,
    Channels,
    CommitHwParams,
    SwParamsCurrent,
    AvailMin,
    StartThreshold,
    CommitSwParams,
    Prepare,
    Start,
    Wait,
}

impl Step {
    /// Human-readable description printed in front of the library error.
    pub fn description(&self) -> &'static str {
        match self {
            Step::Open => "cannot open audio device",
            Step::HwParamsAny => "cannot initialize hardware parameter structure",
            Step::Access => "cannot set access type",
            Step::Format => "cannot set sample format",
            Step::Rate => "cannot set sample rate",
            Step::Channels => "cannot set channel count",
            Step::CommitHwParams => "cannot set parameters",
            Step::SwParamsCurrent => "cannot initialize software parameters structure",
            Step::AvailMin => "cannot set minimum available count",
            Step::StartThreshold => "cannot set start mode",
            Step::CommitSwParams => "cannot set software parameters",
            Step::Prepare | Step::Start => "cannot prepare audio interface for use",
            Step::Wait => "poll failed",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A fatal device failure, tagged with the step that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{step}({source})")]
pub struct DeviceError {
    pub step: Step,
    #[source]
    pub source: BackendError,
}

impl DeviceError {
    pub fn new(step: Step, source: BackendError) -> Self {
        Self { step, source }
    }

    /// Negative error code of the underlying backend call.
    pub fn code(&self) -> i32 {
        self.source.code()
    }
}

/// Extension for tagging a backend result with the step it belongs to.
pub trait StepContext<T> {
    fn step(self, step: Step) -> Result<T, DeviceError>;
}

impl<T> StepContext<T> for Result<T, BackendError> {
    fn step(self, step: Step) -> Result<T, DeviceError> {
        self.map_err(|e| DeviceError::new(step, e))
    }
}
