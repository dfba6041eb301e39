//! Scripted PCM backend for testing without hardware.
//!
//! Every call made through [`PcmBackend`] and [`PcmDevice`] is appended to a
//! shared log, including descriptor frees and device closes, so tests can
//! assert on ordering. Wait, availability and I/O results are replayed from
//! per-direction scripts.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::device::{Access, Direction, PcmBackend, PcmDevice};
use crate::config::SampleFormat;
use crate::error::{BackendError, Step};

pub const EIO: i32 = 5;
pub const EPIPE: i32 = 32;

const CHANNELS: usize = 2;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(Direction, String),
    HwParamsAny(Direction),
    Access(Direction, Access),
    Format(Direction, SampleFormat),
    Rate(Direction, u32),
    Channels(Direction, u32),
    CommitHwParams(Direction),
    FreeHwParams(Direction),
    SwParamsCurrent(Direction),
    AvailMin(Direction, usize),
    StartThreshold(Direction, usize),
    CommitSwParams(Direction),
    FreeSwParams(Direction),
    Prepare(Direction),
    Start(Direction),
    Wait(Direction, u32),
    Avail(Direction),
    Read(Direction, usize),
    Write(Direction, usize),
    Close(Direction),
}

impl Call {
    /// Negotiation step this call belongs to, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            Call::Open(..) => Some(Step::Open),
            Call::HwParamsAny(_) => Some(Step::HwParamsAny),
            Call::Access(..) => Some(Step::Access),
            Call::Format(..) => Some(Step::Format),
            Call::Rate(..) => Some(Step::Rate),
            Call::Channels(..) => Some(Step::Channels),
            Call::CommitHwParams(_) => Some(Step::CommitHwParams),
            Call::SwParamsCurrent(_) => Some(Step::SwParamsCurrent),
            Call::AvailMin(..) => Some(Step::AvailMin),
            Call::StartThreshold(..) => Some(Step::StartThreshold),
            Call::CommitSwParams(_) => Some(Step::CommitSwParams),
            _ => None,
        }
    }
}

#[derive(Default)]
struct DeviceScript {
    waits: VecDeque<Result<bool, BackendError>>, // Exhausted script fails the wait
    avails: VecDeque<i64>,                       // Exhausted script reports 0
    rate_near: Option<u32>,                      // Rate handed back by set_rate_near
    io_errno: Option<i32>,                       // Fail every readi/writei
    next_sample: i32,                            // Capture pattern counter
}

#[derive(Default)]
struct MockState {
    calls: RefCell<Vec<Call>>,
    failures: RefCell<Vec<(Direction, Step)>>,
    scripts: RefCell<HashMap<Direction, DeviceScript>>,
    written: RefCell<Vec<Vec<i32>>>,
}

impl MockState {
    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, direction: Direction, step: Step, func: &'static str) -> Result<(), BackendError> {
        if self.failures.borrow().contains(&(direction, step)) {
            Err(BackendError::new(func, EIO))
        } else {
            Ok(())
        }
    }

    fn with_script<T>(&self, direction: Direction, f: impl FnOnce(&mut DeviceScript) -> T) -> T {
        let mut scripts = self.scripts.borrow_mut();
        f(scripts.entry(direction).or_default())
    }
}

/// Backend handing out [`MockDevice`]s that share one call log.
#[derive(Default)]
pub struct MockBackend {
    state: Rc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.borrow().clone()
    }

    /// Sample buffers handed to `writei`, in call order.
    pub fn written(&self) -> Vec<Vec<i32>> {
        self.state.written.borrow().clone()
    }

    /// Make `step` fail with EIO on the given direction.
    pub fn fail_on(&self, direction: Direction, step: Step) {
        self.state.failures.borrow_mut().push((direction, step));
    }

    /// Rate reported back by `set_rate_near`.
    pub fn set_rate_near(&self, direction: Direction, rate: u32) {
        self.state.with_script(direction, |s| s.rate_near = Some(rate));
    }

    /// Queue wait results; once drained, the wait fails with EIO.
    pub fn script_waits(&self, direction: Direction, waits: impl IntoIterator<Item = Result<bool, BackendError>>) {
        self.state.with_script(direction, |s| s.waits.extend(waits));
    }

    /// Queue availability reports; negative values fail with that errno.
    pub fn script_avail(&self, direction: Direction, avails: impl IntoIterator<Item = i64>) {
        self.state.with_script(direction, |s| s.avails.extend(avails));
    }

    /// Make every read or write on the direction fail.
    pub fn fail_io(&self, direction: Direction, errno: i32) {
        self.state.with_script(direction, |s| s.io_errno = Some(errno));
    }
}

impl PcmBackend for MockBackend {
    type Device = MockDevice;

    fn open(&self, name: &str, direction: Direction) -> Result<MockDevice, BackendError> {
        self.state.record(Call::Open(direction, name.to_string()));
        self.state.check(direction, Step::Open, "snd_pcm_open")?;
        Ok(MockDevice { direction, state: self.state.clone() })
    }
}

/// An open mock handle; records `Close` when dropped.
pub struct MockDevice {
    direction: Direction,
    state: Rc<MockState>,
}

/// Descriptor that records its own release.
pub struct MockParams<'a> {
    device: &'a MockDevice,
    release: fn(Direction) -> Call,
}

impl Drop for MockParams<'_> {
    fn drop(&mut self) {
        self.device.state.record((self.release)(self.device.direction));
    }
}

impl MockDevice {
    fn negotiate(&self, call: Call, step: Step, func: &'static str) -> Result<(), BackendError> {
        self.state.record(call);
        self.state.check(self.direction, step, func)
    }
}

impl PcmDevice for MockDevice {
    type HwParams<'a> = MockParams<'a>;
    type SwParams<'a> = MockParams<'a>;

    fn direction(&self) -> Direction {
        self.direction
    }

    fn hw_params_any(&self) -> Result<MockParams<'_>, BackendError> {
        self.negotiate(Call::HwParamsAny(self.direction), Step::HwParamsAny, "snd_pcm_hw_params_any")?;
        Ok(MockParams { device: self, release: Call::FreeHwParams })
    }

    fn set_access(&self, _hwp: &MockParams<'_>, access: Access) -> Result<(), BackendError> {
        self.negotiate(Call::Access(self.direction, access), Step::Access, "snd_pcm_hw_params_set_access")
    }

    fn set_format(&self, _hwp: &MockParams<'_>, format: SampleFormat) -> Result<(), BackendError> {
        self.negotiate(Call::Format(self.direction, format), Step::Format, "snd_pcm_hw_params_set_format")
    }

    fn set_rate_near(&self, _hwp: &MockParams<'_>, rate: u32) -> Result<u32, BackendError> {
        self.negotiate(Call::Rate(self.direction, rate), Step::Rate, "snd_pcm_hw_params_set_rate_near")?;
        Ok(self.state.with_script(self.direction, |s| s.rate_near.unwrap_or(rate)))
    }

    fn set_channels(&self, _hwp: &MockParams<'_>, channels: u32) -> Result<(), BackendError> {
        self.negotiate(Call::Channels(self.direction, channels), Step::Channels, "snd_pcm_hw_params_set_channels")
    }

    fn commit_hw_params(&self, _hwp: &MockParams<'_>) -> Result<(), BackendError> {
        self.negotiate(Call::CommitHwParams(self.direction), Step::CommitHwParams, "snd_pcm_hw_params")
    }

    fn sw_params_current(&self) -> Result<MockParams<'_>, BackendError> {
        self.negotiate(Call::SwParamsCurrent(self.direction), Step::SwParamsCurrent, "snd_pcm_sw_params_current")?;
        Ok(MockParams { device: self, release: Call::FreeSwParams })
    }

    fn set_avail_min(&self, _swp: &MockParams<'_>, frames: usize) -> Result<(), BackendError> {
        self.negotiate(Call::AvailMin(self.direction, frames), Step::AvailMin, "snd_pcm_sw_params_set_avail_min")
    }

    fn set_start_threshold(&self, _swp: &MockParams<'_>, frames: usize) -> Result<(), BackendError> {
        self.negotiate(Call::StartThreshold(self.direction, frames), Step::StartThreshold, "snd_pcm_sw_params_set_start_threshold")
    }

    fn commit_sw_params(&self, _swp: &MockParams<'_>) -> Result<(), BackendError> {
        self.negotiate(Call::CommitSwParams(self.direction), Step::CommitSwParams, "snd_pcm_sw_params")
    }

    fn prepare(&self) -> Result<(), BackendError> {
        self.negotiate(Call::Prepare(self.direction), Step::Prepare, "snd_pcm_prepare")
    }

    fn start(&self) -> Result<(), BackendError> {
        self.negotiate(Call::Start(self.direction), Step::Start, "snd_pcm_start")
    }

    fn wait(&self, timeout_ms: u32) -> Result<bool, BackendError> {
        self.state.record(Call::Wait(self.direction, timeout_ms));
        self.state
            .with_script(self.direction, |s| s.waits.pop_front())
            .unwrap_or_else(|| Err(BackendError::new("snd_pcm_wait", EIO)))
    }

    fn avail_update(&self) -> Result<i64, BackendError> {
        self.state.record(Call::Avail(self.direction));
        let avail = self.state.with_script(self.direction, |s| s.avails.pop_front()).unwrap_or(0);
        if avail < 0 {
            // Any negative report maps to its errno; -1 is EPERM.
            Err(BackendError::new("snd_pcm_avail_update", avail as i32))
        } else {
            Ok(avail)
        }
    }

    fn readi(&self, buf: &mut [i32]) -> Result<usize, BackendError> {
        let frames = buf.len() / CHANNELS;
        self.state.record(Call::Read(self.direction, frames));
        self.state.with_script(self.direction, |s| {
            if let Some(errno) = s.io_errno {
                return Err(BackendError::new("snd_pcm_readi", errno));
            }
            for sample in buf.iter_mut() {
                s.next_sample += 1;
                *sample = s.next_sample;
            }
            Ok(frames)
        })
    }

    fn writei(&self, buf: &[i32]) -> Result<usize, BackendError> {
        let frames = buf.len() / CHANNELS;
        self.state.record(Call::Write(self.direction, frames));
        self.state.written.borrow_mut().push(buf.to_vec());
        match self.state.with_script(self.direction, |s| s.io_errno) {
            Some(errno) => Err(BackendError::new("snd_pcm_writei", errno)),
            None => Ok(frames),
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.record(Call::Close(self.direction));
    }
}
