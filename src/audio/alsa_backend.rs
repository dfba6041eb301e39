//! ALSA implementation of the PCM traits.

use alsa::ValueOr;
use alsa::pcm::{Access as AlsaAccess, Format, Frames, HwParams, PCM, SwParams};
use tracing::debug;

use super::device::{Access, Direction, PcmBackend, PcmDevice};
use crate::config::SampleFormat;
use crate::error::BackendError;

impl From<Direction> for alsa::Direction {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Playback => alsa::Direction::Playback,
            Direction::Capture => alsa::Direction::Capture,
        }
    }
}

impl From<Access> for AlsaAccess {
    fn from(access: Access) -> Self {
        match access {
            Access::RwInterleaved => AlsaAccess::RWInterleaved,
        }
    }
}

impl From<SampleFormat> for Format {
    fn from(format: SampleFormat) -> Self {
        match format {
            SampleFormat::S32Le => Format::S32LE,
        }
    }
}

/// Opens blocking PCM handles through alsa-lib.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlsaBackend;

impl PcmBackend for AlsaBackend {
    type Device = AlsaDevice;

    fn open(&self, name: &str, direction: Direction) -> Result<AlsaDevice, BackendError> {
        let pcm = PCM::new(name, direction.into(), false)?;
        Ok(AlsaDevice { pcm, direction })
    }
}

/// An open ALSA PCM handle. Closed on drop.
pub struct AlsaDevice {
    pcm: PCM,
    direction: Direction,
}

impl PcmDevice for AlsaDevice {
    type HwParams<'a> = HwParams<'a>;
    type SwParams<'a> = SwParams<'a>;

    fn direction(&self) -> Direction {
        self.direction
    }

    fn hw_params_any(&self) -> Result<HwParams<'_>, BackendError> {
        Ok(HwParams::any(&self.pcm)?)
    }

    fn set_access(&self, hwp: &HwParams<'_>, access: Access) -> Result<(), BackendError> {
        Ok(hwp.set_access(access.into())?)
    }

    fn set_format(&self, hwp: &HwParams<'_>, format: SampleFormat) -> Result<(), BackendError> {
        Ok(hwp.set_format(format.into())?)
    }

    fn set_rate_near(&self, hwp: &HwParams<'_>, rate: u32) -> Result<u32, BackendError> {
        Ok(hwp.set_rate_near(rate, ValueOr::Nearest)?)
    }

    fn set_channels(&self, hwp: &HwParams<'_>, channels: u32) -> Result<(), BackendError> {
        Ok(hwp.set_channels(channels)?)
    }

    fn commit_hw_params(&self, hwp: &HwParams<'_>) -> Result<(), BackendError> {
        Ok(self.pcm.hw_params(hwp)?)
    }

    fn sw_params_current(&self) -> Result<SwParams<'_>, BackendError> {
        Ok(self.pcm.sw_params_current()?)
    }

    fn set_avail_min(&self, swp: &SwParams<'_>, frames: usize) -> Result<(), BackendError> {
        Ok(swp.set_avail_min(frames as Frames)?)
    }

    fn set_start_threshold(&self, swp: &SwParams<'_>, frames: usize) -> Result<(), BackendError> {
        Ok(swp.set_start_threshold(frames as Frames)?)
    }

    fn commit_sw_params(&self, swp: &SwParams<'_>) -> Result<(), BackendError> {
        Ok(self.pcm.sw_params(swp)?)
    }

    fn prepare(&self) -> Result<(), BackendError> {
        Ok(self.pcm.prepare()?)
    }

    fn start(&self) -> Result<(), BackendError> {
        Ok(self.pcm.start()?)
    }

    fn wait(&self, timeout_ms: u32) -> Result<bool, BackendError> {
        Ok(self.pcm.wait(Some(timeout_ms))?)
    }

    fn avail_update(&self) -> Result<i64, BackendError> {
        Ok(self.pcm.avail_update().map(i64::from)?)
    }

    fn readi(&self, buf: &mut [i32]) -> Result<usize, BackendError> {
        Ok(self.pcm.io_i32()?.readi(buf)?)
    }

    fn writei(&self, buf: &[i32]) -> Result<usize, BackendError> {
        Ok(self.pcm.io_i32()?.writei(buf)?)
    }
}

impl Drop for AlsaDevice {
    fn drop(&mut self) {
        debug!("Closing {} device", self.direction);
    }
}
