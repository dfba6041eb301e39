//! Capture-to-playback transfer loop.
//!
//! A single thread blocks on playback readiness, then moves whatever capture
//! has available into the shared buffer and whatever playback can accept out
//! of it. The two counts are independent snapshots: playback may receive
//! stale or still-zero frames when capture has produced less.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::buffer::TransferBuffer;
use super::device::{Direction, PcmBackend, PcmDevice, open_stream};
use crate::config::StreamSettings;
use crate::error::{BackendError, DeviceError, Step, StepContext};

/// Log one in this many per-iteration I/O failures.
const ERROR_LOG_INTERVAL: u64 = 100;

const EINTR: i32 = 4;

/// Counters describing the loop's progress, including failures it ignores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub iterations: u64,      // Loop iterations entered
    pub wait_timeouts: u64,   // Readiness waits that expired
    pub frames_captured: u64, // Frames read from capture
    pub frames_played: u64,   // Frames written to playback
    pub capture_errors: u64,  // Failed capture avail/read calls
    pub playback_errors: u64, // Failed playback avail/write calls
}

impl TransferStats {
    fn record_error(&mut self, direction: Direction, err: &BackendError) {
        let counter = match direction {
            Direction::Capture => &mut self.capture_errors,
            Direction::Playback => &mut self.playback_errors,
        };
        let count = *counter;
        *counter += 1;
        if count.is_multiple_of(ERROR_LOG_INTERVAL) {
            warn!("{} {} failed({}), {} error(s) so far", direction, err.func, err, count + 1);
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested from outside
    Shutdown,
    /// The playback readiness wait failed
    WaitFailed(DeviceError),
}

impl LoopExit {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoopExit::Shutdown => 0,
            LoopExit::WaitFailed(e) => e.code(),
        }
    }
}

/// Owns both device handles, the transfer buffer and the loop statistics.
pub struct Loopback<D: PcmDevice> {
    playback: D,
    capture: D,
    buffer: TransferBuffer,
    settings: StreamSettings,
    stats: TransferStats,
}

impl<D: PcmDevice> Loopback<D> {
    /// Open and configure playback, then capture.
    ///
    /// # Errors
    /// Returns the first negotiation failure. A playback handle opened before
    /// a capture failure is closed on return.
    pub fn open<B>(backend: &B, settings: StreamSettings) -> Result<Self, DeviceError>
    where
        B: PcmBackend<Device = D>,
    {
        let playback = open_stream(backend, Direction::Playback, &settings)?;
        let capture = open_stream(backend, Direction::Capture, &settings)?;
        let buffer = TransferBuffer::new(settings.buffer_frames, settings.channels);
        debug!("Transfer buffer: {} frames, {} samples", buffer.capacity_frames(), buffer.capacity_samples());

        Ok(Self { playback, capture, buffer, settings, stats: TransferStats::default() })
    }

    /// Prepare playback for writes and start capture.
    pub fn start(&self) -> Result<(), DeviceError> {
        self.playback.prepare().step(Step::Prepare)?;
        self.capture.start().step(Step::Start)?;
        info!("Loopback started");
        Ok(())
    }

    /// Run until the readiness wait fails or `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> LoopExit {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                debug!("Shutdown requested, leaving transfer loop");
                return LoopExit::Shutdown;
            }

            if let Err(e) = self.iterate() {
                error!("{}", e);
                return LoopExit::WaitFailed(e);
            }
        }
    }

    /// One loop iteration: wait, capture, play.
    ///
    /// Only a failed wait is returned; a timeout still runs the transfers, an
    /// interrupted wait skips them.
    pub fn iterate(&mut self) -> Result<(), DeviceError> {
        self.stats.iterations += 1;

        match self.playback.wait(self.settings.wait_timeout_ms) {
            Ok(true) => {}
            Ok(false) => self.stats.wait_timeouts += 1,
            Err(e) if e.errno == EINTR => {
                // A signal woke the poll; go back and check for shutdown.
                debug!("Readiness wait interrupted");
                return Ok(());
            }
            Err(e) => return Err(DeviceError::new(Step::Wait, e)),
        }

        self.capture_frames();
        self.play_frames();
        Ok(())
    }

    fn capture_frames(&mut self) {
        let Some(frames) = self.available(Direction::Capture) else {
            return;
        };
        match self.capture.readi(self.buffer.frames_mut(frames)) {
            Ok(read) => self.stats.frames_captured += read as u64,
            Err(e) => self.stats.record_error(Direction::Capture, &e),
        }
    }

    fn play_frames(&mut self) {
        let Some(frames) = self.available(Direction::Playback) else {
            return;
        };
        match self.playback.writei(self.buffer.frames(frames)) {
            Ok(written) => self.stats.frames_played += written as u64,
            Err(e) => self.stats.record_error(Direction::Playback, &e),
        }
    }

    /// Positive availability clamped to the buffer, or `None` to skip the transfer.
    fn available(&mut self, direction: Direction) -> Option<usize> {
        let device = match direction {
            Direction::Capture => &self.capture,
            Direction::Playback => &self.playback,
        };
        match device.avail_update() {
            Ok(avail) if avail > 0 => Some(self.buffer.clamp(avail as usize)),
            Ok(_) => None,
            Err(e) => {
                self.stats.record_error(direction, &e);
                None
            }
        }
    }

    /// Close playback, then capture, and hand back the final statistics.
    pub fn close(self) -> TransferStats {
        let Self { playback, capture, stats, .. } = self;
        drop(playback);
        drop(capture);

        info!(
            "Loopback closed after {} iterations: {} frames captured, {} frames played",
            stats.iterations, stats.frames_captured, stats.frames_played
        );
        if stats.capture_errors > 0 || stats.playback_errors > 0 {
            warn!("I/O errors: capture={}, playback={}", stats.capture_errors, stats.playback_errors);
        }
        debug!("Wait timeouts: {}", stats.wait_timeouts);
        stats
    }
}
