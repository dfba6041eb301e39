//! Fixed-capacity staging buffer between capture reads and playback writes.

/// Interleaved `i32` frames shared by the capture read and the playback write.
///
/// Allocated once and zero-filled; the capacity never changes.
pub struct TransferBuffer {
    samples: Box<[i32]>,
    channels: usize,
}

impl TransferBuffer {
    pub fn new(frames: usize, channels: u32) -> Self {
        let channels = channels as usize;
        Self { samples: vec![0; frames * channels].into_boxed_slice(), channels }
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Capacity in samples (frames × channels).
    pub fn capacity_samples(&self) -> usize {
        self.samples.len()
    }

    /// Clamp a frame count to the buffer capacity.
    pub fn clamp(&self, frames: usize) -> usize {
        frames.min(self.capacity_frames())
    }

    /// The first `frames` frames, for writing to playback.
    pub fn frames(&self, frames: usize) -> &[i32] {
        &self.samples[..self.clamp(frames) * self.channels]
    }

    /// The first `frames` frames, for reading from capture.
    pub fn frames_mut(&mut self, frames: usize) -> &mut [i32] {
        let len = self.clamp(frames) * self.channels;
        &mut self.samples[..len]
    }
}
