//! Audio device module for the capture-to-playback loopback.
//!
//! This module negotiates the PCM streams and runs the blocking transfer loop.
//! Device access goes through the [`PcmBackend`] seam, backed by alsa-lib in
//! production and by a scripted mock in tests.

mod alsa_backend;
mod buffer;
pub mod device;
#[cfg(test)]
pub(crate) mod mock;
pub mod transfer;

pub use alsa_backend::AlsaBackend;
pub use device::PcmBackend;
pub use transfer::Loopback;
