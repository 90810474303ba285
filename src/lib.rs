//! monowav is a streaming decoder for mono WAV files for embedded audio playback.
//!
//! The file is never loaded into memory. [`MonoWavPlayer`] reads one period of
//! sample data at a time from a seekable [`ByteSource`] into one of two fixed
//! size buffers, and hands the other buffer to the audio output. Playback speed
//! can be changed at any time between 0.1x and 2x.
//!
//! Supported files are uncompressed 8bit (unsigned) or 16bit (signed) mono
//! linear PCM, with the data chunk directly following the fmt chunk.
//!
//! # Examples
//!
//! Stream a WAV file embedded with `include_bytes!`.
//! ```
//! use monowav::{MonoWavPlayer, PlaybackState, SliceSource};
//!
//! # fn main() -> Result<(), monowav::WavError> {
//! # let mut wav = Vec::new();
//! # wav.extend_from_slice(b"RIFF\x24\x04\x00\x00WAVEfmt \x10\x00\x00\x00");
//! # wav.extend_from_slice(&[1, 0, 1, 0, 0x40, 0x1f, 0, 0, 0x40, 0x1f, 0, 0, 1, 0, 8, 0]);
//! # wav.extend_from_slice(b"data\x00\x04\x00\x00");
//! # wav.resize(44 + 1024, 0x80);
//! let mut player = MonoWavPlayer::new(SliceSource::new(&wav))?;
//! player.set_speed(1.5);
//!
//! while player.state() != PlaybackState::Done {
//!     let samples = player.get_buffer()?.samples();
//!     println!("{} bytes", samples.len());
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod buffer;
mod error;
mod player;
mod source;
mod speed;
mod wav;

pub use buffer::{BufferAllocator, BufferStructure, InlineAllocator, SampleBuffer};
pub use error::WavError;
pub use player::{BufferResult, MonoWavPlayer, PlaybackState};
#[cfg(any(test, feature = "std"))]
pub use source::IoSource;
pub use source::{ByteSource, SliceSource, SliceSourceError};
pub use speed::PlaybackSpeed;

/// Capacity of each of the two output buffers in bytes.
pub const MAX_BUFFER_BYTES: usize = 512;

/// Capacity of the buffer one period of source data is read into.
/// Large enough for one period at [`PlaybackSpeed::MAX`].
pub const SCRATCH_BYTES: usize = MAX_BUFFER_BYTES * 2;

/// Sample encoding of the data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8bit unsigned linear PCM
    U8,
    /// 16bit signed little endian linear PCM
    I16,
}

impl SampleFormat {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::I16 => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    /// In WAV files 8bit samples are unsigned and larger samples are signed.
    pub fn is_signed(self) -> bool {
        matches!(self, SampleFormat::I16)
    }

    /// Byte value of silence. Both bytes of a 16bit silent sample are zero.
    pub(crate) fn silence(self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            SampleFormat::I16 => 0x00,
        }
    }
}

/// Basic information on the WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpecs {
    /// Sample encoding.
    pub sample_format: SampleFormat,
    /// Number of channels. Always 1.
    pub num_channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}
