//! Double buffered streaming player.
//!
//! [`MonoWavPlayer::get_buffer`] is meant to be called once per audio period
//! from the output callback (possibly an interrupt). Each call reads one period
//! of source data into one buffer and returns the other buffer, which was filled
//! by the previous call. The returned slice stays valid and untouched until the
//! next call. Calls must not overlap: the caller serializes `get_buffer`,
//! `rewind` and `set_speed`.
//!
//! Both buffers start empty, so the first call returns an empty priming buffer.
//! Consumers play an empty buffer as one period of silence.

use crate::buffer::{
    BufferAllocator, BufferStructure, DoubleBuffer, InlineAllocator, SampleBuffer,
};
use crate::source::{read_fault, ByteSource};
use crate::wav::read_header;
use crate::{PlaybackSpeed, SampleFormat, WavError, WavSpecs, MAX_BUFFER_BYTES, SCRATCH_BYTES};

/// Buffers handed to DMA are padded to this alignment at the end of the stream.
const WORD_BYTES: usize = 4;

/// Playback state of [`MonoWavPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Sample data remains in the source.
    Playing,
    /// The source is exhausted but the last filled buffer has not been handed out yet.
    Draining,
    /// Every buffer has been handed out. `get_buffer` returns empty `Done` results.
    Done,
}

/// Buffer returned by [`MonoWavPlayer::get_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferResult<'a> {
    /// Sample data remains in the source.
    MoreData(&'a [u8]),
    /// The source is exhausted. The last buffer may still be pending: playback
    /// is finished once [`MonoWavPlayer::state`] is [`PlaybackState::Done`].
    Done(&'a [u8]),
}

impl<'a> BufferResult<'a> {
    /// Sample bytes in native WAV encoding (u8, or i16 little endian).
    pub fn samples(&self) -> &'a [u8] {
        match *self {
            BufferResult::MoreData(samples) | BufferResult::Done(samples) => samples,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BufferResult::Done(_))
    }
}

/// Read position inside the data chunk.
#[derive(Debug, Clone, Copy)]
struct StreamCursor {
    data_start: u32,
    data_length: u32,
    bytes_remaining: u32,
}

impl StreamCursor {
    /// Absolute source offset of the next unread sample byte.
    fn position(&self) -> u32 {
        self.data_start + (self.data_length - self.bytes_remaining)
    }

    /// Read exactly `buf.len()` bytes and account for them.
    ///
    /// On failure nothing is accounted and the source is moved back to where
    /// the read started, so a retry reads the same bytes.
    fn read<S: ByteSource>(&mut self, source: &mut S, buf: &mut [u8]) -> Result<(), WavError> {
        let error = match source.read(buf) {
            Ok(n) if n == buf.len() => {
                self.bytes_remaining -= n as u32;
                return Ok(());
            }
            Ok(n) => {
                log::warn!("short read: {} of {} bytes", n, buf.len());
                WavError::SourceRead
            }
            Err(e) => read_fault(e),
        };

        if let Err(e) = source.seek(self.position()) {
            log::warn!("failed to restore read position: {:?}", e);
        }
        Err(error)
    }
}

/// Nearest neighbour resampling by truncation.
///
/// Output sample `j` is input sample `floor(j * speed)`. Stops when the input
/// runs out, so the result may be shorter than the buffer capacity.
fn resample(input: &[u8], speed: PlaybackSpeed, bytes_per_sample: usize, out: &mut SampleBuffer) {
    out.clear();
    let capacity = (out.capacity() / bytes_per_sample) as u32;
    for index in 0..capacity {
        let start = speed.source_index(index) as usize * bytes_per_sample;
        let Some(sample) = input.get(start..start + bytes_per_sample) else {
            break;
        };
        if out.extend_from_slice(sample).is_err() {
            break;
        }
    }
}

/// Pad with silence up to a multiple of [`WORD_BYTES`].
fn pad_to_word(out: &mut SampleBuffer, format: SampleFormat) {
    let silence = format.silence();
    while out.len() % WORD_BYTES != 0 {
        if out.push(silence).is_err() {
            break;
        }
    }
}

/// Streams a mono WAV file from a [`ByteSource`] through two alternating buffers.
pub struct MonoWavPlayer<S: ByteSource, A: BufferAllocator = InlineAllocator> {
    source: S,
    allocator: A,
    specs: WavSpecs,
    cursor: StreamCursor,
    /// None after deinit.
    buffers: Option<DoubleBuffer<A::Buffer>>,
    scratch: [u8; SCRATCH_BYTES],
    speed: PlaybackSpeed,
    state: PlaybackState,
}

impl<S: ByteSource> MonoWavPlayer<S> {
    /// Parse the WAV header and keep both sample buffers inline.
    /// * 'source' - WAV file. It is rewound before parsing.
    pub fn new(source: S) -> Result<Self, WavError> {
        Self::with_allocator(source, InlineAllocator)
    }
}

impl<S: ByteSource, A: BufferAllocator> MonoWavPlayer<S, A> {
    /// Parse the WAV header and allocate both sample buffers from `allocator`.
    ///
    /// # Errors
    ///
    /// * `WavError::SourceRead` - The source failed or the fmt chunk is truncated.
    /// * `WavError::MalformedHeader` - Not a RIFF/WAVE file, or the data chunk does not follow the fmt chunk.
    /// * `WavError::UnsupportedFormat` - Not 8bit or 16bit mono linear PCM.
    /// * `WavError::AllocationFailure` - The allocator ran out of buffers. Nothing stays allocated.
    pub fn with_allocator(mut source: S, mut allocator: A) -> Result<Self, WavError> {
        let header = read_header(&mut source)?;

        let a = allocator.allocate().ok_or(WavError::AllocationFailure)?;
        let Some(b) = allocator.allocate() else {
            allocator.release(a);
            return Err(WavError::AllocationFailure);
        };

        let state = if header.data_length > 0 {
            PlaybackState::Playing
        } else {
            PlaybackState::Done
        };

        Ok(MonoWavPlayer {
            source,
            allocator,
            specs: header.specs,
            cursor: StreamCursor {
                data_start: header.data_start,
                data_length: header.data_length,
                bytes_remaining: header.data_length,
            },
            buffers: Some(DoubleBuffer::new(a, b)),
            scratch: [0u8; SCRATCH_BYTES],
            speed: PlaybackSpeed::NORMAL,
            state,
        })
    }

    /// Fill the next buffer and return the one filled by the previous call.
    ///
    /// Reads `floor(speed * MAX_BUFFER_BYTES)` bytes (whole samples, at most the
    /// remaining bytes) from the source. The buffer that exhausts the source is
    /// padded with silence to a multiple of 4 bytes.
    ///
    /// Returns `MoreData` while source data remains, `Done` afterwards. The call
    /// that exhausts the source still returns the previous buffer and moves to
    /// [`PlaybackState::Draining`]; the call after it returns the last buffer and
    /// moves to [`PlaybackState::Done`]. From then on `Done` with an empty slice
    /// is returned on every call without touching any state.
    ///
    /// # Errors
    ///
    /// * `WavError::SourceRead` - The read failed or was short. Nothing is consumed and the next call retries the same bytes.
    /// * `WavError::Deinitialized` - [`MonoWavPlayer::deinit`] was called.
    pub fn get_buffer(&mut self) -> Result<BufferResult<'_>, WavError> {
        let buffers = self.buffers.as_mut().ok_or(WavError::Deinitialized)?;

        match self.state {
            PlaybackState::Done => return Ok(BufferResult::Done(&[])),
            PlaybackState::Draining => {
                let (fill, _) = buffers.split();
                fill.clear();
                self.state = PlaybackState::Done;
            }
            PlaybackState::Playing => {
                let format = self.specs.sample_format;
                let bytes_per_sample = format.bytes_per_sample();
                let period = self.speed.bytes_per_period() / bytes_per_sample * bytes_per_sample;
                let bytes_to_read = period.min(self.cursor.bytes_remaining as usize);
                debug_assert!(bytes_to_read <= SCRATCH_BYTES);
                log::trace!("bytes_to_read: {}", bytes_to_read);

                let input = &mut self.scratch[..bytes_to_read];
                self.cursor.read(&mut self.source, input)?;
                log::trace!("bytes_remaining: {}", self.cursor.bytes_remaining);

                let (fill, _) = buffers.split();
                resample(input, self.speed, bytes_per_sample, fill);

                if self.cursor.bytes_remaining == 0 {
                    log::trace!("padding last buffer of {} bytes", fill.len());
                    pad_to_word(fill, format);
                    self.state = PlaybackState::Draining;
                }
            }
        }

        let ready = buffers.swap().as_slice();
        if self.cursor.bytes_remaining > 0 {
            Ok(BufferResult::MoreData(ready))
        } else {
            Ok(BufferResult::Done(ready))
        }
    }

    /// Restart from the first sample, e.g. for loop playback.
    ///
    /// The buffer alternation is kept: a buffer that has not been handed out yet
    /// is returned by the next call, so loops are gapless.
    pub fn rewind(&mut self) -> Result<(), WavError> {
        if self.buffers.is_none() {
            return Err(WavError::Deinitialized);
        }
        self.source.seek(self.cursor.data_start).map_err(read_fault)?;
        self.cursor.bytes_remaining = self.cursor.data_length;
        log::debug!("rewind to offset {}", self.cursor.data_start);
        self.state = if self.cursor.data_length > 0 {
            PlaybackState::Playing
        } else {
            PlaybackState::Done
        };
        Ok(())
    }

    /// Set the playback speed. Clamped to [0.1, 2.0]; takes effect on the next buffer.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = PlaybackSpeed::new(speed);
        debug_assert!(self.speed.bytes_per_period() <= SCRATCH_BYTES);
        log::debug!("playback speed: {}", self.speed.as_f32());
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    /// Returns basic information about the WAV file.
    pub fn specs(&self) -> WavSpecs {
        self.specs
    }

    pub fn sample_rate(&self) -> u32 {
        self.specs.sample_rate
    }

    /// Override the sample rate reported to the audio output.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.specs.sample_rate = sample_rate;
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.specs.sample_format.bits_per_sample()
    }

    pub fn channel_count(&self) -> u16 {
        self.specs.num_channels
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Length of the data chunk in bytes.
    pub fn data_length(&self) -> u32 {
        self.cursor.data_length
    }

    /// Sample bytes not yet read from the source.
    pub fn bytes_remaining(&self) -> u32 {
        self.cursor.bytes_remaining
    }

    /// Layout of the buffers returned by [`MonoWavPlayer::get_buffer`].
    pub fn buffer_structure(&self) -> BufferStructure {
        BufferStructure {
            single_buffer: false,
            samples_signed: self.specs.sample_format.is_signed(),
            max_buffer_length: MAX_BUFFER_BYTES as u32,
            spacing: 1,
        }
    }

    /// Release both buffers. Every later `get_buffer` or `rewind` fails with
    /// `WavError::Deinitialized`.
    pub fn deinit(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            let (a, b) = buffers.into_buffers();
            self.allocator.release(a);
            self.allocator.release(b);
            log::debug!("player deinitialized");
        }
    }

    pub fn is_deinit(&self) -> bool {
        self.buffers.is_none()
    }
}

impl<S: ByteSource, A: BufferAllocator> Drop for MonoWavPlayer<S, A> {
    fn drop(&mut self) {
        self.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::wav_file;
    use crate::{SliceSource, SliceSourceError};
    use core::cell::Cell;

    /// Counts buffers and fails once `limit` buffers are out.
    struct CountingAllocator<'a> {
        limit: usize,
        allocated: &'a Cell<usize>,
        released: &'a Cell<usize>,
    }

    impl BufferAllocator for CountingAllocator<'_> {
        type Buffer = SampleBuffer;

        fn allocate(&mut self) -> Option<Self::Buffer> {
            if self.allocated.get() - self.released.get() >= self.limit {
                return None;
            }
            self.allocated.set(self.allocated.get() + 1);
            Some(SampleBuffer::new())
        }

        fn release(&mut self, _buffer: Self::Buffer) {
            self.released.set(self.released.get() + 1);
        }
    }

    /// Slice source whose reads fail while `fail` is set.
    struct FlakySource<'a> {
        inner: SliceSource<'a>,
        fail: &'a Cell<bool>,
    }

    impl ByteSource for FlakySource<'_> {
        type Error = SliceSourceError;

        fn seek(&mut self, offset: u32) -> Result<(), Self::Error> {
            self.inner.seek(offset)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            if self.fail.get() {
                // Partial transfer before the fault
                let n = buf.len() / 2;
                self.inner.read(&mut buf[..n])?;
                return Err(SliceSourceError::SeekOutOfBounds(u32::MAX));
            }
            self.inner.read(buf)
        }

        fn position(&mut self) -> Result<u32, Self::Error> {
            self.inner.position()
        }
    }

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn resample_identity_and_double() {
        let input = ramp(1024);
        let mut out = SampleBuffer::new();

        resample(&input[..512], PlaybackSpeed::NORMAL, 1, &mut out);
        assert_eq!(out.as_slice(), &input[..512]);

        resample(&input, PlaybackSpeed::MAX, 1, &mut out);
        assert_eq!(out.len(), 512);
        assert!(out.iter().enumerate().all(|(j, &v)| v == input[2 * j]));
    }

    #[test]
    fn resample_half_speed_repeats_samples() {
        let input = ramp(256);
        let mut out = SampleBuffer::new();
        resample(&input, PlaybackSpeed::new(0.5), 1, &mut out);
        assert_eq!(out.len(), 512);
        assert_eq!(&out[..6], &[0, 0, 1, 1, 2, 2]);
        assert_eq!(out[511], 255);
    }

    #[test]
    fn resample_16bit_keeps_byte_pairs() {
        let input = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut out = SampleBuffer::new();
        resample(&input, PlaybackSpeed::MAX, 2, &mut out);
        assert_eq!(out.as_slice(), &[0x01, 0x02, 0x05, 0x06]);

        // A trailing partial sample is dropped
        resample(&input[..5], PlaybackSpeed::NORMAL, 2, &mut out);
        assert_eq!(out.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn padding() {
        let mut out = SampleBuffer::new();
        out.extend_from_slice(&[1, 2, 3, 4, 5]).unwrap();
        pad_to_word(&mut out, SampleFormat::U8);
        assert_eq!(out.as_slice(), &[1, 2, 3, 4, 5, 0x80, 0x80, 0x80]);

        let mut out = SampleBuffer::new();
        out.extend_from_slice(&[1, 2, 3, 4, 5, 6]).unwrap();
        pad_to_word(&mut out, SampleFormat::I16);
        assert_eq!(out.as_slice(), &[1, 2, 3, 4, 5, 6, 0, 0]);

        let mut out = SampleBuffer::new();
        out.extend_from_slice(&[1, 2, 3, 4]).unwrap();
        pad_to_word(&mut out, SampleFormat::U8);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn empty_data_chunk_is_done_immediately() {
        let wav = wav_file(8, 8000, &[]);
        let mut player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        assert_eq!(player.state(), PlaybackState::Done);
        assert_eq!(player.get_buffer().unwrap(), BufferResult::Done(&[]));
    }

    #[test]
    fn period_is_whole_samples() {
        let wav = wav_file(16, 8000, &ramp(200));
        let mut player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        player.set_speed(0.1);
        player.get_buffer().unwrap();
        // floor(0.1 * 512) = 51, rounded down to 50
        assert_eq!(player.bytes_remaining(), 150);
    }

    #[test]
    fn read_fault_consumes_nothing() {
        let data = ramp(600);
        let wav = wav_file(8, 8000, &data);
        let fail = Cell::new(false);
        let source = FlakySource {
            inner: SliceSource::new(&wav),
            fail: &fail,
        };
        let mut player = MonoWavPlayer::new(source).unwrap();

        fail.set(true);
        assert_eq!(player.get_buffer(), Err(WavError::SourceRead));
        assert_eq!(player.get_buffer(), Err(WavError::SourceRead));
        assert_eq!(player.bytes_remaining(), 600);
        assert_eq!(player.state(), PlaybackState::Playing);

        fail.set(false);
        assert_eq!(player.get_buffer().unwrap(), BufferResult::MoreData(&[]));
        assert_eq!(
            player.get_buffer().unwrap(),
            BufferResult::Done(&data[..512])
        );
    }

    #[test]
    fn short_read_is_an_error() {
        let mut wav = wav_file(8, 8000, &ramp(300));
        // Declare more data than the file holds
        wav[40..44].copy_from_slice(&600u32.to_le_bytes());
        let mut player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        assert_eq!(player.get_buffer(), Err(WavError::SourceRead));
        assert_eq!(player.bytes_remaining(), 600);
    }

    #[test]
    fn allocation_failure_releases_first_buffer() {
        let wav = wav_file(8, 8000, &ramp(16));
        let allocated = Cell::new(0);
        let released = Cell::new(0);
        let allocator = CountingAllocator {
            limit: 1,
            allocated: &allocated,
            released: &released,
        };
        let result = MonoWavPlayer::with_allocator(SliceSource::new(&wav), allocator);
        assert_eq!(result.err(), Some(WavError::AllocationFailure));
        assert_eq!(allocated.get(), 1);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn deinit_releases_buffers_once() {
        let wav = wav_file(8, 8000, &ramp(16));
        let allocated = Cell::new(0);
        let released = Cell::new(0);
        let allocator = CountingAllocator {
            limit: 2,
            allocated: &allocated,
            released: &released,
        };
        let mut player = MonoWavPlayer::with_allocator(SliceSource::new(&wav), allocator).unwrap();
        assert_eq!(allocated.get(), 2);
        assert!(!player.is_deinit());

        player.deinit();
        assert!(player.is_deinit());
        assert_eq!(released.get(), 2);
        assert_eq!(player.get_buffer(), Err(WavError::Deinitialized));
        assert_eq!(player.rewind(), Err(WavError::Deinitialized));

        drop(player);
        assert_eq!(released.get(), 2);
    }

    #[test]
    fn drop_releases_buffers() {
        let wav = wav_file(8, 8000, &ramp(16));
        let allocated = Cell::new(0);
        let released = Cell::new(0);
        let allocator = CountingAllocator {
            limit: 2,
            allocated: &allocated,
            released: &released,
        };
        let player = MonoWavPlayer::with_allocator(SliceSource::new(&wav), allocator).unwrap();
        drop(player);
        assert_eq!(released.get(), 2);
    }

    #[test]
    fn buffer_structure() {
        let wav = wav_file(8, 8000, &ramp(16));
        let player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        let structure = player.buffer_structure();
        assert!(!structure.single_buffer);
        assert!(!structure.samples_signed);
        assert_eq!(structure.max_buffer_length, 512);
        assert_eq!(structure.spacing, 1);

        let wav = wav_file(16, 8000, &ramp(16));
        let player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        assert!(player.buffer_structure().samples_signed);
    }

    #[test]
    fn sample_rate_override() {
        let wav = wav_file(16, 22050, &ramp(16));
        let mut player = MonoWavPlayer::new(SliceSource::new(&wav)).unwrap();
        assert_eq!(player.sample_rate(), 22050);
        assert_eq!(player.bits_per_sample(), 16);
        assert_eq!(player.channel_count(), 1);
        player.set_sample_rate(44100);
        assert_eq!(player.sample_rate(), 44100);
        assert_eq!(player.specs().sample_rate, 44100);
    }
}
