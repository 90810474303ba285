//! Sample buffers, their allocator and the double buffer handed to the consumer.

use crate::MAX_BUFFER_BYTES;
use core::borrow::{Borrow, BorrowMut};

/// Fixed capacity sample buffer. `len()` is the number of valid bytes.
pub type SampleBuffer = heapless::Vec<u8, MAX_BUFFER_BYTES>;

/// Provides the two sample buffers of a player.
///
/// The player calls `allocate` twice at construction and hands every buffer
/// back through `release` at teardown, including the first one when the second
/// allocation fails.
pub trait BufferAllocator {
    type Buffer: BorrowMut<SampleBuffer>;

    /// Returns `None` when no buffer is available.
    fn allocate(&mut self) -> Option<Self::Buffer>;

    fn release(&mut self, buffer: Self::Buffer) {
        drop(buffer);
    }
}

/// Keeps both buffers inline in the player. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineAllocator;

impl BufferAllocator for InlineAllocator {
    type Buffer = SampleBuffer;

    fn allocate(&mut self) -> Option<Self::Buffer> {
        Some(SampleBuffer::new())
    }
}

/// Which buffer is written by the next fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    A,
    B,
}

impl Slot {
    fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Two alternating sample buffers.
///
/// The buffer handed out on call N was written on call N-1 and is not touched
/// again until call N+1 writes it.
pub(crate) struct DoubleBuffer<B> {
    a: B,
    b: B,
    filling: Slot,
}

impl<B: BorrowMut<SampleBuffer>> DoubleBuffer<B> {
    /// Both buffers start empty, so the first hand-out is an empty priming buffer.
    pub(crate) fn new(mut a: B, mut b: B) -> Self {
        BorrowMut::<SampleBuffer>::borrow_mut(&mut a).clear();
        BorrowMut::<SampleBuffer>::borrow_mut(&mut b).clear();
        DoubleBuffer {
            a,
            b,
            filling: Slot::A,
        }
    }

    /// Returns (buffer to fill, buffer filled by the previous call).
    pub(crate) fn split(&mut self) -> (&mut SampleBuffer, &SampleBuffer) {
        match self.filling {
            Slot::A => (
                BorrowMut::<SampleBuffer>::borrow_mut(&mut self.a),
                Borrow::<SampleBuffer>::borrow(&self.b),
            ),
            Slot::B => (
                BorrowMut::<SampleBuffer>::borrow_mut(&mut self.b),
                Borrow::<SampleBuffer>::borrow(&self.a),
            ),
        }
    }

    /// Hand the freshly filled buffer over and return the one filled before it.
    pub(crate) fn swap(&mut self) -> &SampleBuffer {
        let ready = self.filling.other();
        self.filling = ready;
        match ready {
            Slot::A => Borrow::<SampleBuffer>::borrow(&self.a),
            Slot::B => Borrow::<SampleBuffer>::borrow(&self.b),
        }
    }

    #[cfg(test)]
    pub(crate) fn filling(&self) -> Slot {
        self.filling
    }

    pub(crate) fn into_buffers(self) -> (B, B) {
        (self.a, self.b)
    }
}

/// Layout of the buffers returned by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStructure {
    /// false: two buffers alternate.
    pub single_buffer: bool,
    /// 8bit WAV samples are unsigned, 16bit are signed.
    pub samples_signed: bool,
    /// Maximum buffer length in bytes.
    pub max_buffer_length: u32,
    /// Distance between samples of the same channel. Always 1 for mono.
    pub spacing: u8,
}
