//! # Delay Line (Ring Buffer)
//!
//! A fixed-capacity circular buffer of past samples. This is the storage
//! behind the feedback delay: every sample the delay writes goes in here,
//! and the echo is read back out a fixed number of samples later.
//!
//! ## Indexing
//!
//! Unlike a "write head moves forward" ring buffer, this one writes
//! *backwards*. `cursor` always points at the oldest slot, the one the
//! next [`push()`](DelayLine::push) will overwrite. After a push the
//! cursor steps back by one (wrapping from 0 to `capacity - 1`).
//!
//! Reads are addressed relative to the cursor:
//!
//! ```text
//! get(offset) = buffer[(cursor + 1 + offset) % capacity]
//! ```
//!
//! Because the cursor moves backwards, `cursor + 1` is the slot that was
//! written last. So `get(0)` is the most recent push, `get(1)` the one
//! before it, and `get(capacity - 1)` lands back on the cursor itself,
//! the oldest sample still retained. No separate read pointer is needed.
//!
//! ```text
//! pushes: a, b, c, d   (capacity 4)
//!
//!   slot:   0   1   2   3
//!         [ a   d   c   b ]
//!           ^cursor (oldest, next to be overwritten)
//!
//! get(0) = d, get(1) = c, get(2) = b, get(3) = a
//! ```

use std::num::NonZeroUsize;

use nih_plug::nih_debug_assert;
use num_traits::Float;

/// A ring buffer of samples with push-overwrites-oldest semantics.
///
/// The buffer is sized once when the host tells us the sample rate (see
/// [`Delay::prepare()`](super::delay::Delay::prepare)) and never grows
/// during processing, so reads and pushes are allocation-free.
#[derive(Debug, Clone)]
pub struct DelayLine<T> {
    buffer: Vec<T>,

    /// Slot holding the oldest sample. Always `< buffer.len()`.
    cursor: usize,
}

impl<T: Float> DelayLine<T> {
    /// Create a silent delay line holding `capacity` samples.
    ///
    /// `NonZeroUsize` rules out the zero-length buffer at the type level;
    /// modulo by zero would otherwise be waiting in every `get()`.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: vec![T::zero(); capacity.get()],
            cursor: 0,
        }
    }

    /// Number of samples the line retains.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Reallocate to hold `capacity` samples of silence and move the
    /// cursor back to slot 0.
    ///
    /// This allocates, so it must only be called from prepare-time code,
    /// never from `process()`.
    pub fn resize(&mut self, capacity: NonZeroUsize) {
        self.buffer.clear();
        self.buffer.resize(capacity.get(), T::zero());
        self.cursor = 0;
    }

    /// Silence every slot. Capacity and cursor position are unchanged.
    pub fn clear(&mut self) {
        self.buffer.fill(T::zero());
    }

    /// Read the sample `offset` pushes ago (`0` = most recent push).
    ///
    /// `offset` must be `< capacity()`. Debug builds report a violation;
    /// release builds wrap around the ring instead of panicking.
    pub fn get(&self, offset: usize) -> T {
        let len = self.buffer.len();
        nih_debug_assert!(offset < len, "delay line read past capacity");
        self.buffer[(self.cursor + 1 + offset) % len]
    }

    /// Overwrite the oldest sample with `value`, then step the cursor
    /// back one slot.
    pub fn push(&mut self, value: T) {
        self.buffer[self.cursor] = value;
        self.cursor = if self.cursor == 0 {
            self.buffer.len() - 1
        } else {
            self.cursor - 1
        };
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
