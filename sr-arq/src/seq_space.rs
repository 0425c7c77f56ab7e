//! Modulo sequence-number arithmetic.
//!
//! Sequence numbers live in `[0, size)` and wrap around.  Every window test in
//! the sender and receiver goes through [`SeqSpace`] so that the wrap-around
//! rule is written exactly once.

/// A sequence-number space of `size` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    size: u32,
}

impl SeqSpace {
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "sequence space must not be empty");
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// `true` when `seq` is a valid sequence number in this space.
    #[inline]
    pub fn contains(&self, seq: u32) -> bool {
        seq < self.size
    }

    /// Sequence number following `seq`.
    #[inline]
    pub fn next(&self, seq: u32) -> u32 {
        self.add(seq, 1)
    }

    /// `seq + n` modulo the space size.
    #[inline]
    pub fn add(&self, seq: u32, n: u32) -> u32 {
        ((u64::from(seq) + u64::from(n)) % u64::from(self.size)) as u32
    }

    /// Forward distance from `from` to `to`, i.e. `(to - from) mod size`.
    ///
    /// Both arguments must lie inside the space.
    #[inline]
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        debug_assert!(self.contains(from) && self.contains(to));
        let size = u64::from(self.size);
        ((u64::from(to) + size - u64::from(from)) % size) as u32
    }

    /// `true` when `seq` falls inside the `len`-wide window starting at `base`.
    ///
    /// Values outside the space are never inside any window.
    #[inline]
    pub fn in_window(&self, base: u32, len: u32, seq: u32) -> bool {
        self.contains(seq) && self.distance(base, seq) < len
    }
}
