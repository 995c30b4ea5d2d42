//! Jitter window: a fixed-capacity byte window over the logical stream
//!
//! The window holds the next `capacity` bytes of the stream starting at
//! `sender_offset`. All index arithmetic is checked at this boundary; a
//! packet whose position maps outside `[0, capacity]` is never written,
//! no matter what its header claims.

/// Sentinel offset that maps every realistic stream position far outside
/// the window, forcing the first received packet down a resync path.
const UNSYNCED_OFFSET: u64 = !0u64 << 62;

/// Sliding byte window into the sender's logical stream
pub struct JitterWindow {
    buf: Box<[u8]>,
    sender_offset: u64,
}

impl JitterWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            sender_offset: UNSYNCED_OFFSET,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Logical stream position mapped to window index 0
    pub fn sender_offset(&self) -> u64 {
        self.sender_offset
    }

    /// Window index a stream position maps to; negative when the position
    /// precedes the window's origin.
    pub fn local_position(&self, position: u64) -> i64 {
        position.wrapping_sub(self.sender_offset) as i64
    }

    /// Whether `len` bytes at `index` fall entirely inside the window
    pub fn fits(&self, index: i64, len: usize) -> bool {
        index >= 0 && (index as u64).saturating_add(len as u64) <= self.buf.len() as u64
    }

    /// Write `data` at `index`, overwriting whatever is there. Duplicate
    /// writes of the same bytes to the same range are idempotent. Returns
    /// false (and writes nothing) if the range does not fit.
    pub fn write_at(&mut self, index: i64, data: &[u8]) -> bool {
        if !self.fits(index, data.len()) {
            return false;
        }
        let start = index as usize;
        self.buf[start..start + data.len()].copy_from_slice(data);
        true
    }

    /// The first `n` bytes of the window (clamped to capacity), for handing
    /// to the playback device before the window is mutated.
    pub fn front(&self, n: usize) -> &[u8] {
        &self.buf[..n.min(self.buf.len())]
    }

    /// Discard the first `n` bytes as played: shift the rest forward, zero
    /// the exposed tail, and advance the origin by the same count.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.copy_within(n.., 0);
        let tail = self.buf.len() - n;
        self.buf[tail..].fill(0);
        self.sender_offset = self.sender_offset.wrapping_add(n as u64);
    }

    /// Hard reset: zero everything and restart the mapping at `sender_offset`
    pub fn reset(&mut self, sender_offset: u64) {
        self.buf.fill(0);
        self.sender_offset = sender_offset;
    }

    #[cfg(test)]
    pub(crate) fn contents(&self) -> &[u8] {
        &self.buf
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Writing the same packet twice yields the same window as writing
        /// it once, so duplicate datagrams are harmless by construction.
        #[test]
        fn duplicate_writes_idempotent(
            index in 0i64..7840,
            payload in proptest::collection::vec(any::<u8>(), 1..160),
        ) {
            let mut window = JitterWindow::new(8000);
            window.reset(0);

            prop_assert!(window.write_at(index, &payload));
            let once = window.contents().to_vec();
            prop_assert!(window.write_at(index, &payload));
            prop_assert_eq!(window.contents(), &once[..]);
        }

        /// After consuming n bytes the prefix equals the old bytes [n, W),
        /// the tail is zero, and the origin advanced by exactly n.
        #[test]
        fn consume_monotonicity(
            fill in proptest::collection::vec(any::<u8>(), 256),
            n in 0usize..=256,
        ) {
            let mut window = JitterWindow::new(256);
            window.reset(500);
            window.write_at(0, &fill);

            let before = window.contents().to_vec();
            window.consume(n);

            prop_assert_eq!(&window.contents()[..256 - n], &before[n..]);
            prop_assert!(window.contents()[256 - n..].iter().all(|&b| b == 0));
            prop_assert_eq!(window.sender_offset(), 500 + n as u64);
        }

        /// fits() and write_at() agree for any index/length combination
        #[test]
        fn write_respects_fits(index in -100i64..400, len in 0usize..300) {
            let mut window = JitterWindow::new(256);
            window.reset(0);
            let data = vec![0xAAu8; len];
            prop_assert_eq!(window.write_at(index, &data), window.fits(index, len));
        }
    }
}
