/// Bounded byte queues for the text exchanged with the companion module.
///
/// The inbound queue collects free text received over the bus; the outbound
/// queue collects everything waiting to go out in reply frames. Both are
/// fixed-capacity rings: bytes that do not fit are dropped and reported.
use heapless::Deque;

/// Capacity of the inbound text queue
pub const INBOUND_CAPACITY: usize = 64;

/// Capacity of the outbound text queue
pub const OUTBOUND_CAPACITY: usize = 128;

pub struct TextQueue<const N: usize> {
    bytes: Deque<u8, N>,
    dropped: u32,
}

impl<const N: usize> TextQueue<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
            dropped: 0,
        }
    }

    /// Append one byte. Returns `false` if the queue was full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.bytes.push_back(byte).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }
        true
    }

    /// Append a slice, keeping whatever fits. Returns the number of bytes stored.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let mut stored = 0;
        for &b in data {
            if self.bytes.push_back(b).is_err() {
                break;
            }
            stored += 1;
        }
        let lost = data.len() - stored;
        if lost > 0 {
            self.dropped = self.dropped.saturating_add(lost as u32);
            log::warn!("Text queue full, dropped {} bytes", lost);
        }
        stored
    }

    /// Append the whole slice or nothing. Fixed-width records and listings
    /// go through here so the companion never sees a cut-off item.
    pub fn try_extend(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free() {
            self.dropped = self.dropped.saturating_add(data.len() as u32);
            return false;
        }
        for &b in data {
            // space checked above
            let _ = self.bytes.push_back(b);
        }
        true
    }

    /// Remove up to `out.len()` bytes from the front into `out`.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.bytes.pop_front() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes that can still be queued
    pub fn free(&self) -> usize {
        N - self.bytes.len()
    }

    /// Bytes lost to overflow since creation
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl<const N: usize> Default for TextQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets report builders `write!` straight into the queue.
impl<const N: usize> core::fmt::Write for TextQueue<N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if self.extend(s.as_bytes()) == s.len() {
            Ok(())
        } else {
            Err(core::fmt::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn drain_is_fifo_and_consumes() {
        let mut q = TextQueue::<8>::new();
        q.extend(b"abc");
        let mut out = [0u8; 2];
        assert_eq!(q.drain_into(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(b'c'));
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_keeps_prefix_and_counts_drops() {
        let mut q = TextQueue::<4>::new();
        assert_eq!(q.extend(b"abcdef"), 4);
        assert_eq!(q.dropped(), 2);
        let mut out = [0u8; 8];
        assert_eq!(q.drain_into(&mut out), 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn try_extend_is_all_or_nothing() {
        let mut q = TextQueue::<6>::new();
        assert!(q.try_extend(b"abcd"));
        assert_eq!(q.free(), 2);
        assert!(!q.try_extend(b"xyz"));
        assert_eq!(q.len(), 4);
        assert_eq!(q.dropped(), 3);
        assert!(q.try_extend(b"ef"));
        assert_eq!(q.free(), 0);
        let mut out = [0u8; 8];
        assert_eq!(q.drain_into(&mut out), 6);
        assert_eq!(&out[..6], b"abcdef");
    }

    #[test]
    fn fmt_write_appends_text() {
        let mut q = TextQueue::<16>::new();
        write!(q, "door:{}", 3).unwrap();
        let mut out = [0u8; 16];
        let n = q.drain_into(&mut out);
        assert_eq!(&out[..n], b"door:3");
    }

    #[test]
    fn fmt_write_reports_overflow() {
        let mut q = TextQueue::<4>::new();
        assert!(write!(q, "too long").is_err());
        assert_eq!(q.len(), 4);
    }
}
