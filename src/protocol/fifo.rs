//! Byte FIFO used as a stream receive buffer

use std::collections::VecDeque;

/// Ordered byte queue: bytes come out in the order they went in
#[derive(Debug, Default, Clone)]
pub struct ByteFifo {
    buf: VecDeque<u8>,
}

impl ByteFifo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a FIFO with room for `capacity` bytes before reallocating
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
        }
    }

    /// Append bytes to the tail
    pub fn put(&mut self, data: &[u8]) {
        self.buf.extend(data);
    }

    /// Remove and return up to `max` bytes from the head
    pub fn get(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut fifo = ByteFifo::with_capacity(8);
        assert!(fifo.is_empty());

        fifo.put(b"hello ");
        fifo.put(b"world");
        assert_eq!(fifo.len(), 11);

        assert_eq!(fifo.get(3), b"hel");
        assert_eq!(fifo.get(100), b"lo world");
        assert!(fifo.is_empty());
        assert!(fifo.get(10).is_empty());
    }

    #[test]
    fn test_fifo_grows_past_capacity() {
        let mut fifo = ByteFifo::with_capacity(4);
        let data: Vec<u8> = (0..=255).collect();
        fifo.put(&data);
        assert_eq!(fifo.get(usize::MAX), data);
    }

    #[test]
    fn test_fifo_clear_and_zero_get() {
        let mut fifo = ByteFifo::new();
        fifo.put(&[1, 2, 3]);
        assert!(fifo.get(0).is_empty());
        assert_eq!(fifo.len(), 3);
        fifo.clear();
        assert!(fifo.is_empty());
    }
}
