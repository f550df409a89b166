/*
 *  ringbuf.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fixed-capacity sample history
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

/// Fixed-capacity FIFO with O(1) push that evicts the oldest entry on overflow.
///
/// Not synchronised; the owning widget's lock guards both `push` and
/// `snapshot`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    head: usize, // index of the oldest entry once full
    cap: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self { buf: Vec::with_capacity(cap), head: 0, cap }
    }

    pub fn push(&mut self, value: T) {
        if self.buf.len() < self.cap {
            self.buf.push(value);
        } else {
            self.buf[self.head] = value;
            self.head = (self.head + 1) % self.cap;
        }
    }

    /// Ordered copy, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.buf.len());
        out.extend_from_slice(&self.buf[self.head..]);
        out.extend_from_slice(&self.buf[..self.head]);
        out
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&T> {
        if self.buf.is_empty() {
            None
        } else if self.head == 0 {
            self.buf.last()
        } else {
            self.buf.get(self.head - 1)
        }
    }

    pub fn len(&self) -> usize { self.buf.len() }
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    pub fn capacity(&self) -> usize { self.cap }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}

impl<T: Clone> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_keeps_newest() {
        let mut rb = RingBuffer::new(3);
        for v in 1..=5 {
            rb.push(v);
        }
        assert_eq!(rb.snapshot(), vec![3, 4, 5]);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.last(), Some(&5));
    }

    #[test]
    fn test_partial_fill() {
        let mut rb = RingBuffer::new(4);
        rb.push(10);
        rb.push(20);
        assert_eq!(rb.snapshot(), vec![10, 20]);
        assert_eq!(rb.last(), Some(&20));
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let mut rb = RingBuffer::new(0);
        rb.push('a');
        rb.push('b');
        assert_eq!(rb.capacity(), 1);
        assert_eq!(rb.snapshot(), vec!['b']);
    }

    #[test]
    fn test_matches_reference_window() {
        for cap in 1..6usize {
            let mut rb = RingBuffer::new(cap);
            let mut pushed = Vec::new();
            for k in 0..17u32 {
                rb.push(k);
                pushed.push(k);
                let from = pushed.len().saturating_sub(cap);
                assert_eq!(rb.snapshot(), pushed[from..].to_vec());
            }
        }
    }

    #[test]
    fn test_clear() {
        let mut rb = RingBuffer::new(2);
        rb.push(1);
        rb.push(2);
        rb.push(3);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.last(), None);
        rb.push(9);
        assert_eq!(rb.snapshot(), vec![9]);
    }
}
