//! Lock-Free Audio Ring Buffer Implementation

use crate::{RingError, Sample};
use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default buffer capacity (4096 samples = ~256 ms at 16 kHz)
pub const DEFAULT_CAPACITY: usize = 4096;

/// Lock-free SPSC ring buffer for audio samples.
///
/// One slot is always left empty so that `head == tail` means empty; at most
/// `capacity - 1` samples are live. When the producer catches up with the
/// read cursor it drops the oldest sample by advancing the read cursor.
/// Because both sides may move the read cursor, it only ever changes through
/// compare-and-swap.
pub struct AudioRing {
    /// Pre-allocated storage
    storage: Box<[AtomicI16]>,
    /// Capacity of the buffer
    capacity: usize,
    /// Head position (write cursor, producer-owned)
    head: AtomicUsize,
    /// Tail position (read cursor)
    tail: AtomicUsize,
    /// Total samples written (for statistics)
    total_written: AtomicUsize,
    /// Samples discarded by overflow
    dropped: AtomicUsize,
}

impl AudioRing {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity < 2 {
            return Err(RingError::InvalidCapacity(capacity));
        }
        Ok(Self::allocate(capacity))
    }

    /// Create a buffer with default capacity (4096 samples)
    pub fn with_default_capacity() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }

    fn allocate(capacity: usize) -> Self {
        let storage: Vec<AtomicI16> = (0..capacity).map(|_| AtomicI16::new(0)).collect();
        Self {
            storage: storage.into_boxed_slice(),
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            total_written: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Split the ring into its only producer and only consumer handle
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        let ring = Arc::new(self);
        (
            AudioProducer { ring: Arc::clone(&ring) },
            AudioConsumer { ring },
        )
    }

    /// Largest window that can ever be popped
    pub fn max_window(&self) -> usize {
        self.capacity - 1
    }

    fn distance(&self, tail: usize, head: usize) -> usize {
        (head + self.capacity - tail) % self.capacity
    }

    fn push(&self, sample: Sample) {
        let head = self.head.load(Ordering::Relaxed);
        let next_head = (head + 1) % self.capacity;

        let tail = self.tail.load(Ordering::Acquire);
        if next_head == tail {
            // A failed exchange means the consumer freed the slot itself.
            let dropped = self
                .tail
                .compare_exchange(
                    tail,
                    (tail + 1) % self.capacity,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok();
            if dropped {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        // The slot at `head` is the reserved one and never inside [tail, head).
        self.storage[head].store(sample, Ordering::Release);
        self.head.store(next_head, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
    }

    fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        self.distance(tail, head)
    }

    fn pop_into(&self, out: &mut [Sample]) -> Result<usize, RingError> {
        let requested = out.len();
        if requested > self.max_window() {
            return Err(RingError::WindowTooLarge {
                requested,
                max: self.max_window(),
            });
        }

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            let available = self.distance(tail, head);
            if available < requested {
                return Err(RingError::InsufficientData {
                    available,
                    requested,
                });
            }

            for (i, slot) in out.iter_mut().enumerate() {
                *slot = self.storage[(tail + i) % self.capacity].load(Ordering::Acquire);
            }

            // If the producer dropped samples meanwhile the copy may hold
            // overwritten slots; take the window again from the new tail.
            if self
                .tail
                .compare_exchange(
                    tail,
                    (tail + requested) % self.capacity,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Ok(requested);
            }
        }
    }

    fn clear(&self) {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            if self
                .tail
                .compare_exchange(tail, head, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}

/// Write side of the ring, owned by the audio capture callback.
///
/// Never blocks and never allocates.
pub struct AudioProducer {
    ring: Arc<AudioRing>,
}

impl AudioProducer {
    /// Push one sample, dropping the oldest if the ring is full
    #[inline]
    pub fn push(&mut self, sample: Sample) {
        self.ring.push(sample);
    }

    /// Push a block of samples as delivered by the capture callback
    #[inline]
    pub fn push_slice(&mut self, samples: &[Sample]) {
        for &sample in samples {
            self.ring.push(sample);
        }
    }

    /// Get total samples written (for statistics)
    pub fn total_written(&self) -> usize {
        self.ring.total_written.load(Ordering::Relaxed)
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }
}

/// Read side of the ring, owned by the sampling loop
pub struct AudioConsumer {
    ring: Arc<AudioRing>,
}

impl AudioConsumer {
    /// Number of samples currently buffered
    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// Consume exactly `out.len()` samples in FIFO order.
    ///
    /// Consumes nothing when fewer samples are buffered.
    pub fn pop_window(&mut self, out: &mut [Sample]) -> Result<usize, RingError> {
        self.ring.pop_into(out)
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.available() == self.ring.max_window()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }

    /// Largest window `pop_window` can satisfy
    pub fn max_window(&self) -> usize {
        self.ring.max_window()
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.available() as f64 / self.ring.max_window() as f64
    }

    /// Get total samples written (for statistics)
    pub fn total_written(&self) -> usize {
        self.ring.total_written.load(Ordering::Relaxed)
    }

    /// Get samples lost to overflow
    pub fn dropped(&self) -> usize {
        self.ring.dropped.load(Ordering::Relaxed)
    }

    /// Discard everything currently buffered
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn ring(capacity: usize) -> (AudioProducer, AudioConsumer) {
        AudioRing::new(capacity).unwrap().split()
    }

    #[test]
    fn test_push_and_pop() {
        let (mut producer, mut consumer) = ring(10);

        for i in 0..5 {
            producer.push(i * 100);
        }

        assert_eq!(consumer.available(), 5);

        let mut window = [0; 3];
        assert_eq!(consumer.pop_window(&mut window), Ok(3));
        assert_eq!(window, [0, 100, 200]); // Oldest first
        assert_eq!(consumer.available(), 2);
    }

    #[test]
    fn test_insufficient_data_consumes_nothing() {
        let (mut producer, mut consumer) = ring(16);
        producer.push_slice(&[1, 2, 3]);

        let mut window = [0; 4];
        assert_eq!(
            consumer.pop_window(&mut window),
            Err(RingError::InsufficientData {
                available: 3,
                requested: 4
            })
        );
        assert_eq!(consumer.available(), 3);
        assert_eq!(window, [0; 4]);
    }

    #[test]
    fn test_overwrite_oldest() {
        let (mut producer, mut consumer) = ring(5);

        // Fill beyond capacity
        for i in 0..10 {
            producer.push(i);
        }

        // Should only have capacity-1 samples, the most recent ones
        assert_eq!(consumer.available(), 4);
        assert!(consumer.is_full());
        assert_eq!(consumer.dropped(), 6);

        let mut window = [0; 4];
        consumer.pop_window(&mut window).unwrap();
        assert_eq!(window, [6, 7, 8, 9]);
    }

    #[test]
    fn test_burst_larger_than_capacity_keeps_latest() {
        let (mut producer, mut consumer) = ring(DEFAULT_CAPACITY);
        let burst: Vec<Sample> = (0..10_000).map(|i| (i % 30_000) as Sample).collect();
        producer.push_slice(&burst);

        assert_eq!(consumer.available(), DEFAULT_CAPACITY - 1);
        assert_eq!(producer.total_written(), 10_000);

        let mut window = vec![0; DEFAULT_CAPACITY - 1];
        consumer.pop_window(&mut window).unwrap();
        assert_eq!(window.as_slice(), &burst[burst.len() - (DEFAULT_CAPACITY - 1)..]);
    }

    #[test]
    fn test_window_too_large() {
        let (_producer, mut consumer) = ring(8);
        let mut window = [0; 8];
        assert_eq!(
            consumer.pop_window(&mut window),
            Err(RingError::WindowTooLarge {
                requested: 8,
                max: 7
            })
        );
    }

    #[test]
    fn test_invalid_capacity() {
        assert_eq!(AudioRing::new(1).err(), Some(RingError::InvalidCapacity(1)));
        assert!(AudioRing::new(2).is_ok());
    }

    #[test]
    fn test_fill_ratio_and_clear() {
        let (mut producer, mut consumer) = ring(101);
        assert_eq!(consumer.fill_ratio(), 0.0);

        for _ in 0..50 {
            producer.push(7);
        }
        assert!((consumer.fill_ratio() - 0.5).abs() < 0.01);

        consumer.clear();
        assert!(consumer.is_empty());
        producer.push(1);
        assert_eq!(consumer.available(), 1);
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let (mut producer, mut consumer) = ring(8);
        let mut window = [0; 5];
        let mut next = 0;
        let mut expected = 0;

        for _ in 0..20 {
            for _ in 0..5 {
                producer.push(next);
                next += 1;
            }
            consumer.pop_window(&mut window).unwrap();
            for &sample in &window {
                assert_eq!(sample, expected);
                expected += 1;
            }
        }
    }

    #[test]
    fn test_concurrent_producer_windows_stay_contiguous() {
        const TOTAL: i16 = 20_000;
        let (mut producer, mut consumer) = ring(256);

        let handle = std::thread::spawn(move || {
            for i in 0..TOTAL {
                producer.push(i);
                if i % 64 == 0 {
                    std::thread::yield_now();
                }
            }
        });

        let mut window = [0; 16];
        let mut last = -1;
        let mut finished = false;
        loop {
            match consumer.pop_window(&mut window) {
                Ok(_) => {
                    for pair in window.windows(2) {
                        assert_eq!(pair[1], pair[0] + 1, "window must be contiguous");
                    }
                    assert!(window[0] > last, "windows must move forward");
                    last = window[15];
                }
                Err(RingError::InsufficientData { .. }) if finished => break,
                Err(RingError::InsufficientData { .. }) => {
                    finished = handle.is_finished();
                    std::thread::yield_now();
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        handle.join().unwrap();
        assert_eq!(consumer.total_written(), TOTAL as usize);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(Sample),
        Pop(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => any::<Sample>().prop_map(Op::Push),
            1 => (1usize..8).prop_map(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn prop_fifo_with_oldest_drop(ops in proptest::collection::vec(op_strategy(), 0..400)) {
            const CAPACITY: usize = 8;
            let (mut producer, mut consumer) = ring(CAPACITY);
            let mut model: VecDeque<Sample> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(sample) => {
                        producer.push(sample);
                        model.push_back(sample);
                        if model.len() > CAPACITY - 1 {
                            model.pop_front();
                        }
                    }
                    Op::Pop(n) => {
                        let mut window = vec![0; n];
                        match consumer.pop_window(&mut window) {
                            Ok(count) => {
                                prop_assert_eq!(count, n);
                                let expected: Vec<Sample> = model.drain(..n).collect();
                                prop_assert_eq!(window, expected);
                            }
                            Err(_) => prop_assert!(model.len() < n),
                        }
                    }
                }
                prop_assert!(consumer.available() <= CAPACITY - 1);
                prop_assert_eq!(consumer.available(), model.len());
            }
        }
    }
}
