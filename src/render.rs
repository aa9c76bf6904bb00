//! The self-throttling render loop and the SPSC ring buffer bridging it to
//! an audio callback thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::synthesizer::Synthesizer;

/// A bounded single-producer/single-consumer ring buffer of stereo frames.
/// `capacity` is rounded up to the next power of two so index wrapping is a
/// cheap mask instead of a modulo.
pub struct RingBuffer<T> {
    slots: Box<[std::cell::UnsafeCell<std::mem::MaybeUninit<T>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        let slots = (0..capacity)
            .map(|_| std::cell::UnsafeCell::new(std::mem::MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        RingBuffer { slots, mask: capacity - 1, head: AtomicUsize::new(0), tail: AtomicUsize::new(0) }
    }

    /// Push one frame. Returns `false` without blocking if the buffer is full.
    pub fn push(&self, value: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) > self.mask {
            return false;
        }
        let slot = &self.slots[tail & self.mask];
        unsafe {
            (*slot.get()).write(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pop one frame. Returns `None` without blocking if the buffer is empty.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let slot = &self.slots[head & self.mask];
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.tail.load(Ordering::Acquire).wrapping_sub(self.head.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Drives a [`Synthesizer`] in fixed-size blocks, self-throttling so it does
/// not race arbitrarily far ahead of real time. Credit accrues at
/// `block_size / sample_rate` seconds per block and is consumed at 2x
/// wall-clock speed; once more than a second of credit has built up, the
/// loop sleeps for one block's duration before rendering the next block.
pub struct RenderLoop {
    synth: Arc<Synthesizer>,
    buffer: Arc<RingBuffer<(f32, f32)>>,
    block_size: usize,
    sample_rate: f64,
    ahead: Duration,
    last_tick: Instant,
}

impl RenderLoop {
    pub fn new(synth: Arc<Synthesizer>, buffer: Arc<RingBuffer<(f32, f32)>>, sample_rate: f64, block_size: usize) -> Self {
        RenderLoop { synth, buffer, block_size, sample_rate, ahead: Duration::ZERO, last_tick: Instant::now() }
    }

    /// Render `n` blocks of `block_size` frames, throttling between blocks.
    /// Dropped frames (ring buffer full) are silently discarded, matching
    /// the audio-backend contract: the callback thread is the pacing clock.
    pub fn run_blocks(&mut self, n: usize) {
        let block_duration = Duration::from_secs_f64(self.block_size as f64 / self.sample_rate);
        for _ in 0..n {
            for _ in 0..self.block_size {
                let (l, r) = self.synth.render();
                self.buffer.push((l as f32, r as f32));
            }

            let elapsed = self.last_tick.elapsed();
            self.last_tick = Instant::now();
            self.ahead = self
                .ahead
                .checked_sub(elapsed * 2)
                .unwrap_or(Duration::ZERO)
                .checked_add(block_duration)
                .unwrap_or(block_duration);

            if self.ahead > Duration::from_secs(1) {
                thread::sleep(block_duration);
            }
        }
    }
}
