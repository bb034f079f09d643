//! Bounded outbound queue.
//!
//! Holds serialized frames while the transport is not open. Once the bound
//! is exceeded the oldest frame is evicted; overflow is not an error.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

// ============================================================================
// OutboundQueue
// ============================================================================

/// FIFO of pending text frames with oldest-first eviction.
#[derive(Debug)]
pub(crate) struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: usize,
}

impl OutboundQueue {
    /// Creates an empty queue holding at most `capacity` frames.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a frame, returning the evicted frame if the bound was hit.
    pub(crate) fn push(&mut self, frame: String) -> Option<String> {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front()
        } else {
            None
        }
    }

    /// Puts back a frame that could not be written, keeping it first in line.
    ///
    /// If the queue filled up meanwhile, the newest frame is dropped instead so
    /// that order is preserved.
    pub(crate) fn requeue_front(&mut self, frame: String) {
        self.frames.push_front(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_back();
        }
    }

    /// Removes the oldest frame.
    pub(crate) fn pop(&mut self) -> Option<String> {
        self.frames.pop_front()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
