//! Stream engine: buffer ownership and the capture loop.

use std::collections::VecDeque;

use tracing::{debug, error};

use crate::error::{CameraError, Result};
use crate::traits::{CaptureStream, Frame};

/// Who holds a capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwner {
    /// Queued with the driver, waiting to be filled.
    Hardware,
    /// Dequeued and being read.
    Caller,
}

/// Ownership accounting for a fixed pool of capture buffers.
///
/// Buffers are handed out in the order they were queued and go back to the
/// tail of the queue, so the pool cycles as a FIFO ring.
#[derive(Debug, Default)]
pub struct BufferRing {
    owners: Vec<BufferOwner>,
    queued: VecDeque<usize>,
}

impl BufferRing {
    /// A ring of `count` buffers, all queued with the driver.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            owners: vec![BufferOwner::Hardware; count],
            queued: (0..count).collect(),
        }
    }

    /// Pool size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    /// Number of buffers currently queued with the driver.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.queued.len()
    }

    /// Current owner of a buffer.
    #[must_use]
    pub fn owner(&self, index: usize) -> Option<BufferOwner> {
        self.owners.get(index).copied()
    }

    /// Take the oldest queued buffer.
    pub fn dequeue(&mut self) -> Option<usize> {
        let index = self.queued.pop_front()?;
        if let Some(owner) = self.owners.get_mut(index) {
            *owner = BufferOwner::Caller;
        }
        Some(index)
    }

    /// Return a dequeued buffer to the driver.
    ///
    /// Returns `false` if the buffer is not currently held by the caller.
    pub fn requeue(&mut self, index: usize) -> bool {
        match self.owners.get_mut(index) {
            Some(owner) if *owner == BufferOwner::Caller => {
                *owner = BufferOwner::Hardware;
                self.queued.push_back(index);
                true
            }
            _ => false,
        }
    }

    /// Release the whole pool.
    pub fn clear(&mut self) {
        self.owners.clear();
        self.queued.clear();
    }
}

/// Streaming half of the camera state machine.
///
/// Holds the allocated stream while streaming; `None` means idle.
#[derive(Debug)]
pub struct StreamEngine<S> {
    stream: Option<S>,
    ring: BufferRing,
    faulted: bool,
}

impl<S> Default for StreamEngine<S> {
    fn default() -> Self {
        Self {
            stream: None,
            ring: BufferRing::default(),
            faulted: false,
        }
    }
}

impl<S: CaptureStream> StreamEngine<S> {
    /// Whether a stream is active.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether a capture failure has faulted the device.
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Buffer accounting for the active pool.
    #[must_use]
    pub const fn ring(&self) -> &BufferRing {
        &self.ring
    }

    /// Take ownership of a freshly allocated stream of `buffer_count` buffers.
    pub fn begin(&mut self, stream: S, buffer_count: u32) {
        self.ring = BufferRing::new(buffer_count as usize);
        self.stream = Some(stream);
        debug!(buffers = buffer_count, "stream started");
    }

    /// Capture one frame.
    ///
    /// Blocks until the driver delivers a filled buffer.
    pub fn capture(&mut self) -> Result<Frame> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CameraError::Device("no active stream".to_owned()));
        };

        let Some(slot) = self.ring.dequeue() else {
            self.faulted = true;
            return Err(CameraError::Device("no buffer queued with the driver".to_owned()));
        };

        let result = stream.next_frame();
        self.ring.requeue(slot);

        match result {
            Ok(mut frame) => {
                frame.metadata.buffer = slot;
                Ok(frame)
            }
            Err(err) => {
                error!(%err, "capture failed");
                self.faulted = true;
                Err(err)
            }
        }
    }

    /// Drop the stream, which halts the driver and releases the pool.
    pub fn end(&mut self) {
        if self.stream.take().is_some() {
            self.ring.clear();
            debug!("stream stopped");
        }
    }
}
