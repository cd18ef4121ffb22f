//! Bounded sample block queue
//!
//! Audio capture usually runs on its own thread or callback,
//! with timing that the decoder does not control. The block
//! queue decouples the two. The capture side pushes
//! [`SampleBlock`]s with a [`BlockSender`], which never blocks:
//! if the queue is full, the *oldest* queued block is dropped
//! to make room. A dropped block can at worst truncate a tone,
//! which the receiver treats like noise.
//!
//! The processing side runs [`run_pipeline()`], which feeds
//! each block to a [`SelcalReceiver`] in arrival order. Each
//! block carries the index of its first sample, so the
//! receiver's timestamps stay accurate across dropped blocks.
//!
//! ```
//! use selcal::{block_queue, run_pipeline, SampleBlock};
//! # use selcal::{ReferenceTable, SelcalReceiverBuilder, Tolerance};
//! # let table = ReferenceTable::new(
//! #     [312.6, 524.8], [('A', 312.6, 524.8)], Tolerance::default()
//! # ).unwrap();
//! let mut receiver = SelcalReceiverBuilder::new(8000).build(table);
//!
//! let (tx, rx) = block_queue(4);
//! tx.push(SampleBlock::new(0, vec![0.0f32; 1024])).unwrap();
//! drop(tx);
//!
//! let stats = run_pipeline(&mut receiver, &rx, |_evt| {});
//! assert_eq!(1, stats.blocks);
//! assert_eq!(1024, receiver.input_sample_counter());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(test))]
use log::{debug, warn};

#[cfg(test)]
use std::{println as debug, println as warn};

use thiserror::Error;

use crate::receiver::{SelcalReceiver, SelcalReceiverEvent};

/// How long the consumer waits before re-checking for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A block of consecutive input samples
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBlock {
    first_sample: u64,
    samples: Vec<f32>,
}

impl SampleBlock {
    /// Create from samples
    ///
    /// `first_sample` is the index of `samples[0]` in the
    /// capture stream, counting from zero.
    pub fn new(first_sample: u64, samples: Vec<f32>) -> Self {
        Self {
            first_sample,
            samples,
        }
    }

    /// Index of the first sample
    pub fn first_sample(&self) -> u64 {
        self.first_sample
    }

    /// Index one past the last sample
    pub fn end_sample(&self) -> u64 {
        self.first_sample + self.samples.len() as u64
    }

    /// Samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// The pipeline has shut down
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("sample pipeline is shut down")]
pub struct QueueClosed;

#[derive(Debug, Default)]
struct Shared {
    dropped: AtomicU64,
    shutdown: AtomicBool,
}

/// Create a bounded block queue
///
/// The queue holds at most `capacity` blocks, which must be
/// at least one.
pub fn block_queue(capacity: usize) -> (BlockSender, BlockReceiver) {
    let (tx, rx) = flume::bounded(usize::max(capacity, 1));
    let shared = Arc::new(Shared::default());
    (
        BlockSender {
            tx,
            overflow: rx.clone(),
            shared: shared.clone(),
        },
        BlockReceiver { rx, shared },
    )
}

/// Capture side of the block queue
///
/// May be cloned to feed the queue from several places. The
/// consumer stops once every sender has been dropped and the
/// queue is empty.
#[derive(Clone, Debug)]
pub struct BlockSender {
    tx: flume::Sender<SampleBlock>,
    overflow: flume::Receiver<SampleBlock>,
    shared: Arc<Shared>,
}

impl BlockSender {
    /// Enqueue a block, dropping the oldest block if full
    ///
    /// Never blocks. Returns an error if the pipeline has
    /// shut down, in which case the capture should stop.
    pub fn push(&self, block: SampleBlock) -> Result<(), QueueClosed> {
        let mut block = block;
        loop {
            if self.is_shutdown() {
                return Err(QueueClosed);
            }
            match self.tx.try_send(block) {
                Ok(()) => return Ok(()),
                Err(flume::TrySendError::Disconnected(_)) => return Err(QueueClosed),
                Err(flume::TrySendError::Full(back)) => {
                    block = back;
                    if let Ok(old) = self.overflow.try_recv() {
                        let total = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "pipeline: queue full, dropped block at sample {} ({} dropped)",
                            old.first_sample(),
                            total
                        );
                    }
                }
            }
        }
    }

    /// Enqueue a block, waiting for room if full
    ///
    /// For sources which can wait, like files, where dropping
    /// data is never necessary. Returns an error if the
    /// pipeline shuts down first.
    pub fn push_blocking(&self, block: SampleBlock) -> Result<(), QueueClosed> {
        let mut block = block;
        loop {
            if self.is_shutdown() {
                return Err(QueueClosed);
            }
            match self.tx.send_timeout(block, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(flume::SendTimeoutError::Disconnected(_)) => return Err(QueueClosed),
                Err(flume::SendTimeoutError::Timeout(back)) => block = back,
            }
        }
    }

    /// Number of blocks dropped so far
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// True if the pipeline has shut down
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Obtain a handle that can shut down the pipeline
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shared.clone())
    }
}

/// Processing side of the block queue
///
/// Dropping the receiver shuts down the pipeline.
#[derive(Debug)]
pub struct BlockReceiver {
    rx: flume::Receiver<SampleBlock>,
    shared: Arc<Shared>,
}

impl BlockReceiver {
    /// Obtain a handle that can shut down the pipeline
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shared.clone())
    }

    /// Number of blocks dropped so far
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// True if the pipeline has shut down
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    // Wait for the next block
    //
    // Returns `None` on shutdown, or once all senders are gone
    // and the queue is empty.
    fn next_block(&self) -> Option<SampleBlock> {
        loop {
            if self.is_shutdown() {
                return None;
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(block) => return Some(block),
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

impl Drop for BlockReceiver {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }
}

/// Stops the pipeline from another thread
///
/// The consumer finishes the block it is processing and then
/// stops. Blocks still in the queue are discarded, and any
/// partial code is abandoned without being reported.
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<Shared>);

impl ShutdownHandle {
    /// Request shutdown
    pub fn shutdown(&self) {
        self.0.shutdown.store(true, Ordering::Release);
    }

    /// True if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.0.shutdown.load(Ordering::Acquire)
    }
}

/// Pipeline statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Blocks processed
    pub blocks: u64,

    /// Samples processed
    pub samples: u64,

    /// Blocks dropped by the capture side
    pub dropped: u64,

    /// Discontinuities seen in block indices
    pub discontinuities: u64,
}

/// Run the processing loop
///
/// Takes blocks from `blocks` in arrival order and feeds them
/// through the `receiver`. Every event is passed to `sink`.
/// Blocks until shutdown is requested, or until all senders
/// are dropped and the queue drains.
///
/// The receiver's sample counter is expected to track the
/// block indices. When a block starts later than expected,
/// the receiver is [resynchronized](SelcalReceiver::resync).
/// Blocks which start earlier than expected are processed
/// without adjustment.
pub fn run_pipeline<F>(
    receiver: &mut SelcalReceiver,
    blocks: &BlockReceiver,
    mut sink: F,
) -> PipelineStats
where
    F: FnMut(SelcalReceiverEvent),
{
    let mut stats = PipelineStats::default();

    while let Some(block) = blocks.next_block() {
        if block.first_sample() > receiver.input_sample_counter() {
            stats.discontinuities += 1;
            receiver.resync(block.first_sample());
        }

        for evt in receiver.iter(block.samples().iter().copied()) {
            sink(evt);
        }
        stats.blocks += 1;
        stats.samples += block.samples().len() as u64;
    }

    stats.dropped = blocks.dropped();
    debug!(
        "pipeline: stopped after {} blocks ({} dropped, {} discontinuities)",
        stats.blocks, stats.dropped, stats.discontinuities
    );
    stats
}
