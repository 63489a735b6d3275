//! Frame submission and deferred resource release
//!
//! The [`FrameScheduler`] is the layer above the element renderers that
//! tracks frames in flight. Each frame gets a monotonically increasing
//! [`FrameToken`]. Resources an element renderer stops using are not freed
//! right away: they are pushed into a release queue tagged with the token of
//! the frame that last used them, and only destroyed once the owner of GPU
//! fences reports that frame as complete.
//!
//! ## Frame lifecycle
//!
//! ```text
//! begin_frame ─► prepare / upload ─► flush_transfers ─► render ─► reset ─► submit
//!                                                                             │
//!                          complete(token) ◄── GPU fence signalled ◄──────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

use crate::config::RendererConfig;
use crate::render::command_buffer::CommandBufferBuilder;
use crate::render::resources::{GpuResource, RenderBufferView, RenderDevice};
use crate::render::{RenderError, RenderResult};

pub use crate::render::upload_pool::{UploadAllocation, UploadPool};

/// Identifies a frame from `begin_frame` until its GPU work completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameToken(u64);

impl FrameToken {
    /// Raw counter value
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Deferred work run with the device once a frame completes
pub type ReleaseCallback = Box<dyn FnOnce(&mut dyn RenderDevice) + Send>;

/// Something waiting for a frame to complete before it can be reclaimed
pub enum PendingRelease {
    /// A GPU object to destroy
    Resource(GpuResource),
    /// Arbitrary reclamation, e.g. returning a buffer to a pool
    Callback(ReleaseCallback),
}

impl fmt::Debug for PendingRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<GpuResource> for PendingRelease {
    fn from(resource: GpuResource) -> Self {
        Self::Resource(resource)
    }
}

/// Releases ordered by the frame that queued them
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    pending: VecDeque<(FrameToken, PendingRelease)>,
}

impl ReleaseQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a release owned by frame `token`
    pub fn push(&mut self, token: FrameToken, release: PendingRelease) {
        self.pending.push_back((token, release));
    }

    /// Remove and return every release whose frame is at or before `completed`
    pub fn drain_completed(&mut self, completed: FrameToken) -> Vec<PendingRelease> {
        let (done, pending): (VecDeque<_>, VecDeque<_>) = self
            .pending
            .drain(..)
            .partition(|(token, _)| *token <= completed);

        self.pending = pending;
        done.into_iter().map(|(_, release)| release).collect()
    }

    /// Number of releases waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A copy recorded during preparation, replayed before the frame's render passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCommand {
    /// Copy staged bytes into a buffer range
    CopyFromUpload {
        /// Source staging range
        allocation: UploadAllocation,
        /// Destination range
        target: RenderBufferView,
    },
}

#[derive(Debug)]
struct FrameSlot {
    upload_pool: UploadPool,
    transfers: Vec<TransferCommand>,
    busy: bool,
}

/// Tracks frames in flight and owns their transient resources
#[derive(Debug)]
pub struct FrameScheduler {
    next_token: u64,
    last_completed: Option<FrameToken>,
    in_flight: VecDeque<(FrameToken, usize)>,
    release_queue: ReleaseQueue,
    slots: Vec<FrameSlot>,
}

impl FrameScheduler {
    /// Create a scheduler with one frame slot per frame in flight
    pub fn new(config: &RendererConfig) -> Self {
        let slots = (0..config.frames_in_flight.max(1))
            .map(|_| FrameSlot {
                upload_pool: UploadPool::new(config.upload_block_size),
                transfers: Vec::new(),
                busy: false,
            })
            .collect();

        Self {
            next_token: 1,
            last_completed: None,
            in_flight: VecDeque::new(),
            release_queue: ReleaseQueue::new(),
            slots,
        }
    }

    /// Start recording a new frame
    ///
    /// Fails when the slot the frame would use still belongs to a submitted
    /// frame that has not been completed; the caller should wait on its
    /// fence and call [`complete`](Self::complete) first.
    pub fn begin_frame<'a>(&'a mut self, device: &'a mut dyn RenderDevice) -> RenderResult<RenderFrame<'a>> {
        let token = FrameToken(self.next_token);
        let slot = usize::try_from(token.0 % self.slots.len() as u64).unwrap_or(0);

        if self.slots[slot].busy {
            return Err(RenderError::FramesInFlightExhausted {
                limit: self.slots.len(),
            });
        }

        self.next_token += 1;
        let frame_slot = &mut self.slots[slot];
        frame_slot.upload_pool.reset();
        frame_slot.transfers.clear();

        log::trace!("Begin frame {} (slot {})", token.0, slot);

        Ok(RenderFrame {
            scheduler: self,
            device,
            token,
            slot,
        })
    }

    /// Report that the GPU finished every frame up to and including `token`
    ///
    /// Destroys or reclaims everything those frames queued for release and
    /// returns how many releases ran.
    pub fn complete(&mut self, token: FrameToken, device: &mut dyn RenderDevice) -> usize {
        self.last_completed = Some(self.last_completed.map_or(token, |last| last.max(token)));

        while let Some(&(frame_token, slot)) = self.in_flight.front() {
            if frame_token > token {
                break;
            }
            self.slots[slot].busy = false;
            self.in_flight.pop_front();
        }

        let releases = self.release_queue.drain_completed(token);
        let count = releases.len();
        for release in releases {
            match release {
                PendingRelease::Resource(resource) => device.destroy(resource),
                PendingRelease::Callback(callback) => callback(device),
            }
        }

        if count > 0 {
            log::debug!("Frame {} completed, released {} resources", token.0, count);
        }

        count
    }

    /// Complete every frame begun so far, as after a device wait-idle
    pub fn complete_all(&mut self, device: &mut dyn RenderDevice) -> usize {
        match self.next_token.checked_sub(1) {
            Some(last) if last > 0 => self.complete(FrameToken(last), device),
            _ => 0,
        }
    }

    /// Most recent completed frame
    pub const fn last_completed(&self) -> Option<FrameToken> {
        self.last_completed
    }

    /// Number of submitted frames not yet completed
    pub fn frames_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of releases waiting on frame completion
    pub fn pending_releases(&self) -> usize {
        self.release_queue.len()
    }
}

/// Per-frame context handed to element renderers
///
/// Borrowing the scheduler for the duration of the frame guarantees that
/// only one frame is being recorded at a time.
pub struct RenderFrame<'a> {
    scheduler: &'a mut FrameScheduler,
    device: &'a mut dyn RenderDevice,
    token: FrameToken,
    slot: usize,
}

impl<'a> RenderFrame<'a> {
    /// Token of this frame
    pub const fn token(&self) -> FrameToken {
        self.token
    }

    /// Index of the frame-in-flight slot used by this frame
    pub const fn frame_index(&self) -> usize {
        self.slot
    }

    /// Device used to create and update resources during this frame
    pub fn device(&mut self) -> &mut (dyn RenderDevice + 'a) {
        &mut *self.device
    }

    /// Hand a resource over to be reclaimed once this frame completes
    pub fn push_for_release(&mut self, release: impl Into<PendingRelease>) {
        self.scheduler.release_queue.push(self.token, release.into());
    }

    /// Run `callback` once this frame completes
    pub fn push_release_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut dyn RenderDevice) + Send + 'static,
    {
        self.push_for_release(PendingRelease::Callback(Box::new(callback)));
    }

    /// This frame's upload pool
    pub fn upload_pool(&self) -> &UploadPool {
        &self.scheduler.slots[self.slot].upload_pool
    }

    /// Stage `bytes` and queue a copy of them into `target`
    ///
    /// Nothing reaches the GPU until [`flush_transfers`](Self::flush_transfers).
    pub fn upload(&mut self, bytes: &[u8], target: RenderBufferView) -> UploadAllocation {
        let slot = &mut self.scheduler.slots[self.slot];
        let allocation = slot.upload_pool.allocate(bytes.len() as u64);
        slot.upload_pool.write(&allocation, bytes);
        slot.transfers.push(TransferCommand::CopyFromUpload { allocation, target });
        allocation
    }

    /// Transfers queued and not yet flushed
    pub fn pending_transfers(&self) -> &[TransferCommand] {
        &self.scheduler.slots[self.slot].transfers
    }

    /// Record queued transfers between a pre and a post transfer barrier
    pub fn flush_transfers(&mut self, command_buffer: &mut dyn CommandBufferBuilder) {
        let transfers = &mut self.scheduler.slots[self.slot].transfers;
        if transfers.is_empty() {
            return;
        }

        command_buffer.pre_transfer_barrier();
        for transfer in transfers.drain(..) {
            match transfer {
                TransferCommand::CopyFromUpload { allocation, target } => {
                    command_buffer.copy_upload(allocation, target, allocation.size, 0, 0);
                }
            }
        }
        command_buffer.post_transfer_barrier();
    }

    /// Mark the frame as submitted to the GPU
    pub fn submit(self) -> FrameToken {
        let slot = &mut self.scheduler.slots[self.slot];
        if !slot.transfers.is_empty() {
            log::warn!(
                "Frame {} submitted with {} unflushed transfers",
                self.token.0,
                slot.transfers.len()
            );
        }

        slot.busy = true;
        self.scheduler.in_flight.push_back((self.token, self.slot));
        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::{HeadlessDevice, RecordedCommand, RecordingCommandBuffer};
    use crate::render::resources::{BufferInfo, BufferType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scheduler(frames: usize) -> FrameScheduler {
        FrameScheduler::new(&RendererConfig::default().with_frames_in_flight(frames))
    }

    #[test]
    fn test_tokens_increase() {
        let mut device = HeadlessDevice::new();
        let mut scheduler = scheduler(2);

        let first = scheduler.begin_frame(&mut device).unwrap().submit();
        let second = scheduler.begin_frame(&mut device).unwrap().submit();
        assert!(second > first);
        assert_eq!(scheduler.frames_in_flight(), 2);
    }

    #[test]
    fn test_release_waits_for_completion() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Uniform, 64)).unwrap();
        let mut scheduler = scheduler(2);

        let mut frame = scheduler.begin_frame(&mut device).unwrap();
        frame.push_for_release(GpuResource::Buffer(buffer));
        let token = frame.submit();

        assert!(device.contains_buffer(buffer));
        assert_eq!(scheduler.pending_releases(), 1);

        assert_eq!(scheduler.complete(token, &mut device), 1);
        assert!(!device.contains_buffer(buffer));
        assert_eq!(scheduler.pending_releases(), 0);
    }

    #[test]
    fn test_completion_only_drains_older_frames() {
        let mut device = HeadlessDevice::new();
        let mut scheduler = scheduler(3);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut tokens = Vec::new();
        for _ in 0..3 {
            let mut frame = scheduler.begin_frame(&mut device).unwrap();
            let counter = Arc::clone(&counter);
            frame.push_release_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokens.push(frame.submit());
        }

        scheduler.complete(tokens[1], &mut device);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.frames_in_flight(), 1);

        scheduler.complete_all(&mut device);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_begin_fails_when_all_slots_busy() {
        let mut device = HeadlessDevice::new();
        let mut scheduler = scheduler(1);

        let token = scheduler.begin_frame(&mut device).unwrap().submit();
        assert!(matches!(
            scheduler.begin_frame(&mut device),
            Err(RenderError::FramesInFlightExhausted { limit: 1 })
        ));

        scheduler.complete(token, &mut device);
        assert!(scheduler.begin_frame(&mut device).is_ok());
    }

    #[test]
    fn test_flush_transfers_wraps_copies_in_barriers() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Vertex, 64)).unwrap();
        let mut scheduler = scheduler(2);
        let mut commands = RecordingCommandBuffer::new();

        let mut frame = scheduler.begin_frame(&mut device).unwrap();
        frame.upload(&[7; 12], RenderBufferView::whole(buffer, 12));
        assert_eq!(frame.pending_transfers().len(), 1);

        frame.flush_transfers(&mut commands);
        assert!(frame.pending_transfers().is_empty());

        let recorded = commands.commands();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0], RecordedCommand::PreTransferBarrier);
        assert!(matches!(recorded[1], RecordedCommand::CopyUpload { size: 12, .. }));
        assert_eq!(recorded[2], RecordedCommand::PostTransferBarrier);
    }

    #[test]
    fn test_flush_without_transfers_records_nothing() {
        let mut device = HeadlessDevice::new();
        let mut scheduler = scheduler(2);
        let mut commands = RecordingCommandBuffer::new();

        let mut frame = scheduler.begin_frame(&mut device).unwrap();
        frame.flush_transfers(&mut commands);
        assert!(commands.commands().is_empty());
    }
}
