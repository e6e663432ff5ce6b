use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use imubridge_frame::{ChannelId, CombinedFrame, Frame, CHANNEL_COUNT};
use tracing::{debug, trace};

/// Receives combined frames as soon as they are paired.
///
/// Called from inside the synchronizer's critical section, so deliveries
/// arrive in pairing order and never overlap. Implementations must not block:
/// both channels wait on the same lock.
pub trait FrameSink: Send + Sync {
    /// Take ownership of a freshly combined frame.
    fn deliver(&self, frame: CombinedFrame);
}

impl<S: FrameSink + ?Sized> FrameSink for Arc<S> {
    fn deliver(&self, frame: CombinedFrame) {
        (**self).deliver(frame)
    }
}

/// What happens when a channel produces a frame while its previous one is
/// still waiting for a partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotPolicy {
    /// Replace the waiting frame with the newer one. The producer never blocks.
    #[default]
    Overwrite,
    /// Hold the producer until the waiting frame has been paired, so the
    /// i-th frame of one channel always pairs with the i-th of the other.
    Lockstep,
}

/// Per-channel holding area for the latest unpaired frame.
///
/// The stored frame outlives its readiness: after a pairing the frame stays
/// but `ready` is cleared, and it is only paired again once replaced.
#[derive(Debug, Clone, Default)]
pub struct PendingSlot {
    frame: Option<Frame>,
    ready: bool,
}

impl PendingSlot {
    /// The most recent frame recorded for this channel.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// True while the stored frame has not been part of an emission.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn record(&mut self, frame: Frame) {
        self.frame = Some(frame);
        self.ready = true;
    }
}

/// Synchronizer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Frames recorded, per channel.
    pub recorded: [u64; CHANNEL_COUNT],
    /// Ready frames replaced before pairing (overwrite policy only).
    pub overwritten: u64,
    /// Combined frames handed to the sink.
    pub emitted: u64,
}

#[derive(Debug, Default)]
struct SyncState {
    slots: [PendingSlot; CHANNEL_COUNT],
    stats: SyncStats,
    closed: bool,
}

/// Pairs the two channels' frames and pushes each pair to a [`FrameSink`].
///
/// Every `on_frame` call records, checks and (when both slots are ready)
/// emits under one lock, so concurrent producers can never miss or
/// double-count a pairing. There is no pairing timeout: a silent channel
/// stalls emission indefinitely.
pub struct FrameSynchronizer<S> {
    sink: S,
    policy: SlotPolicy,
    state: Mutex<SyncState>,
    slot_freed: Condvar,
}

impl<S: FrameSink> FrameSynchronizer<S> {
    /// Create a synchronizer with the overwrite policy.
    pub fn new(sink: S) -> Self {
        Self::with_policy(sink, SlotPolicy::default())
    }

    /// Create a synchronizer with an explicit slot policy.
    pub fn with_policy(sink: S, policy: SlotPolicy) -> Self {
        Self {
            sink,
            policy,
            state: Mutex::new(SyncState::default()),
            slot_freed: Condvar::new(),
        }
    }

    /// Record a frame for its channel and emit a combined frame if both
    /// channels are now ready.
    ///
    /// Returns `true` when this call emitted. After [`close`](Self::close)
    /// frames are ignored.
    pub fn on_frame(&self, frame: Frame) -> bool {
        let index = frame.channel.index();
        let mut state = self.lock();

        if self.policy == SlotPolicy::Lockstep {
            while state.slots[index].ready && !state.closed {
                state = self
                    .slot_freed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        if state.closed {
            return false;
        }

        if state.slots[index].ready {
            state.stats.overwritten += 1;
            debug!(channel = %frame.channel, "unpaired frame replaced by newer frame");
        }
        state.stats.recorded[index] += 1;
        state.slots[index].record(frame);

        if !state.slots.iter().all(PendingSlot::is_ready) {
            return false;
        }

        let combined = match (&state.slots[0].frame, &state.slots[1].frame) {
            (Some(zero), Some(one)) => CombinedFrame::combine(zero, one),
            _ => return false,
        };
        for slot in state.slots.iter_mut() {
            slot.ready = false;
        }
        state.stats.emitted += 1;
        trace!(emitted = state.stats.emitted, "combined frame emitted");

        self.sink.deliver(combined);
        drop(state);
        self.slot_freed.notify_all();
        true
    }

    /// Stop accepting frames and release producers waiting in lockstep.
    pub fn close(&self) {
        self.lock().closed = true;
        self.slot_freed.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Snapshot of a channel's pending slot.
    pub fn slot(&self, channel: ChannelId) -> PendingSlot {
        self.lock().slots[channel.index()].clone()
    }

    /// Synchronizer counters.
    pub fn stats(&self) -> SyncStats {
        self.lock().stats
    }

    /// The slot policy in effect.
    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    /// The sink receiving combined frames.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
