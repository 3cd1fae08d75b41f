//! Multi-tick suspension.
//!
//! A latent capability hands the interpreter a [`LatentAction`]; the
//! interpreter parks the rest of the chain as a [`Continuation`] in the
//! [`LatentScheduler`], which the host polls once per tick.

use crate::{
    interpret::Frame,
    model::{NodeIndex, SlotIndex},
    object::ObjectId,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LatentStatus {
    Pending,
    Done,
}

/// Completion condition of a suspended node.
pub trait LatentAction {
    /// Advances the condition by `dt` seconds.
    fn update(&mut self, dt: f32) -> LatentStatus;
}

impl<F> LatentAction for F
where
    F: FnMut(f32) -> LatentStatus,
{
    fn update(&mut self, dt: f32) -> LatentStatus {
        (self)(dt)
    }
}

/// Completes once `seconds` of tick time have elapsed.
#[derive(Debug, Clone)]
pub struct Delay {
    remaining: f32,
}

impl Delay {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }
}

impl LatentAction for Delay {
    fn update(&mut self, dt: f32) -> LatentStatus {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            LatentStatus::Done
        } else {
            LatentStatus::Pending
        }
    }
}

/// Completes on the next poll.
#[derive(Debug, Clone, Default)]
pub struct NextTick;

impl LatentAction for NextTick {
    fn update(&mut self, _dt: f32) -> LatentStatus {
        LatentStatus::Done
    }
}

/// Completes after `frames` polls, or on the first one if `frames` is zero.
#[derive(Debug, Clone)]
pub struct WaitFrames {
    remaining: u32,
}

impl WaitFrames {
    pub fn new(frames: u32) -> Self {
        Self { remaining: frames }
    }
}

impl LatentAction for WaitFrames {
    fn update(&mut self, _dt: f32) -> LatentStatus {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            LatentStatus::Done
        } else {
            LatentStatus::Pending
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContinuationId(u64);

/// The parked remainder of a dispatch.
pub struct Continuation {
    /// Class whose runtime graph the chain belongs to.
    pub class: String,
    pub frame: Frame,
    /// The latent node that suspended.
    pub node: NodeIndex,
    /// Slot chosen from the node's result; `None` ends the chain on resume.
    pub slot: Option<SlotIndex>,
    pub until: Box<dyn LatentAction>,
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("class", &self.class)
            .field("frame", &self.frame)
            .field("node", &self.node)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Parked {
    id: ContinuationId,
    owner: ObjectId,
    continuation: Continuation,
}

/// A continuation whose condition reported done during [`LatentScheduler::poll`].
#[derive(Debug)]
pub struct Ready {
    pub id: ContinuationId,
    pub owner: ObjectId,
    pub continuation: Continuation,
}

#[derive(Debug, Default)]
pub struct LatentScheduler {
    next_id: u64,
    parked: Vec<Parked>,
}

impl LatentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(&mut self, owner: ObjectId, continuation: Continuation) -> ContinuationId {
        let id = ContinuationId(self.next_id);
        self.next_id += 1;
        tracing::debug!(
            "suspend {:?} for {owner}: {}@{}",
            id,
            continuation.frame.event,
            continuation.node
        );
        self.parked.push(Parked {
            id,
            owner,
            continuation,
        });
        id
    }

    /// Advances every parked condition once and hands back those that completed,
    /// in suspension order. Continuations parked while the caller resumes these
    /// are first polled on the next call.
    pub fn poll(&mut self, dt: f32) -> Vec<Ready> {
        let mut ready = Vec::new();
        let mut still_parked = Vec::with_capacity(self.parked.len());

        for mut parked in self.parked.drain(..) {
            match parked.continuation.until.update(dt) {
                LatentStatus::Done => ready.push(Ready {
                    id: parked.id,
                    owner: parked.owner,
                    continuation: parked.continuation,
                }),
                LatentStatus::Pending => still_parked.push(parked),
            }
        }

        self.parked = still_parked;
        ready
    }

    /// Drops every continuation owned by `owner`. Returns how many were dropped.
    pub fn cancel(&mut self, owner: ObjectId) -> usize {
        let before = self.parked.len();
        self.parked.retain(|parked| parked.owner != owner);
        let cancelled = before - self.parked.len();
        if cancelled > 0 {
            tracing::debug!("cancelled {cancelled} continuation(s) of {owner}");
        }
        cancelled
    }

    pub fn pending_for(&self, owner: ObjectId) -> usize {
        self.parked
            .iter()
            .filter(|parked| parked.owner == owner)
            .count()
    }

    pub fn len(&self) -> usize {
        self.parked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}
