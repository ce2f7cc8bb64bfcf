//! Frame arena
//!
//! Every frame the parser creates lives in one contiguous vector and is
//! addressed by a [`FrameId`]. Frames are never removed during a parse, so ids
//! stay valid until the arena is dropped or reset. Join nodes are stored the
//! same way and addressed by [`JoinId`].

use super::grammar::ElementKey;
use std::mem;

/// Index of a frame in the [`FrameArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u32);

/// Index of a join node in the [`FrameArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(pub(crate) u32);

/// A partially recognized element
///
/// `progress` counts completed children for a concatenation and completed
/// iterations for a repetition (saturating at the lower bound when the
/// repetition is unbounded); it is zero for every other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub element: ElementKey,
    pub progress: u32,
    pub start: usize,
    /// Join shared by every frame of `element` started at `start`; its
    /// waiters resume when this frame completes
    pub join: JoinId,
}

/// The continuation point for one `(element, start)` pair
///
/// All parents that need `element` recognized from `start` wait on the same
/// join, and the element's frame is created only once no matter how many
/// parents ask for it.
#[derive(Debug, Clone)]
pub(crate) struct JoinNode {
    pub element: ElementKey,
    pub start: usize,
    /// Frames to advance when the element completes
    pub waiters: Vec<FrameId>,
    /// End positions at which the element has completed
    pub ends: Vec<usize>,
}

/// Storage for frames and join nodes
#[derive(Debug, Default)]
pub struct FrameArena {
    frames: Vec<Frame>,
    joins: Vec<JoinNode>,
}

impl FrameArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena sized for an input of `input_len` bytes
    ///
    /// A typical grammar creates a handful of frames per input byte; start
    /// with room for four and let the vectors grow from there.
    pub fn for_input(input_len: usize) -> Self {
        let estimate = input_len.saturating_mul(4).clamp(64, 1 << 20);
        Self {
            frames: Vec::with_capacity(estimate),
            joins: Vec::with_capacity(estimate / 2),
        }
    }

    pub(crate) fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(frame);
        id
    }

    #[inline]
    pub(crate) fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub(crate) fn alloc_join(&mut self, element: ElementKey, start: usize) -> JoinId {
        let id = JoinId(self.joins.len() as u32);
        self.joins.push(JoinNode {
            element,
            start,
            waiters: Vec::new(),
            ends: Vec::new(),
        });
        id
    }

    #[inline]
    pub(crate) fn join(&self, id: JoinId) -> &JoinNode {
        &self.joins[id.0 as usize]
    }

    #[inline]
    pub(crate) fn join_mut(&mut self, id: JoinId) -> &mut JoinNode {
        &mut self.joins[id.0 as usize]
    }

    /// Number of frames allocated
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames have been allocated
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of join nodes allocated
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// Drop all frames and joins, keeping the allocations
    pub fn reset(&mut self) {
        self.frames.clear();
        self.joins.clear();
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.frames.capacity() * mem::size_of::<Frame>()
            + self.joins.capacity() * mem::size_of::<JoinNode>()
            + self
                .joins
                .iter()
                .map(|j| {
                    j.waiters.capacity() * mem::size_of::<FrameId>()
                        + j.ends.capacity() * mem::size_of::<usize>()
                })
                .sum::<usize>()
    }
}
