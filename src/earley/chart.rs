//! The chart
//!
//! One frame set per input position (`0..=len`), plus the join nodes and the
//! completion memo. Frame sets are created on first use, so a parse that dies
//! early never pays for the rest of the input. A frame set deduplicates frames by
//! `(element, progress, join)`: asking for the same frame twice at one
//! position returns `None` the second time.
//!
//! Positions are processed strictly in increasing order, so completions are
//! always recorded at the position currently being closed. That makes the end
//! list of every join sorted, and "has this join completed here" a check of
//! its last entry.

use super::arena::{Frame, FrameArena, FrameId, JoinId};
use super::grammar::ElementKey;
use super::memo::Memo;
use super::FastMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FrameKey {
    element: ElementKey,
    progress: u32,
    join: JoinId,
}

#[derive(Debug, Default)]
struct PositionSet {
    frames: Vec<FrameId>,
    index: FastMap<FrameKey, FrameId>,
    /// Terminal frames to try at this position
    scans: Vec<FrameId>,
    /// Terminal frames that matched and end at this position
    pending: Vec<FrameId>,
}

/// Frame sets, join nodes and memo for one parse
#[derive(Debug)]
pub struct Chart {
    /// Frame sets up to the furthest position touched so far
    positions: Vec<PositionSet>,
    /// Input length plus one
    len: usize,
    arena: FrameArena,
    join_index: FastMap<(ElementKey, usize), JoinId>,
    memo: Memo,
}

impl Chart {
    /// Create a chart for an input of `input_len` bytes
    pub fn for_input(input_len: usize) -> Self {
        Self {
            positions: Vec::new(),
            len: input_len + 1,
            arena: FrameArena::for_input(input_len),
            join_index: FastMap::default(),
            memo: Memo::new(),
        }
    }

    /// Add a frame at `position` unless an identical one is already there
    pub(crate) fn add_frame(&mut self, position: usize, frame: Frame) -> Option<FrameId> {
        let key = FrameKey {
            element: frame.element,
            progress: frame.progress,
            join: frame.join,
        };
        let set = self.position_mut(position);
        if set.index.contains_key(&key) {
            return None;
        }
        let id = self.arena.alloc_frame(frame);
        let set = self.position_mut(position);
        set.index.insert(key, id);
        set.frames.push(id);
        Some(id)
    }

    /// Frame set at `position`, creating it and any missing ones before it
    fn position_mut(&mut self, position: usize) -> &mut PositionSet {
        debug_assert!(position < self.len);
        if position >= self.positions.len() {
            self.positions.resize_with(position + 1, PositionSet::default);
        }
        &mut self.positions[position]
    }

    #[inline]
    pub(crate) fn frame(&self, id: FrameId) -> &Frame {
        self.arena.frame(id)
    }

    /// Join for `(element, start)`, creating it if needed. The flag is `true`
    /// when the join was just created.
    pub(crate) fn join_for(&mut self, element: ElementKey, start: usize) -> (JoinId, bool) {
        if let Some(&join) = self.join_index.get(&(element, start)) {
            return (join, false);
        }
        let join = self.arena.alloc_join(element, start);
        self.join_index.insert((element, start), join);
        (join, true)
    }

    pub(crate) fn add_waiter(&mut self, join: JoinId, waiter: FrameId) {
        self.arena.join_mut(join).waiters.push(waiter);
    }

    pub(crate) fn waiters(&self, join: JoinId) -> &[FrameId] {
        &self.arena.join(join).waiters
    }

    /// Whether the join's element has completed at `end`
    pub(crate) fn completed_at(&self, join: JoinId, end: usize) -> bool {
        self.arena.join(join).ends.last() == Some(&end)
    }

    /// Mark the join's element complete at `end`. Returns `false` if it
    /// already was.
    pub(crate) fn mark_completed(&mut self, join: JoinId, end: usize) -> bool {
        let ends = &mut self.arena.join_mut(join).ends;
        debug_assert!(ends.last().map_or(true, |&last| last <= end));
        if ends.last() == Some(&end) {
            return false;
        }
        ends.push(end);
        true
    }

    pub(crate) fn add_scan(&mut self, position: usize, frame: FrameId) {
        self.position_mut(position).scans.push(frame);
    }

    pub(crate) fn scans(&self, position: usize) -> &[FrameId] {
        self.positions
            .get(position)
            .map(|set| set.scans.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn add_pending(&mut self, position: usize, frame: FrameId) {
        self.position_mut(position).pending.push(frame);
    }

    pub(crate) fn take_pending(&mut self, position: usize) -> Vec<FrameId> {
        match self.positions.get_mut(position) {
            Some(set) => std::mem::take(&mut set.pending),
            None => Vec::new(),
        }
    }

    /// Whether anything is scheduled at `position`
    pub(crate) fn has_work(&self, position: usize) -> bool {
        self.positions
            .get(position)
            .is_some_and(|set| !set.frames.is_empty() || !set.pending.is_empty())
    }

    /// One past the furthest position anything was scheduled at. Positions
    /// from here on have no work and never will unless a scan reaches them.
    pub(crate) fn horizon(&self) -> usize {
        self.positions.len()
    }

    /// Frames alive at `position`
    #[cfg_attr(not(feature = "logging"), allow(dead_code))]
    pub(crate) fn frames_at(&self, position: usize) -> &[FrameId] {
        self.positions
            .get(position)
            .map(|set| set.frames.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn memo(&self) -> &Memo {
        &self.memo
    }

    pub(crate) fn memo_mut(&mut self) -> &mut Memo {
        &mut self.memo
    }

    pub(crate) fn into_memo(self) -> Memo {
        self.memo
    }

    /// Number of positions (input length plus one)
    pub fn positions(&self) -> usize {
        self.len
    }

    /// Frames created so far
    pub fn frame_count(&self) -> usize {
        self.arena.len()
    }

    /// Join nodes created so far
    pub fn join_count(&self) -> usize {
        self.arena.join_count()
    }

    /// Approximate heap usage in bytes, memo included
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage() + self.memo.memory_usage()
    }
}
