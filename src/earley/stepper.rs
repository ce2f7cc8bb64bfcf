//! Closure and scanning
//!
//! The stepper drives the chart one position at a time:
//!
//! - [`Stepper::close`] runs the closure at a position: terminal matches that
//!   end here are completed, frames are expanded into their children (the
//!   predictor), and completed elements advance the frames waiting on them
//!   (the completer). Work is kept on an agenda until nothing new appears.
//! - [`Stepper::scan`] tries every terminal frame of the position against the
//!   input and schedules matches as completions at their end position.
//!
//! Children are requested through join nodes keyed by `(element, start)`. The
//! first request creates the child's frame; later requests only register a
//! waiter. If the child already completed at the current position (it matched
//! the empty string), a late waiter is advanced on the spot, so nullable
//! elements need no separate pre-pass.
//!
//! A join propagates at most once per end position, so cyclic grammars
//! (`A = A / "x"`, `S = S S / ""`) terminate; every distinct derivation is
//! still recorded in the memo.

use super::arena::{Frame, FrameId};
use super::chart::Chart;
use super::error::ParseError;
use super::grammar::{Element, ElementKey, GrammarSet};
use super::memo::{Derivation, Link, ProgressKey, SpanKey};
use super::parser::ResourceGuard;
use super::FastMap;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
enum Task {
    /// Expand a new frame
    Process(FrameId),
    /// The frame's element has been recognized up to the current position
    Complete(FrameId),
}

/// Per-parse engine state
pub(crate) struct Stepper<'g, 'i> {
    set: GrammarSet<'g>,
    input: &'i [u8],
    chart: Chart,
    agenda: VecDeque<Task>,
    /// Resolved rule-call targets
    calls: FastMap<ElementKey, ElementKey>,
    guard: ResourceGuard,
}

impl<'g, 'i> Stepper<'g, 'i> {
    pub(crate) fn new(set: GrammarSet<'g>, input: &'i [u8], guard: ResourceGuard) -> Self {
        Self {
            set,
            input,
            chart: Chart::for_input(input.len()),
            agenda: VecDeque::new(),
            calls: FastMap::default(),
            guard,
        }
    }

    /// Schedule the start element at position 0. Its join has no waiters.
    pub(crate) fn seed(&mut self, root: ElementKey) {
        let (join, _) = self.chart.join_for(root, 0);
        self.push_frame(
            0,
            Frame {
                element: root,
                progress: 0,
                start: 0,
                join,
            },
        );
    }

    pub(crate) fn has_work(&self, position: usize) -> bool {
        self.chart.has_work(position)
    }

    pub(crate) fn chart(&self) -> &Chart {
        &self.chart
    }

    pub(crate) fn set(&self) -> &GrammarSet<'g> {
        &self.set
    }

    pub(crate) fn into_parts(self) -> (GrammarSet<'g>, Chart) {
        (self.set, self.chart)
    }

    /// Run the closure at `position`
    pub(crate) fn close(&mut self, position: usize) -> Result<(), ParseError> {
        for id in self.chart.take_pending(position) {
            let frame = *self.chart.frame(id);
            self.record(
                SpanKey {
                    element: frame.element,
                    start: frame.start,
                    end: position,
                },
                Derivation::Terminal,
            );
            self.agenda.push_back(Task::Complete(id));
        }

        while let Some(task) = self.agenda.pop_front() {
            self.guard.tick(&self.chart)?;
            match task {
                Task::Process(id) => self.process(id, position)?,
                Task::Complete(id) => self.complete(id, position),
            }
        }

        log_trace!(
            "closed position {}: {} frames",
            position,
            self.chart.frames_at(position).len()
        );
        Ok(())
    }

    /// Try every terminal frame at `position`; matches become completions at
    /// their end position. Returns the terminals that failed to match.
    pub(crate) fn scan(&mut self, position: usize) -> Vec<ElementKey> {
        let mut failed = Vec::new();
        for i in 0..self.chart.scans(position).len() {
            let id = self.chart.scans(position)[i];
            let frame = *self.chart.frame(id);
            match self.set.element(frame.element).match_at(self.input, position) {
                Some(end) => self.chart.add_pending(end, id),
                None => {
                    if !failed.contains(&frame.element) {
                        failed.push(frame.element);
                    }
                }
            }
        }
        failed
    }

    fn push_frame(&mut self, position: usize, frame: Frame) {
        if let Some(id) = self.chart.add_frame(position, frame) {
            self.agenda.push_back(Task::Process(id));
        }
    }

    fn record(&mut self, key: SpanKey, derivation: Derivation) {
        self.chart.memo_mut().record_completion(key, derivation);
    }

    fn resolve(&mut self, call: ElementKey) -> Result<ElementKey, ParseError> {
        if let Some(&target) = self.calls.get(&call) {
            return Ok(target);
        }
        let target = self.set.resolve_call(call)?;
        self.calls.insert(call, target);
        Ok(target)
    }

    /// Expand a frame at `position`
    fn process(&mut self, id: FrameId, position: usize) -> Result<(), ParseError> {
        let frame = *self.chart.frame(id);
        let span = SpanKey {
            element: frame.element,
            start: frame.start,
            end: position,
        };

        match self.set.element(frame.element) {
            Element::Alternation { alternatives } => {
                for &alternative in alternatives {
                    let child = self.set.child(frame.element, alternative);
                    self.enter(child, position, id);
                }
            }
            Element::Concatenation { elements } => {
                match elements.get(frame.progress as usize) {
                    Some(&next) => {
                        let child = self.set.child(frame.element, next);
                        self.enter(child, position, id);
                    }
                    None => {
                        self.record(
                            span,
                            Derivation::Sequence {
                                len: frame.progress,
                            },
                        );
                        self.agenda.push_back(Task::Complete(id));
                    }
                }
            }
            Element::Repetition {
                element,
                lower,
                upper,
            } => {
                if upper.map_or(true, |upper| frame.progress < upper) {
                    let child = self.set.child(frame.element, *element);
                    self.enter(child, position, id);
                }
                if frame.progress >= *lower {
                    self.record(
                        span,
                        Derivation::Repeat {
                            count: frame.progress,
                        },
                    );
                    self.agenda.push_back(Task::Complete(id));
                }
            }
            Element::RuleCall { .. } => {
                let target = self.resolve(frame.element)?;
                self.enter(target, position, id);
            }
            Element::LiteralString { bytes, .. } if bytes.is_empty() => {
                self.record(span, Derivation::Terminal);
                self.agenda.push_back(Task::Complete(id));
            }
            Element::LiteralString { .. } | Element::LiteralRange { .. } => {
                self.chart.add_scan(position, id);
            }
        }
        Ok(())
    }

    /// Ask for `child` to be recognized from `position` on behalf of `waiter`
    fn enter(&mut self, child: ElementKey, position: usize, waiter: FrameId) {
        let (join, fresh) = self.chart.join_for(child, position);
        self.chart.add_waiter(join, waiter);
        if fresh {
            self.push_frame(
                position,
                Frame {
                    element: child,
                    progress: 0,
                    start: position,
                    join,
                },
            );
        } else if self.chart.completed_at(join, position) {
            self.advance(waiter, child, position, position);
        }
    }

    /// The frame's element has been recognized over `start..position`;
    /// resume everything waiting on its join, once per end position
    fn complete(&mut self, id: FrameId, position: usize) {
        let frame = *self.chart.frame(id);
        if !self.chart.mark_completed(frame.join, position) {
            return;
        }
        // Waiters that arrive while this loop runs see the join as completed
        // in `enter` and advance themselves.
        let waiters = self.chart.waiters(frame.join).to_vec();
        for waiter in waiters {
            self.advance(waiter, frame.element, frame.start, position);
        }
    }

    /// Move `waiter` past its child, which spans `split..end`
    fn advance(&mut self, waiter: FrameId, child: ElementKey, split: usize, end: usize) {
        let frame = *self.chart.frame(waiter);
        let span = SpanKey {
            element: frame.element,
            start: frame.start,
            end,
        };

        match self.set.element(frame.element) {
            Element::Alternation { alternatives } => {
                let found = alternatives
                    .iter()
                    .position(|&a| self.set.child(frame.element, a) == child);
                if let Some(alternative) = found {
                    self.record(
                        span,
                        Derivation::Choice {
                            alternative: alternative as u32,
                        },
                    );
                    self.agenda.push_back(Task::Complete(waiter));
                }
            }
            Element::Concatenation { .. } => {
                let next = frame.progress + 1;
                self.extend(frame, next, split, end);
            }
            Element::Repetition { lower, upper, .. } => {
                // Once an unbounded count saturates, a zero-width iteration
                // would only lead back to the same frame. Bounded counts keep
                // rising to `upper`, so every count is its own derivation.
                if upper.is_none() && split == end && frame.progress >= *lower {
                    return;
                }
                let next = if upper.is_none() && frame.progress >= *lower {
                    frame.progress
                } else {
                    frame.progress + 1
                };
                self.extend(frame, next, split, end);
            }
            Element::RuleCall { .. } => {
                self.record(span, Derivation::Call { target: child });
                self.agenda.push_back(Task::Complete(waiter));
            }
            Element::LiteralString { .. } | Element::LiteralRange { .. } => {
                debug_assert!(false, "terminals never wait on children");
            }
        }
    }

    /// Record how prefix `next` was reached and schedule its frame at `end`
    fn extend(&mut self, frame: Frame, next: u32, split: usize, end: usize) {
        self.chart.memo_mut().record_link(
            ProgressKey {
                element: frame.element,
                progress: next,
                start: frame.start,
                end,
            },
            Link {
                previous: frame.progress,
                split,
            },
        );
        self.push_frame(
            end,
            Frame {
                progress: next,
                ..frame
            },
        );
    }
}
