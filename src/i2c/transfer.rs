// Licensed under the Apache-2.0 license

//! Interrupt-side cursor over the group currently on the wire.
//!
//! The thread that owns the transfer builds an [`ActiveTransfer`] from the
//! caller's messages, parks it in interrupt-shared state and sleeps. Interrupt
//! handlers and DMA callbacks advance it. When the group ends it is turned into
//! an immutable [`GroupOutcome`] and handed back across the completion
//! semaphore; nothing touches the cursor after that point.

use crate::i2c::error::BusErrors;
use crate::i2c::message::{Direction, GroupPlan, Message, TargetAddress, MAX_MESSAGES};
use heapless::Vec;

/// Which engine moves the data bytes of the group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XferPath {
    Interrupt,
    Dma,
}

/// What an interrupt or callback did to the group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete,
    Failed,
}

#[derive(Copy, Clone, Debug)]
struct Segment {
    ptr: *mut u8,
    len: usize,
}

/// Result of one group, read by the waiting thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupOutcome {
    pub errors: BusErrors,
    pub transferred: usize,
}

pub struct ActiveTransfer {
    segments: Vec<Segment, MAX_MESSAGES>,
    seg_index: usize,
    seg_offset: usize,
    direction: Direction,
    address: TargetAddress,
    path: XferPath,
    total: usize,
    remaining: usize,
    unprogrammed: usize,
    has_stop: bool,
    restart: bool,
    header_restarted: bool,
    hw_done: bool,
    errors: BusErrors,
}

// SAFETY: the raw segment pointers borrow caller buffers that outlive the
// cursor: the owning thread blocks until the cursor is retired (completion,
// failure or DMA teardown) before it returns and releases the borrow.
unsafe impl Send for ActiveTransfer {}

impl ActiveTransfer {
    pub(crate) fn new(
        msgs: &mut [Message<'_>],
        plan: &GroupPlan,
        address: TargetAddress,
        path: XferPath,
        restart: bool,
    ) -> Self {
        let mut segments: Vec<Segment, MAX_MESSAGES> = Vec::new();
        for msg in msgs.iter_mut().skip(plan.first).take(plan.count) {
            let (ptr, len) = msg.raw_parts();
            // Plans never hold more messages than the list bound.
            let _ = segments.push(Segment { ptr, len });
        }
        Self {
            segments,
            seg_index: 0,
            seg_offset: 0,
            direction: plan.direction,
            address,
            path,
            total: plan.len,
            remaining: plan.len,
            unprogrammed: plan.len,
            has_stop: plan.has_stop,
            restart,
            header_restarted: false,
            hw_done: false,
            errors: BusErrors::empty(),
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn address(&self) -> TargetAddress {
        self.address
    }

    #[must_use]
    pub fn path(&self) -> XferPath {
        self.path
    }

    /// Group byte count.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Bytes not yet moved to or from the data register.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    #[must_use]
    pub fn has_stop(&self) -> bool {
        self.has_stop
    }

    /// The group follows one that kept the bus: the start is a repeated start.
    #[must_use]
    pub fn is_restart(&self) -> bool {
        self.restart
    }

    #[must_use]
    pub fn errors(&self) -> BusErrors {
        self.errors
    }

    pub fn flag(&mut self, errors: BusErrors) {
        self.errors |= errors;
    }

    /// Legacy 10-bit reads address the target as a writer first, then turn
    /// the bus around with a repeated start and the read header.
    #[must_use]
    pub fn header_restarted(&self) -> bool {
        self.header_restarted
    }

    pub fn mark_header_restarted(&mut self) {
        self.header_restarted = true;
    }

    /// The peripheral finished the group before the DMA callback arrived.
    #[must_use]
    pub fn hw_done(&self) -> bool {
        self.hw_done
    }

    pub fn mark_hw_done(&mut self) {
        self.hw_done = true;
    }

    /// Carve the next hardware byte-count segment of at most `max` bytes.
    /// Returns the segment length and whether more segments follow.
    pub fn take_hw_segment(&mut self, max: usize) -> (usize, bool) {
        let len = self.unprogrammed.min(max);
        self.unprogrammed -= len;
        (len, self.unprogrammed > 0)
    }

    /// Next byte to transmit, advancing the cursor.
    pub fn next_write_byte(&mut self) -> Option<u8> {
        if self.direction != Direction::Write || self.remaining == 0 {
            return None;
        }
        let seg = self.current_segment()?;
        // SAFETY: `seg_offset < seg.len` is maintained by `advance`, and the
        // buffer outlives the cursor.
        let byte = unsafe { *seg.ptr.add(self.seg_offset) };
        self.advance(1);
        Some(byte)
    }

    /// Store a received byte. Returns `false` if the group is already full.
    pub fn push_read_byte(&mut self, byte: u8) -> bool {
        if self.direction != Direction::Read || self.remaining == 0 {
            return false;
        }
        let Some(seg) = self.current_segment() else {
            return false;
        };
        // SAFETY: as in `next_write_byte`; read segments come from `&mut [u8]`.
        unsafe { *seg.ptr.add(self.seg_offset) = byte };
        self.advance(1);
        true
    }

    /// Memory address and length of the message the DMA engine should serve
    /// next, and whether it is the group's last.
    #[must_use]
    pub fn dma_segment(&self) -> Option<(usize, usize, bool)> {
        let seg = self.current_segment()?;
        let last = self.seg_index + 1 == self.segments.len();
        Some((seg.ptr as usize, seg.len, last))
    }

    /// The DMA engine moved the whole current message.
    pub fn complete_dma_segment(&mut self) -> usize {
        let Some(seg) = self.current_segment() else {
            return 0;
        };
        let moved = seg.len - self.seg_offset;
        self.advance(moved);
        moved
    }

    /// Every segment lies inside `window`.
    #[must_use]
    pub fn within(&self, window: &core::ops::Range<usize>) -> bool {
        self.segments.iter().all(|s| {
            let start = s.ptr as usize;
            window.contains(&start) && s.len <= window.end - start
        })
    }

    #[must_use]
    pub fn outcome(&self) -> GroupOutcome {
        GroupOutcome {
            errors: self.errors,
            transferred: self.total - self.remaining,
        }
    }

    fn current_segment(&self) -> Option<Segment> {
        self.segments.get(self.seg_index).copied()
    }

    fn advance(&mut self, mut count: usize) {
        while count > 0 {
            let Some(seg) = self.current_segment() else {
                return;
            };
            let step = count.min(seg.len - self.seg_offset);
            self.seg_offset += step;
            self.remaining = self.remaining.saturating_sub(step);
            count -= step;
            if self.seg_offset == seg.len {
                self.seg_index += 1;
                self.seg_offset = 0;
            }
        }
    }
}
