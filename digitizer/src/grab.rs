// SPDX-License-Identifier: GPL-3.0-or-later

//! Bookkeeping for the two grab buffers
//!
//! Each buffer moves through `Idle -> Queued -> InProgress -> Complete -> Idle`.
//! Requests are started strictly in submission order, one at a time.

use arraydeque::ArrayDeque;
use log::trace;

use crate::dev::risc::program::ProgramPair;
use crate::error::{CaptureError, Result};
use crate::format::PixelFormat;
use crate::geometry::Geometry;

/// Number of grab buffers
pub const GRAB_BUFFERS: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SlotState {
    #[default]
    Idle,
    Queued,
    InProgress,
    Complete,
}

impl SlotState {

    /// Submitted and not yet complete
    #[inline]
    pub fn is_outstanding(self) -> bool {
        matches!(self, SlotState::Queued | SlotState::InProgress)
    }

}

/// One memory grab, as submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrabRequest {
    pub buffer: usize,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// A request compiled and ready to be linked
pub struct PreparedGrab {
    pub request: GrabRequest,
    pub geometry: Geometry,
    pub programs: ProgramPair,
}

#[derive(Default)]
struct GrabSlot {
    state: SlotState,
    grab: Option<PreparedGrab>,
}

/// The grab buffers and the order they were submitted in
pub struct GrabQueue {
    slots: [GrabSlot; GRAB_BUFFERS],
    pending: ArrayDeque<usize, GRAB_BUFFERS>,
    active: Option<usize>,
}

impl Default for GrabQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl GrabQueue {

    pub fn new() -> Self {
        GrabQueue {
            slots: Default::default(),
            pending: ArrayDeque::new(),
            active: None,
        }
    }

    #[inline]
    pub fn state(&self, buffer: usize) -> SlotState {
        self.slots.get(buffer).map_or(SlotState::Idle, |slot| slot.state)
    }

    /// Requests queued or being captured
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|slot| slot.state.is_outstanding()).count()
    }

    /// Buffer being captured into
    #[inline]
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// The grab being captured
    pub fn active_grab(&self) -> Option<&PreparedGrab> {
        self.active.and_then(|buffer| self.slots[buffer].grab.as_ref())
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Checks that `buffer` can take a new request
    pub fn check_submit(&self, buffer: usize) -> Result<()> {
        if buffer >= GRAB_BUFFERS {
            return Err(CaptureError::Format(format!("no grab buffer {}", buffer)));
        }
        let outstanding = self.outstanding();
        if outstanding >= GRAB_BUFFERS {
            return Err(CaptureError::Capacity { outstanding });
        }
        if self.slots[buffer].state.is_outstanding() {
            return Err(CaptureError::Busy(buffer));
        }
        Ok(())
    }

    /// Queues a compiled grab behind any already queued. The caller has
    /// passed [`check_submit`](Self::check_submit). Returns what the slot
    /// held before, if anything.
    pub fn push(&mut self, grab: PreparedGrab) -> Option<PreparedGrab> {
        let buffer = grab.request.buffer;
        let slot = &mut self.slots[buffer];
        let old = slot.grab.replace(grab);
        slot.state = SlotState::Queued;
        // Never full: a slot is only queued once, and there are as many
        // places as slots.
        let _ = self.pending.push_back(buffer);
        trace!("grab {} queued", buffer);
        old
    }

    /// Moves the oldest queued request to `InProgress`
    pub fn start_next(&mut self) -> Option<&PreparedGrab> {
        let buffer = self.pending.pop_front()?;
        self.slots[buffer].state = SlotState::InProgress;
        self.active = Some(buffer);
        trace!("grab {} in progress", buffer);
        self.slots[buffer].grab.as_ref()
    }

    /// Marks the active request `Complete`. Its programs stay with the slot
    /// until [`take_programs`](Self::take_programs).
    pub fn complete_active(&mut self) -> Option<usize> {
        let buffer = self.active.take()?;
        self.slots[buffer].state = SlotState::Complete;
        trace!("grab {} complete", buffer);
        Some(buffer)
    }

    /// Hands over a finished slot's programs for release
    pub fn take_programs(&mut self, buffer: usize) -> Option<ProgramPair> {
        let slot = self.slots.get_mut(buffer)?;
        if slot.state.is_outstanding() {
            return None;
        }
        slot.grab.take().map(|grab| grab.programs)
    }

    /// Retires a complete buffer. `Ok(true)` when it was complete and is now
    /// idle, `Ok(false)` while it is still outstanding.
    pub fn reap(&mut self, buffer: usize) -> Result<bool> {
        match self.state(buffer) {
            SlotState::Idle => Err(CaptureError::NotQueued(buffer)),
            SlotState::Complete => {
                self.slots[buffer].state = SlotState::Idle;
                Ok(true)
            }
            SlotState::Queued | SlotState::InProgress => Ok(false),
        }
    }

}


// eof
