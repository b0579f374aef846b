//! Debounce scheduling for render channels.
//!
//! Coalesces bursts of edits into a bounded request rate. Each channel is an
//! independent lane with its own pending timer:
//!
//! ```text
//! Preview  ~300ms   primary parse/preview exchange
//! Engrave  ~5000ms  expensive score-image exchange
//! ```
//!
//! Pure timing state, poll-style: the engine's event loop sleeps until
//! `next_deadline` and then drains `take_due`. No business logic here.


use std::time::Duration;

use tokio::time::Instant;

/// An independent debounce lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Live preview renders.
    Preview,
    /// Expensive engraved-image renders.
    Engrave,
}

const CHANNELS: usize = 2;

impl Channel {
    const fn slot(self) -> usize {
        match self {
            Self::Preview => 0,
            Self::Engrave => 1,
        }
    }

    const fn from_slot(slot: usize) -> Self {
        match slot {
            0 => Self::Preview,
            _ => Self::Engrave,
        }
    }
}

struct Pending<T> {
    deadline: Instant,
    payload: T,
}

/// Last-writer-wins debouncer over a fixed set of channels.
///
/// `schedule` on a channel with a timer already pending replaces both the
/// payload and the deadline - coalescing, not queueing. A payload fires at
/// most once; firing clears the channel.
pub struct Debouncer<T> {
    pending: [Option<Pending<T>>; CHANNELS],
}

impl<T> Debouncer<T> {
    pub fn new() -> Self {
        Self {
            pending: [None, None],
        }
    }

    /// Register `payload` to fire after `delay` of quiescence on `channel`.
    ///
    /// Any earlier pending timer on the same channel is cancelled and its
    /// payload discarded.
    pub fn schedule(&mut self, channel: Channel, delay: Duration, payload: T) {
        self.pending[channel.slot()] = Some(Pending {
            deadline: Instant::now() + delay,
            payload,
        });
    }

    /// Clear a pending timer. No effect if none pending.
    pub fn cancel(&mut self, channel: Channel) {
        self.pending[channel.slot()] = None;
    }

    pub fn is_pending(&self, channel: Channel) -> bool {
        self.pending[channel.slot()].is_some()
    }

    /// Earliest pending deadline across all channels, if any.
    ///
    /// The event loop sleeps until this instant; `None` means nothing is
    /// scheduled and the loop can park on its other event sources.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .flatten()
            .map(|p| p.deadline)
            .min()
    }

    /// Drain every channel whose deadline has passed.
    ///
    /// Fired channels are cleared before their payloads are returned, so a
    /// handler that re-schedules the same channel starts a fresh delay.
    pub fn take_due(&mut self, now: Instant) -> Vec<(Channel, T)> {
        let mut due = Vec::new();
        for slot in 0..CHANNELS {
            if matches!(&self.pending[slot], Some(p) if p.deadline <= now)
                && let Some(p) = self.pending[slot].take()
            {
                due.push((Channel::from_slot(slot), p.payload));
            }
        }
        due
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new()
    }
}
