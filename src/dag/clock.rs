// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Monotonic wall-clock timestamps for version provenance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out Unix-nanosecond timestamps that never repeat or go backwards,
/// even if the system clock steps back or many threads call at once.
pub struct ProvenanceClock {
    last: AtomicU64,
}

impl ProvenanceClock {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    fn physical_time_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    /// Returns a timestamp strictly greater than every earlier one.
    pub fn now(&self) -> u64 {
        loop {
            let physical = Self::physical_time_nanos();
            let last = self.last.load(Ordering::Acquire);
            let next = physical.max(last.saturating_add(1));

            if self
                .last
                .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return next;
            }
        }
    }
}

impl Default for ProvenanceClock {
    fn default() -> Self {
        Self::new()
    }
}

static CLOCK: ProvenanceClock = ProvenanceClock::new();

/// Process-wide provenance timestamp.
pub(crate) fn now_nanos() -> u64 {
    CLOCK.now()
}
