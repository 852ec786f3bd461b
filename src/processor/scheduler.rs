//! Bounded processor scheduler.
//!
//! The pool is split into two partitions: general admissions run while
//! `running < max_concurrent - reserved_for_blocked`, and resumed processors
//! re-enter through the reserved partition while `running < max_concurrent`.
//! The reservation keeps awakened work from starving behind a full general
//! queue. Both limits change together under a single lock.

use parking_lot::{Condvar, Mutex};

struct PoolState {
    max_concurrent: usize,
    reserved_for_blocked: usize,
    running: usize,
    scheduled: usize,
}

impl PoolState {
    fn general_limit(&self) -> usize {
        self.max_concurrent.saturating_sub(self.reserved_for_blocked)
    }
}

pub struct Scheduler {
    state: Mutex<PoolState>,
    available: Condvar,
    idle: Condvar,
}

impl Scheduler {
    pub fn new(max_concurrent: usize, reserved_for_blocked: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let reserved_for_blocked = reserved_for_blocked.min(max_concurrent - 1);
        Self {
            state: Mutex::new(PoolState {
                max_concurrent,
                reserved_for_blocked,
                running: 0,
                scheduled: 0,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Change both limits atomically. Waiters re-check against the new
    /// limits immediately.
    pub fn set_limits(&self, max_concurrent: usize, reserved_for_blocked: usize) {
        let mut state = self.state.lock();
        state.max_concurrent = max_concurrent.max(1);
        state.reserved_for_blocked = reserved_for_blocked.min(state.max_concurrent - 1);
        tracing::debug!(
            max = state.max_concurrent,
            reserved = state.reserved_for_blocked,
            "scheduler limits changed"
        );
        self.available.notify_all();
    }

    /// Account a unit of work as scheduled before its thread exists, so
    /// `wait_idle` cannot return while it is still on the way in.
    pub fn note_scheduled(&self) {
        self.state.lock().scheduled += 1;
    }

    /// Block until a general slot is free, then take it.
    pub fn acquire_slot(&self) {
        let mut state = self.state.lock();
        while state.running >= state.general_limit() {
            self.available.wait(&mut state);
        }
        state.running += 1;
    }

    /// Take a slot from the reserved partition; used when a suspended
    /// processor resumes.
    pub fn acquire_resume_slot(&self) {
        let mut state = self.state.lock();
        while state.running >= state.max_concurrent {
            self.available.wait(&mut state);
        }
        state.running += 1;
    }

    /// Give a slot back without finishing the unit of work; the suspend path
    /// uses this while its thread parks.
    pub fn release_slot(&self) {
        let mut state = self.state.lock();
        state.running = state.running.saturating_sub(1);
        self.available.notify_all();
    }

    /// Finish a scheduled unit of work and release its slot.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.running = state.running.saturating_sub(1);
        state.scheduled = state.scheduled.saturating_sub(1);
        self.available.notify_all();
        if state.scheduled == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every scheduled unit of work has finished.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.scheduled > 0 {
            self.idle.wait(&mut state);
        }
    }

    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    pub fn limits(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.max_concurrent, state.reserved_for_blocked)
    }
}
