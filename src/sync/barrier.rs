//! Barrier for N-way rendezvous.
//!
//! The barrier trips when `parties` callers have arrived. Tripping releases
//! every waiter of the round and resets the barrier for the next round, so
//! the same instance can be reused across any number of rounds.
//!
//! A generation counter distinguishes rounds: waiters block until their
//! generation is over, so a released waiter can never be confused with one
//! from a later round. Overlapping rounds are a caller precondition — a
//! thread must let a round fully drain before re-entering `wait`.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BarrierState {
    /// Arrivals still missing for the current round; counts down from
    /// `parties` and resets when it reaches 0.
    remaining: usize,
    generation: u64,
}

/// Barrier for N-way rendezvous, reusable across rounds.
#[derive(Debug)]
pub struct Barrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl Barrier {
    /// Creates a barrier that trips when `parties` callers have arrived.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "barrier requires at least 1 party");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                remaining: parties,
                generation: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Returns the number of parties required to trip the barrier.
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Waits for all parties to arrive at the barrier.
    ///
    /// Returns `true` once the round completes. The arriving caller that
    /// completes the round returns immediately; it also resets the barrier
    /// for the next round. Returns `false` if the timeout elapses before the
    /// round completes; a timed-out caller's arrival still counts toward the
    /// round, so the remaining parties can trip it without that caller.
    /// `None` blocks indefinitely.
    ///
    /// With `parties == 1` every call completes a round immediately.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        state.remaining -= 1;

        if state.remaining == 0 {
            // Trip: reset for the next round and release everyone.
            state.remaining = self.parties;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return true;
        }

        let local_gen = state.generation;
        let deadline = timeout.map(|t| Instant::now() + t);

        while state.generation == local_gen {
            match deadline {
                None => {
                    state = self.cvar.wait(state).expect("barrier lock poisoned");
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    let (guard, _) = self
                        .cvar
                        .wait_timeout(state, remaining)
                        .expect("barrier lock poisoned");
                    state = guard;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn barrier_trips_when_all_parties_arrive() {
        init_test("barrier_trips_when_all_parties_arrive");
        let barrier = Arc::new(Barrier::new(3));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let completed = Arc::clone(&completed);
            handles.push(std::thread::spawn(move || {
                let released = barrier.wait(Some(Duration::from_secs(5)));
                if released {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        let released = barrier.wait(Some(Duration::from_secs(5)));
        crate::assert_with_log!(released, "completing caller released", true, released);
        completed.fetch_add(1, Ordering::SeqCst);

        for handle in handles {
            handle.join().expect("thread failed");
        }

        let count = completed.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 3, "all parties released", 3usize, count);
        crate::test_complete!("barrier_trips_when_all_parties_arrive");
    }

    #[test]
    fn barrier_is_reusable_for_a_second_round() {
        init_test("barrier_is_reusable_for_a_second_round");
        let barrier = Arc::new(Barrier::new(2));

        for _round in 0..2 {
            let partner = Arc::clone(&barrier);
            let handle = std::thread::spawn(move || partner.wait(Some(Duration::from_secs(5))));

            let released = barrier.wait(Some(Duration::from_secs(5)));
            crate::assert_with_log!(released, "round completed", true, released);
            let partner_released = handle.join().expect("thread failed");
            crate::assert_with_log!(partner_released, "partner released", true, partner_released);
        }
        crate::test_complete!("barrier_is_reusable_for_a_second_round");
    }

    #[test]
    fn barrier_single_party_completes_immediately() {
        init_test("barrier_single_party_completes_immediately");
        let barrier = Barrier::new(1);
        for _ in 0..3 {
            let released = barrier.wait(Some(Duration::from_millis(1)));
            crate::assert_with_log!(released, "single party round", true, released);
        }
        crate::test_complete!("barrier_single_party_completes_immediately");
    }

    #[test]
    fn barrier_wait_times_out_without_full_round() {
        init_test("barrier_wait_times_out_without_full_round");
        let barrier = Barrier::new(2);
        let released = barrier.wait(Some(Duration::from_millis(30)));
        crate::assert_with_log!(!released, "timed out", false, released);
        crate::test_complete!("barrier_wait_times_out_without_full_round");
    }

    #[test]
    fn barrier_timed_out_arrival_still_counts() {
        init_test("barrier_timed_out_arrival_still_counts");
        let barrier = Arc::new(Barrier::new(2));

        // First arrival gives up waiting, but its arrival is not withdrawn.
        let released = barrier.wait(Some(Duration::from_millis(20)));
        crate::assert_with_log!(!released, "first arrival timed out", false, released);

        // A single further arrival completes the round.
        let released = barrier.wait(Some(Duration::from_secs(1)));
        crate::assert_with_log!(released, "round tripped by second arrival", true, released);
        crate::test_complete!("barrier_timed_out_arrival_still_counts");
    }

    #[test]
    fn barrier_parties_accessor() {
        init_test("barrier_parties_accessor");
        let barrier = Barrier::new(7);
        let parties = barrier.parties();
        crate::assert_with_log!(parties == 7, "parties", 7usize, parties);
        crate::test_complete!("barrier_parties_accessor");
    }

    #[test]
    #[should_panic(expected = "barrier requires at least 1 party")]
    fn barrier_zero_parties_panics() {
        let _ = Barrier::new(0);
    }
}
