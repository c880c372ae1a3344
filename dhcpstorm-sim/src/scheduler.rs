//! Virtual-clock discrete-event scheduler
//!
//! Events run as non-preemptible callbacks strictly ordered by simulated
//! time; two events due at the same instant fire in registration order.
//! Handlers receive `&mut Scheduler` and may schedule or cancel further
//! events freely, since an entry is detached from the queue before its
//! callback runs.

use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

type Action = Box<dyn FnOnce(&mut Scheduler)>;

struct Entry {
    at: Duration,
    seq: u64,
    cancelled: Rc<Cell<bool>>,
    action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Cancellation handle for a scheduled event.
///
/// Cancelling is idempotent and takes effect even at the instant the
/// event was due, as long as the cancelling callback runs first.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    /// Prevent the event from firing.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// The event queue and the simulated clock.
pub struct Scheduler {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

impl Scheduler {
    /// Create a scheduler with the clock at zero.
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `f` to run `delay` after the current instant.
    pub fn schedule_in<F>(&mut self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let at = self.now + delay;
        self.push(at, Box::new(f))
    }

    /// Schedule `f` at an absolute instant. A deadline already in the
    /// past is clamped to the current instant.
    pub fn schedule_at<F>(&mut self, deadline: Duration, f: F) -> TimerHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let at = deadline.max(self.now);
        self.push(at, Box::new(f))
    }

    fn push(&mut self, at: Duration, action: Action) -> TimerHandle {
        let cancelled = Rc::new(Cell::new(false));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry {
            at,
            seq,
            cancelled: Rc::clone(&cancelled),
            action,
        }));
        TimerHandle { cancelled }
    }

    /// Number of queued events that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(e)| !e.cancelled.get())
            .count()
    }

    /// Run every event due at or before `deadline`, then leave the clock
    /// at exactly `deadline`.
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some(entry) = self.pop_due(deadline) {
            if entry.cancelled.get() {
                continue;
            }
            self.now = entry.at;
            trace!(at = ?entry.at, seq = entry.seq, "dispatch");
            (entry.action)(self);
        }
        self.now = self.now.max(deadline);
    }

    /// Drain the queue completely; the clock ends at the last event.
    pub fn run(&mut self) {
        while let Some(Reverse(entry)) = self.queue.pop() {
            if entry.cancelled.get() {
                continue;
            }
            self.now = entry.at;
            trace!(at = ?entry.at, seq = entry.seq, "dispatch");
            (entry.action)(self);
        }
    }

    fn pop_due(&mut self, deadline: Duration) -> Option<Entry> {
        match self.queue.peek() {
            Some(Reverse(entry)) if entry.at <= deadline => {
                self.queue.pop().map(|Reverse(entry)| entry)
            }
            _ => None,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn shared_log() -> Rc<RefCell<Vec<u32>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        for (delay, tag) in [(30, 3), (10, 1), (20, 2)] {
            let log = Rc::clone(&log);
            sched.schedule_in(Duration::from_millis(delay), move |_| {
                log.borrow_mut().push(tag);
            });
        }

        sched.run();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_same_instant_fires_in_registration_order() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        for tag in 0..5 {
            let log = Rc::clone(&log);
            sched.schedule_in(Duration::from_secs(1), move |_| {
                log.borrow_mut().push(tag);
            });
        }

        sched.run();
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        let log2 = Rc::clone(&log);
        let handle = sched.schedule_in(Duration::from_secs(1), move |_| {
            log2.borrow_mut().push(99);
        });
        handle.cancel();
        assert!(handle.is_cancelled());

        sched.run();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_cancel_at_due_instant() {
        // The first event cancels the second, both due at the same time.
        let mut sched = Scheduler::new();
        let log = shared_log();

        let log2 = Rc::clone(&log);
        let victim_slot: Rc<RefCell<Option<TimerHandle>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&victim_slot);
        sched.schedule_in(Duration::from_secs(1), move |_| {
            if let Some(h) = slot.borrow().as_ref() {
                h.cancel();
            }
        });
        let victim = sched.schedule_in(Duration::from_secs(1), move |_| {
            log2.borrow_mut().push(1);
        });
        *victim_slot.borrow_mut() = Some(victim);

        sched.run();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_self_rescheduling_tick_has_no_drift() {
        fn tick(times: Rc<RefCell<Vec<Duration>>>, sched: &mut Scheduler) {
            times.borrow_mut().push(sched.now());
            if times.borrow().len() < 5 {
                let times = Rc::clone(&times);
                sched.schedule_in(Duration::from_secs(1), move |s| tick(times, s));
            }
        }

        let mut sched = Scheduler::new();
        let times = Rc::new(RefCell::new(Vec::new()));
        let t = Rc::clone(&times);
        sched.schedule_in(Duration::from_secs(1), move |s| tick(t, s));
        sched.run();

        let expected: Vec<Duration> = (1..=5).map(Duration::from_secs).collect();
        assert_eq!(*times.borrow(), expected);
    }

    #[test]
    fn test_run_until_clock_and_boundary() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        for delay in [1, 2, 3] {
            let log = Rc::clone(&log);
            sched.schedule_in(Duration::from_secs(delay), move |_| {
                log.borrow_mut().push(delay as u32);
            });
        }

        // An event due exactly at the deadline runs.
        sched.run_until(Duration::from_secs(2));
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(sched.now(), Duration::from_secs(2));

        // The clock never moves backwards.
        sched.run_until(Duration::from_secs(1));
        assert_eq!(sched.now(), Duration::from_secs(2));

        sched.run_until(Duration::from_secs(10));
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(sched.now(), Duration::from_secs(10));
    }

    #[test]
    fn test_schedule_at_past_clamps_to_now() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        sched.run_until(Duration::from_secs(5));
        let log2 = Rc::clone(&log);
        sched.schedule_at(Duration::from_secs(1), move |s| {
            log2.borrow_mut().push(s.now().as_secs() as u32);
        });

        sched.run();
        assert_eq!(*log.borrow(), vec![5]);
    }

    #[test]
    fn test_handler_can_schedule_more_events() {
        let mut sched = Scheduler::new();
        let log = shared_log();

        let log2 = Rc::clone(&log);
        sched.schedule_in(Duration::from_secs(1), move |s| {
            log2.borrow_mut().push(1);
            let log3 = Rc::clone(&log2);
            s.schedule_in(Duration::ZERO, move |_| {
                log3.borrow_mut().push(2);
            });
        });

        sched.run();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_pending_counts_non_cancelled() {
        let mut sched = Scheduler::new();
        let h1 = sched.schedule_in(Duration::from_secs(1), |_| {});
        let _h2 = sched.schedule_in(Duration::from_secs(2), |_| {});
        assert_eq!(sched.pending(), 2);

        h1.cancel();
        assert_eq!(sched.pending(), 1);
    }
}
