//! Broadcast bus
//!
//! One simulated LAN segment: every frame sent is delivered to every
//! attached tap except the sender's own, after the configured latency.
//! Delivery handlers run as ordinary scheduler events, outside any
//! internal borrow, so a tap may send on the same bus while handling a
//! delivery.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use crate::scheduler::Scheduler;

/// Identifies one attached receiver on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapId(u64);

type Tap<M> = Rc<dyn Fn(&mut Scheduler, M)>;

struct BusInner<M> {
    latency: Duration,
    next_tap: u64,
    taps: Vec<(TapId, Tap<M>)>,
}

/// Cheap cloneable handle to one shared segment.
pub struct Bus<M> {
    inner: Rc<RefCell<BusInner<M>>>,
}

impl<M> Clone for Bus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: Clone + 'static> Bus<M> {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                latency,
                next_tap: 0,
                taps: Vec::new(),
            })),
        }
    }

    /// Register a delivery callback; returns the id used to skip the
    /// sender on its own broadcasts and to detach later.
    pub fn attach<F>(&self, handler: F) -> TapId
    where
        F: Fn(&mut Scheduler, M) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = TapId(inner.next_tap);
        inner.next_tap += 1;
        inner.taps.push((id, Rc::new(handler)));
        id
    }

    /// Remove a tap; frames already in flight are still delivered.
    pub fn detach(&self, id: TapId) {
        self.inner.borrow_mut().taps.retain(|(tid, _)| *tid != id);
    }

    /// Number of attached taps.
    pub fn taps(&self) -> usize {
        self.inner.borrow().taps.len()
    }

    /// Broadcast `frame` to every tap except `src`. Actors that never
    /// receive (pure senders) pass `None`.
    pub fn send_from(&self, sched: &mut Scheduler, src: Option<TapId>, frame: M) {
        let (latency, receivers): (Duration, Vec<Tap<M>>) = {
            let inner = self.inner.borrow();
            let receivers = inner
                .taps
                .iter()
                .filter(|(id, _)| Some(*id) != src)
                .map(|(_, tap)| Rc::clone(tap))
                .collect();
            (inner.latency, receivers)
        };

        trace!(receivers = receivers.len(), "broadcast");
        for tap in receivers {
            let frame = frame.clone();
            sched.schedule_in(latency, move |s| tap(s, frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<(u32, Duration)>>>;

    fn recording_tap(bus: &Bus<u32>, log: &Log) -> TapId {
        let log = Rc::clone(log);
        bus.attach(move |sched, frame| {
            log.borrow_mut().push((frame, sched.now()));
        })
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let mut sched = Scheduler::new();
        let bus: Bus<u32> = Bus::new(Duration::ZERO);

        let a_log: Log = Rc::new(RefCell::new(Vec::new()));
        let b_log: Log = Rc::new(RefCell::new(Vec::new()));
        let a = recording_tap(&bus, &a_log);
        let _b = recording_tap(&bus, &b_log);

        bus.send_from(&mut sched, Some(a), 7);
        sched.run();

        assert!(a_log.borrow().is_empty());
        assert_eq!(b_log.borrow().as_slice(), &[(7, Duration::ZERO)]);
    }

    #[test]
    fn test_sender_without_tap_reaches_everyone() {
        let mut sched = Scheduler::new();
        let bus: Bus<u32> = Bus::new(Duration::ZERO);

        let a_log: Log = Rc::new(RefCell::new(Vec::new()));
        let b_log: Log = Rc::new(RefCell::new(Vec::new()));
        recording_tap(&bus, &a_log);
        recording_tap(&bus, &b_log);

        bus.send_from(&mut sched, None, 3);
        sched.run();

        assert_eq!(a_log.borrow().len(), 1);
        assert_eq!(b_log.borrow().len(), 1);
    }

    #[test]
    fn test_latency_is_applied() {
        let mut sched = Scheduler::new();
        let bus: Bus<u32> = Bus::new(Duration::from_millis(5));

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        recording_tap(&bus, &log);

        sched.run_until(Duration::from_millis(100));
        bus.send_from(&mut sched, None, 1);
        sched.run();

        assert_eq!(log.borrow().as_slice(), &[(1, Duration::from_millis(105))]);
    }

    #[test]
    fn test_detach_stops_delivery() {
        let mut sched = Scheduler::new();
        let bus: Bus<u32> = Bus::new(Duration::ZERO);

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let tap = recording_tap(&bus, &log);
        assert_eq!(bus.taps(), 1);

        bus.detach(tap);
        assert_eq!(bus.taps(), 0);

        bus.send_from(&mut sched, None, 9);
        sched.run();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_tap_can_send_while_handling() {
        let mut sched = Scheduler::new();
        let bus: Bus<u32> = Bus::new(Duration::ZERO);

        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let probe = recording_tap(&bus, &log);

        // Replies to any frame below 100 with frame + 100.
        let reply_bus = bus.clone();
        let responder = bus.attach(move |sched, frame: u32| {
            if frame < 100 {
                reply_bus.send_from(sched, None, frame + 100);
            }
        });
        let _ = responder;

        bus.send_from(&mut sched, Some(probe), 1);
        sched.run();

        assert_eq!(
            log.borrow().iter().map(|(f, _)| *f).collect::<Vec<_>>(),
            vec![101]
        );
    }
}
