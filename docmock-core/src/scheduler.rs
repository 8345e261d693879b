//! Deterministic scheduling of deferred operations.
//!
//! A [`FlushQueue`] holds operations in FIFO order until they are flushed. Time
//! never advances on its own: delayed flushes are armed on a virtual clock that
//! only moves when [`FlushQueue::advance`] is called, which keeps every
//! interleaving under the control of the test driving the queue.
//!
//! # Example
//!
//! ```ignore
//! use std::{cell::Cell, rc::Rc, time::Duration};
//! use docmock_core::scheduler::FlushQueue;
//!
//! let queue = FlushQueue::new();
//! let ran = Rc::new(Cell::new(false));
//! let flag = ran.clone();
//!
//! queue.push(move || flag.set(true), "get");
//! queue.flush(Some(Duration::from_millis(10)));
//! assert!(!ran.get());
//!
//! queue.advance(Duration::from_millis(10));
//! assert!(ran.get());
//! ```

use std::{cell::RefCell, collections::VecDeque, fmt, time::Duration};

use tracing::debug;

/// Auto-flush setting of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushDelay {
    /// Deferred operations wait for an explicit flush.
    #[default]
    Disabled,
    /// Every deferred operation is flushed as soon as it is queued.
    Immediate,
    /// Every deferred operation arms a flush after the given virtual delay.
    After(Duration),
}

impl FlushDelay {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FlushDelay::Disabled)
    }

    /// Returns the delay to pass to [`FlushQueue::flush`], or `None` when disabled.
    pub fn flush_delay(&self) -> Option<Option<Duration>> {
        match self {
            FlushDelay::Disabled => None,
            FlushDelay::Immediate => Some(None),
            FlushDelay::After(delay) => Some(Some(*delay)),
        }
    }
}

impl From<bool> for FlushDelay {
    fn from(enabled: bool) -> Self {
        if enabled { FlushDelay::Immediate } else { FlushDelay::Disabled }
    }
}

impl From<Duration> for FlushDelay {
    fn from(delay: Duration) -> Self {
        FlushDelay::After(delay)
    }
}

type Callback = Box<dyn FnOnce()>;

struct Event<M> {
    callback: Callback,
    metadata: M,
}

struct QueueState<M> {
    events: VecDeque<Event<M>>,
    now: Duration,
    timers: Vec<Duration>,
    draining: bool,
}

/// FIFO queue of deferred operations shared by every node of a tree.
///
/// `M` is the metadata recorded with each operation and returned by
/// [`FlushQueue::events`] for inspection.
pub struct FlushQueue<M> {
    state: RefCell<QueueState<M>>,
}

impl<M> FlushQueue<M> {
    /// Creates an empty queue with its virtual clock at zero.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(QueueState {
                events: VecDeque::new(),
                now: Duration::ZERO,
                timers: Vec::new(),
                draining: false,
            }),
        }
    }

    /// Queues an operation behind every operation already pending.
    pub fn push(&self, callback: impl FnOnce() + 'static, metadata: M) {
        self.state
            .borrow_mut()
            .events
            .push_back(Event { callback: Box::new(callback), metadata });
    }

    /// Flushes pending operations now, or arms a flush after `delay` on the
    /// virtual clock.
    ///
    /// Returns the number of operations executed by this call.
    pub fn flush(&self, delay: Option<Duration>) -> usize {
        match delay {
            Some(delay) if !delay.is_zero() => {
                let mut state = self.state.borrow_mut();
                let due = state.now + delay;
                state.timers.push(due);
                debug!(due_ms = due.as_millis() as u64, "armed delayed flush");
                0
            }
            _ => self.drain(),
        }
    }

    /// Moves the virtual clock forward and runs every armed flush that became due.
    ///
    /// Returns the number of operations executed.
    pub fn advance(&self, by: Duration) -> usize {
        let fired = {
            let mut state = self.state.borrow_mut();
            state.now += by;
            let now = state.now;
            let before = state.timers.len();
            state.timers.retain(|due| *due > now);
            before - state.timers.len()
        };

        if fired == 0 {
            return 0;
        }

        self.drain()
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Returns the number of delayed flushes that have not fired yet.
    pub fn armed_flushes(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs pending operations one at a time until the queue is empty.
    ///
    /// Operations queued by a running callback are executed by the same drain.
    /// A drain requested from inside a callback returns immediately.
    fn drain(&self) -> usize {
        {
            let mut state = self.state.borrow_mut();
            if state.draining {
                return 0;
            }
            state.draining = true;
        }

        let _guard = DrainGuard { state: &self.state };
        let mut executed = 0;

        loop {
            let next = self.state.borrow_mut().events.pop_front();
            match next {
                Some(event) => {
                    (event.callback)();
                    executed += 1;
                }
                None => break,
            }
        }

        debug!(executed, "flushed deferred operations");
        executed
    }
}

impl<M: Clone> FlushQueue<M> {
    /// Returns the metadata of every pending operation, oldest first.
    pub fn events(&self) -> Vec<M> {
        self.state
            .borrow()
            .events
            .iter()
            .map(|event| event.metadata.clone())
            .collect()
    }
}

impl<M> Default for FlushQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for FlushQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FlushQueue")
            .field("pending", &state.events.len())
            .field("now", &state.now)
            .field("armed_flushes", &state.timers.len())
            .finish()
    }
}

struct DrainGuard<'a, M> {
    state: &'a RefCell<QueueState<M>>,
}

impl<M> Drop for DrainGuard<'_, M> {
    fn drop(&mut self) {
        self.state.borrow_mut().draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, FlushQueue<&'static str>) {
        (Rc::new(RefCell::new(Vec::new())), FlushQueue::new())
    }

    #[test]
    fn runs_operations_in_fifo_order() {
        let (log, queue) = recorder();
        for name in ["first", "second", "third"] {
            let log = log.clone();
            queue.push(move || log.borrow_mut().push(name), name);
        }

        assert_eq!(queue.events(), vec!["first", "second", "third"]);
        assert!(log.borrow().is_empty());

        assert_eq!(queue.flush(None), 3);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn delayed_flush_waits_for_virtual_clock() {
        let (log, queue) = recorder();
        let entry = log.clone();
        queue.push(move || entry.borrow_mut().push("get"), "get");

        assert_eq!(queue.flush(Some(Duration::from_millis(50))), 0);
        assert_eq!(queue.armed_flushes(), 1);

        assert_eq!(queue.advance(Duration::from_millis(49)), 0);
        assert!(log.borrow().is_empty());

        assert_eq!(queue.advance(Duration::from_millis(1)), 1);
        assert_eq!(*log.borrow(), vec!["get"]);
        assert_eq!(queue.armed_flushes(), 0);
        assert_eq!(queue.now(), Duration::from_millis(50));
    }

    #[test]
    fn zero_delay_flushes_immediately() {
        let (log, queue) = recorder();
        let entry = log.clone();
        queue.push(move || entry.borrow_mut().push("get"), "get");

        assert_eq!(queue.flush(Some(Duration::ZERO)), 1);
        assert_eq!(*log.borrow(), vec!["get"]);
    }

    #[test]
    fn operations_queued_during_a_flush_run_in_the_same_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let queue = Rc::new(FlushQueue::new());

        let outer_log = log.clone();
        let outer_queue = queue.clone();
        queue.push(
            move || {
                outer_log.borrow_mut().push("outer");
                let inner_log = outer_log.clone();
                outer_queue.push(move || inner_log.borrow_mut().push("inner"), "inner");
                assert_eq!(outer_queue.flush(None), 0);
            },
            "outer",
        );

        assert_eq!(queue.flush(None), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn flush_delay_conversions() {
        assert_eq!(FlushDelay::from(true), FlushDelay::Immediate);
        assert_eq!(FlushDelay::from(false), FlushDelay::Disabled);
        assert_eq!(
            FlushDelay::from(Duration::from_millis(5)),
            FlushDelay::After(Duration::from_millis(5))
        );
        assert_eq!(FlushDelay::Disabled.flush_delay(), None);
        assert_eq!(FlushDelay::Immediate.flush_delay(), Some(None));
        assert!(!FlushDelay::default().is_enabled());
    }
}
