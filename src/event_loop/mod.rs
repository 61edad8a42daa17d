//! Event Loop Implementation
//!
//! Microtask and timer queues for the interpreter. The loop only stores
//! work; the interpreter dequeues jobs and runs them, so no borrow of the
//! loop is held while learner code executes.
//!
//! Timers run in virtual time: a timer due at `now + delay` fires when the
//! interpreter advances the clock to it, without sleeping. This keeps test
//! runs fast and deterministic while preserving callback order.

use crate::runtime::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared handle to a promise's internal state
pub type PromiseRef = Rc<RefCell<PromiseInternal>>;

/// Internal promise state
#[derive(Debug, Clone)]
pub struct PromiseInternal {
    /// Current state of the promise
    pub state: PromiseInternalState,
    /// The settled value (fulfillment value or rejection reason)
    pub result: Value,
    /// Reactions waiting for this promise to settle
    pub reactions: Vec<PromiseReaction>,
    /// Whether a rejection handler has been attached
    pub handled: bool,
}

impl PromiseInternal {
    pub fn is_pending(&self) -> bool {
        self.state == PromiseInternalState::Pending
    }
}

/// Promise state enum
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseInternalState {
    /// Promise is pending - not yet settled
    Pending,
    /// Promise is fulfilled with a value
    Fulfilled,
    /// Promise is rejected with a reason
    Rejected,
}

/// A Promise reaction (then/catch/finally callback)
#[derive(Debug, Clone)]
pub struct PromiseReaction {
    /// Which settlement this reaction handles
    pub reaction_type: PromiseReactionType,
    /// The callback to execute; `None` passes the value through
    pub handler: Option<Value>,
    /// The promise returned by `then`, settled with the handler's outcome
    pub derived: Option<PromiseRef>,
}

/// Type of promise reaction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseReactionType {
    Fulfill,
    Reject,
}

/// A unit of work for the microtask queue
#[derive(Debug, Clone)]
pub enum Microtask {
    /// Run a promise reaction with the settled value
    Reaction {
        reaction: PromiseReaction,
        argument: Value,
    },
    /// Adopt the state of a thenable by calling its `then`
    ResolveThenable {
        promise: PromiseRef,
        thenable: Value,
        then: Value,
    },
}

/// A pending `setTimeout` callback
#[derive(Debug, Clone)]
pub struct Timer {
    /// Id returned to learner code
    pub id: u64,
    /// The callback function to execute
    pub callback: Value,
    /// Arguments to pass to the callback
    pub args: Vec<Value>,
    /// When the timer fires (virtual time in ms)
    pub fire_at: u64,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default)]
pub struct EventLoopStats {
    /// Total microtasks processed
    pub total_microtasks: u64,
    /// Total timers fired
    pub total_timers: u64,
    /// Total promises created
    pub total_promises_created: u64,
}

/// The event loop manages task queues and virtual time
#[derive(Default)]
pub struct EventLoop {
    microtask_queue: VecDeque<Microtask>,
    /// Kept in scheduling order; the earliest `fire_at` wins, ties by order
    timers: Vec<Timer>,
    virtual_time: u64,
    next_timer_id: u64,
    stats: EventLoopStats,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Self {
        Self {
            next_timer_id: 1,
            ..Self::default()
        }
    }

    /// Get the current virtual time in milliseconds
    pub fn current_time(&self) -> u64 {
        self.virtual_time
    }

    /// Enqueue a microtask
    pub fn enqueue_microtask(&mut self, task: Microtask) {
        self.microtask_queue.push_back(task);
    }

    /// Dequeue the next microtask
    pub fn dequeue_microtask(&mut self) -> Option<Microtask> {
        let task = self.microtask_queue.pop_front();
        if task.is_some() {
            self.stats.total_microtasks += 1;
        }
        task
    }

    pub fn has_pending_microtasks(&self) -> bool {
        !self.microtask_queue.is_empty()
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Schedule a timer `delay` virtual milliseconds from now
    pub fn schedule_timer(&mut self, callback: Value, args: Vec<Value>, delay: u64) -> u64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(Timer {
            id,
            callback,
            args,
            fire_at: self.virtual_time.saturating_add(delay),
        });
        id
    }

    /// Cancel a timer; unknown ids are ignored
    pub fn cancel_timer(&mut self, id: u64) {
        self.timers.retain(|t| t.id != id);
    }

    /// Virtual time of the next timer, if any
    pub fn next_timer_time(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.fire_at).min()
    }

    /// Remove the earliest timer due at or before `limit`, advancing the
    /// virtual clock to its firing time.
    pub fn pop_timer_due_by(&mut self, limit: u64) -> Option<Timer> {
        let (index, fire_at) = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(i, t)| (t.fire_at, *i))
            .map(|(i, t)| (i, t.fire_at))?;
        if fire_at > limit {
            return None;
        }
        self.virtual_time = self.virtual_time.max(fire_at);
        self.stats.total_timers += 1;
        Some(self.timers.remove(index))
    }

    /// Drop all queued work. Used when a timed-out test is abandoned.
    pub fn clear(&mut self) {
        self.microtask_queue.clear();
        self.timers.clear();
    }

    /// Create a pending promise
    pub fn create_promise(&mut self) -> PromiseRef {
        self.stats.total_promises_created += 1;
        Rc::new(RefCell::new(PromiseInternal {
            state: PromiseInternalState::Pending,
            result: Value::Undefined,
            reactions: Vec::new(),
            handled: false,
        }))
    }

    /// Fulfill a pending promise and queue its fulfill reactions
    pub fn fulfill_promise(&mut self, promise: &PromiseRef, value: Value) {
        self.settle(promise, PromiseInternalState::Fulfilled, value);
    }

    /// Reject a pending promise and queue its reject reactions
    pub fn reject_promise(&mut self, promise: &PromiseRef, reason: Value) {
        self.settle(promise, PromiseInternalState::Rejected, reason);
    }

    fn settle(&mut self, promise: &PromiseRef, state: PromiseInternalState, value: Value) {
        let reactions = {
            let mut p = promise.borrow_mut();
            if !p.is_pending() {
                return;
            }
            p.state = state;
            p.result = value.clone();
            std::mem::take(&mut p.reactions)
        };
        let wanted = match state {
            PromiseInternalState::Rejected => PromiseReactionType::Reject,
            _ => PromiseReactionType::Fulfill,
        };
        for reaction in reactions.into_iter().filter(|r| r.reaction_type == wanted) {
            self.enqueue_microtask(Microtask::Reaction {
                reaction,
                argument: value.clone(),
            });
        }
    }

    /// Register fulfill/reject handlers. If the promise already settled the
    /// matching reaction is queued immediately.
    pub fn add_promise_reactions(
        &mut self,
        promise: &PromiseRef,
        on_fulfilled: Option<Value>,
        on_rejected: Option<Value>,
        derived: Option<PromiseRef>,
    ) {
        let fulfill = PromiseReaction {
            reaction_type: PromiseReactionType::Fulfill,
            handler: on_fulfilled,
            derived: derived.clone(),
        };
        let reject = PromiseReaction {
            reaction_type: PromiseReactionType::Reject,
            handler: on_rejected,
            derived,
        };

        let (state, result) = {
            let mut p = promise.borrow_mut();
            p.handled = true;
            (p.state, p.result.clone())
        };
        match state {
            PromiseInternalState::Pending => {
                let mut p = promise.borrow_mut();
                p.reactions.push(fulfill);
                p.reactions.push(reject);
            }
            PromiseInternalState::Fulfilled => self.enqueue_microtask(Microtask::Reaction {
                reaction: fulfill,
                argument: result,
            }),
            PromiseInternalState::Rejected => self.enqueue_microtask(Microtask::Reaction {
                reaction: reject,
                argument: result,
            }),
        }
    }

    /// Get event loop statistics
    pub fn stats(&self) -> EventLoopStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_virtual_time_order() {
        let mut event_loop = EventLoop::new();
        let late = event_loop.schedule_timer(Value::Undefined, vec![], 100);
        let early = event_loop.schedule_timer(Value::Undefined, vec![], 10);
        let tie = event_loop.schedule_timer(Value::Undefined, vec![], 10);

        assert_eq!(event_loop.next_timer_time(), Some(10));
        assert_eq!(event_loop.pop_timer_due_by(1000).map(|t| t.id), Some(early));
        assert_eq!(event_loop.pop_timer_due_by(1000).map(|t| t.id), Some(tie));
        assert_eq!(event_loop.current_time(), 10);
        assert!(event_loop.pop_timer_due_by(50).is_none());
        assert_eq!(event_loop.pop_timer_due_by(1000).map(|t| t.id), Some(late));
        assert_eq!(event_loop.current_time(), 100);
    }

    #[test]
    fn test_cancel_timer() {
        let mut event_loop = EventLoop::new();
        let id = event_loop.schedule_timer(Value::Undefined, vec![], 5);
        event_loop.cancel_timer(id);
        assert!(!event_loop.has_pending_timers());
    }

    #[test]
    fn test_settle_queues_matching_reactions_once() {
        let mut event_loop = EventLoop::new();
        let promise = event_loop.create_promise();
        event_loop.add_promise_reactions(&promise, None, None, None);
        event_loop.reject_promise(&promise, Value::Number(1.0));
        event_loop.fulfill_promise(&promise, Value::Number(2.0));

        let task = event_loop.dequeue_microtask();
        assert!(matches!(
            task,
            Some(Microtask::Reaction { reaction, .. })
                if reaction.reaction_type == PromiseReactionType::Reject
        ));
        assert!(event_loop.dequeue_microtask().is_none());
        assert_eq!(promise.borrow().state, PromiseInternalState::Rejected);
    }

    #[test]
    fn test_reactions_on_settled_promise_are_queued() {
        let mut event_loop = EventLoop::new();
        let promise = event_loop.create_promise();
        event_loop.fulfill_promise(&promise, Value::Number(1.0));
        event_loop.add_promise_reactions(&promise, None, None, None);
        assert!(event_loop.has_pending_microtasks());
    }
}
