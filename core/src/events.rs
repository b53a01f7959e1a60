//! Callbacks scheduled to run once a given frame count has been reached.

use log::debug;

/// A callback that fires once the session's frame count reaches `trigger`.
pub struct FrameEvent {
    pub trigger: u64,
    callback: Box<dyn FnOnce()>,
}

impl FrameEvent {
    pub fn new(trigger: u64, callback: impl FnOnce() + 'static) -> Self {
        Self {
            trigger,
            callback: Box::new(callback),
        }
    }
}

/// Pending frame events in registration order.
#[derive(Default)]
pub struct FrameEventQueue {
    pending: Vec<FrameEvent>,
}

impl FrameEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FrameEvent) {
        self.pending.push(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Trigger frames of the events still waiting, in registration order.
    pub fn triggers(&self) -> Vec<u64> {
        self.pending.iter().map(|e| e.trigger).collect()
    }

    /// Fire every event with `frame_count >= trigger`, in registration order.
    /// Events not yet due keep their relative order. Returns the number fired.
    pub fn process(&mut self, frame_count: u64) -> usize {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|event| frame_count >= event.trigger);
        self.pending = waiting;

        let fired = due.len();
        for event in due {
            debug!("frame {frame_count}: firing event scheduled for {}", event.trigger);
            (event.callback)();
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> FrameEventFn) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        (log, move |name: &'static str| -> FrameEventFn {
            let log = Rc::clone(&log2);
            Box::new(move || log.borrow_mut().push(name))
        })
    }

    type FrameEventFn = Box<dyn FnOnce()>;

    #[test]
    fn due_events_fire_in_registration_order() {
        let (log, make) = recorder();
        let mut queue = FrameEventQueue::new();
        queue.push(FrameEvent::new(5, make("first")));
        queue.push(FrameEvent::new(5, make("second")));
        queue.push(FrameEvent::new(8, make("later")));

        assert_eq!(queue.process(6), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(queue.triggers(), vec![8]);
    }

    #[test]
    fn waiting_events_keep_relative_order() {
        let (log, make) = recorder();
        let mut queue = FrameEventQueue::new();
        queue.push(FrameEvent::new(9, make("a")));
        queue.push(FrameEvent::new(2, make("b")));
        queue.push(FrameEvent::new(7, make("c")));

        queue.process(3);
        assert_eq!(queue.triggers(), vec![9, 7]);
        queue.process(10);
        assert_eq!(*log.borrow(), vec!["b", "a", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn events_fire_at_most_once() {
        let (log, make) = recorder();
        let mut queue = FrameEventQueue::new();
        queue.push(FrameEvent::new(1, make("once")));
        queue.process(1);
        queue.process(2);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn nothing_fires_before_trigger() {
        let (log, make) = recorder();
        let mut queue = FrameEventQueue::new();
        queue.push(FrameEvent::new(4, make("x")));
        assert_eq!(queue.process(3), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(queue.len(), 1);
    }
}
