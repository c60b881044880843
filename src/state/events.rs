//! Typed in-process publish/subscribe.
//!
//! Subscribers register for one event kind.
//! [`EventBus::emit`] calls every matching subscriber synchronously, in
//! registration order, before returning.

use std::fmt;

/// Events carried by an [`EventBus`] expose a small copyable kind tag.
pub trait BusEvent {
    type Kind: Copy + Eq + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber<E: BusEvent> {
    id: SubscriptionId,
    kind: E::Kind,
    callback: Box<dyn FnMut(&E)>,
}

pub struct EventBus<E: BusEvent> {
    subscribers: Vec<Subscriber<E>>,
    next_id: u64,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn subscribe(&mut self, kind: E::Kind, callback: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        let kind = event.kind();
        for sub in &mut self.subscribers {
            if sub.kind == kind {
                (sub.callback)(event);
            }
        }
    }

}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ping,
        Pong,
    }

    struct Event(Kind, u32);

    impl BusEvent for Event {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            self.0
        }
    }

    #[test]
    fn fans_out_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let l = log.clone();
        bus.subscribe(Kind::Ping, move |e: &Event| l.borrow_mut().push(("first", e.1)));
        let l = log.clone();
        bus.subscribe(Kind::Pong, move |e: &Event| l.borrow_mut().push(("pong", e.1)));
        let l = log.clone();
        bus.subscribe(Kind::Ping, move |e: &Event| l.borrow_mut().push(("second", e.1)));

        bus.emit(&Event(Kind::Ping, 1));
        bus.emit(&Event(Kind::Pong, 2));

        assert_eq!(*log.borrow(), vec![("first", 1), ("second", 1), ("pong", 2)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let c = count.clone();
        let id = bus.subscribe(Kind::Ping, move |_: &Event| *c.borrow_mut() += 1);

        bus.emit(&Event(Kind::Ping, 0));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&Event(Kind::Ping, 0));

        assert_eq!(*count.borrow(), 1);
    }
}
