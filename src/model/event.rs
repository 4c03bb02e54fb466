//! Span events: `{name, timeUnixMs, attributes}` plus the ordered bag that
//! holds them for the duration of a canonicalization pass.

use crate::model::attribute::AttributeMap;

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub time_unix_ms: i64,
    pub attributes: AttributeMap,
}

/// Mutable collection of events, insertion order preserved.
#[derive(Debug, Clone, Default)]
pub struct EventBag {
    events: Vec<Event>,
}

impl EventBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Remove and return every event matching `name`, in original order.
    pub fn take_all(&mut self, name: &str) -> Vec<Event> {
        let mut taken = Vec::new();
        let mut remaining = Vec::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if event.name == name {
                taken.push(event);
            } else {
                remaining.push(event);
            }
        }
        self.events = remaining;
        taken
    }

    pub fn remaining(&self) -> &[Event] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, t: i64) -> Event {
        Event {
            name: name.to_string(),
            time_unix_ms: t,
            attributes: AttributeMap::new(),
        }
    }

    #[test]
    fn take_all_removes_matching_events_preserving_order() {
        let mut bag = EventBag::new();
        bag.push(event("gen_ai.choice", 1));
        bag.push(event("other", 2));
        bag.push(event("gen_ai.choice", 3));

        let taken = bag.take_all("gen_ai.choice");
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].time_unix_ms, 1);
        assert_eq!(taken[1].time_unix_ms, 3);

        let remaining = bag.remaining();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "other");
    }
}
