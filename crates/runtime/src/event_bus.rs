use std::collections::VecDeque;

/// A recorded event with its position in the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<E> {
    /// Monotonic, never reused.
    pub sequence: u64,
    pub payload: E,
}

/// Events kept when no explicit retention is given.
pub const DEFAULT_EVENT_RETENTION: usize = 1024;

/// Ordered event log that subscribers read by sequence cursor.
///
/// Emitting never blocks or calls back into subscribers; readers poll with
/// [`EventBus::since`] (keeping their own cursor) or take everything with
/// [`EventBus::drain`]. At most `retention` events are kept; older ones are
/// dropped on emit, so a reader that falls behind sees a gap in `sequence`.
#[derive(Debug)]
pub struct EventBus<E> {
    next_sequence: u64,
    retention: usize,
    events: VecDeque<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::with_retention(DEFAULT_EVENT_RETENTION)
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus keeping the newest `retention` events (at least one).
    pub fn with_retention(retention: usize) -> Self {
        Self {
            next_sequence: 0,
            retention: retention.max(1),
            events: VecDeque::new(),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn emit(&mut self, payload: E) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.events.len() == self.retention {
            self.events.pop_front();
        }
        self.events.push_back(Event { sequence, payload });
        sequence
    }

    pub fn events(&self) -> impl ExactSizeIterator<Item = &Event<E>> + '_ {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sequence number the next emitted event will get.
    pub fn cursor(&self) -> u64 {
        self.next_sequence
    }

    /// Events with `sequence >= cursor` that are still retained.
    pub fn since(&self, cursor: u64) -> impl Iterator<Item = &Event<E>> + '_ {
        let start = self.events.partition_point(|e| e.sequence < cursor);
        self.events.range(start..)
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_EVENT_RETENTION, EventBus};

    #[test]
    fn records_events_in_sequence() {
        let mut bus = EventBus::new();
        assert_eq!(bus.emit("a"), 0);
        assert_eq!(bus.emit("b"), 1);
        let payloads: Vec<_> = bus.events().map(|e| e.payload).collect();
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[test]
    fn since_reads_from_cursor() {
        let mut bus = EventBus::new();
        bus.emit(1);
        let cursor = bus.cursor();
        bus.emit(2);
        bus.emit(3);
        let seen: Vec<_> = bus.since(cursor).map(|e| e.payload).collect();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn drain_clears_events_but_keeps_sequence() {
        let mut bus = EventBus::new();
        bus.emit("k");
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.is_empty());
        assert_eq!(bus.emit("m"), 1);
    }

    #[test]
    fn retention_drops_oldest_events() {
        let mut bus = EventBus::with_retention(3);
        for i in 0..10 {
            bus.emit(i);
        }
        assert_eq!(bus.len(), 3);
        let kept: Vec<_> = bus.events().map(|e| (e.sequence, e.payload)).collect();
        assert_eq!(kept, vec![(7, 7), (8, 8), (9, 9)]);
        let seen: Vec<_> = bus.since(2).map(|e| e.sequence).collect();
        assert_eq!(seen, vec![7, 8, 9]);
        assert_eq!(bus.cursor(), 10);
    }

    #[test]
    fn default_bus_is_bounded() {
        let mut bus = EventBus::new();
        for i in 0..(DEFAULT_EVENT_RETENTION + 10) {
            bus.emit(i);
        }
        assert_eq!(bus.len(), DEFAULT_EVENT_RETENTION);
        assert_eq!(bus.events().next().map(|e| e.sequence), Some(10));
    }
}
