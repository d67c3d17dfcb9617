use crate::frame::Frame;

/// An event stamped with the frame it was raised in.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<E> {
    pub frame_index: u64,
    pub event: E,
}

/// Append-only queue of typed events, drained by the host once per frame.
#[derive(Debug)]
pub struct EventBus<E> {
    events: Vec<Stamped<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, frame: Frame, event: E) {
        self.events.push(Stamped {
            frame_index: frame.index,
            event,
        });
    }

    pub fn events(&self) -> &[Stamped<E>] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Stamped<E>> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use crate::frame::Frame;

    #[derive(Debug, Clone, PartialEq)]
    enum Ui {
        Hover(u32),
        Clear,
    }

    #[test]
    fn records_events_with_frame_index() {
        let mut bus = EventBus::new();
        bus.emit(Frame::fixed(2, 0.1), Ui::Hover(7));
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].frame_index, 2);
        assert_eq!(bus.events()[0].event, Ui::Hover(7));
    }

    #[test]
    fn drain_clears_events_in_order() {
        let mut bus = EventBus::new();
        bus.emit(Frame::fixed(0, 1.0), Ui::Hover(1));
        bus.emit(Frame::fixed(1, 1.0), Ui::Clear);
        let drained: Vec<Ui> = bus.drain().into_iter().map(|s| s.event).collect();
        assert_eq!(drained, vec![Ui::Hover(1), Ui::Clear]);
        assert!(bus.is_empty());
    }
}
