use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Keyboard keys the picking tools react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other(String),
}

/// Raw input arriving at the rendering canvas. Pixel coordinates are
/// relative to the canvas, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    /// Right click.
    ContextMenu { x: f64, y: f64 },
    /// A click that landed outside the canvas.
    OutsideClick,
    KeyDown(Key),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Crosshair,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct Listeners {
    next_id: u64,
    cursor: CursorStyle,
    attached: Vec<(ListenerId, mpsc::UnboundedSender<InputEvent>)>,
}

/// The canvas as seen by the picking tools: a cursor style and a set of
/// attached event listeners.
#[derive(Debug, Default)]
pub struct InputSurface {
    inner: Mutex<Listeners>,
}

impl InputSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> CursorStyle {
        self.inner.lock().cursor
    }

    pub fn set_cursor(&self, cursor: CursorStyle) {
        self.inner.lock().cursor = cursor;
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().attached.len()
    }

    /// Attaches a listener receiving every subsequent event.
    pub fn listen(&self) -> (ListenerId, mpsc::UnboundedReceiver<InputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.attached.push((id, tx));
        (id, rx)
    }

    /// Detaches a listener. Returns `false` if it was already gone.
    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.attached.len();
        inner.attached.retain(|(l, _)| *l != id);
        inner.attached.len() != before
    }

    /// Delivers `event` to every listener. Returns how many received it.
    pub fn dispatch(&self, event: InputEvent) -> usize {
        let mut inner = self.inner.lock();
        inner
            .attached
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        inner.attached.len()
    }

    /// Detaches every listener, e.g. when the canvas goes away.
    pub fn close(&self) {
        self.inner.lock().attached.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reaches_listeners_until_detached() {
        let surface = InputSurface::new();
        let (id, mut rx) = surface.listen();
        assert_eq!(surface.listener_count(), 1);

        assert_eq!(surface.dispatch(InputEvent::KeyDown(Key::Enter)), 1);
        assert_eq!(rx.recv().await, Some(InputEvent::KeyDown(Key::Enter)));

        assert!(surface.unlisten(id));
        assert!(!surface.unlisten(id));
        assert_eq!(surface.dispatch(InputEvent::OutsideClick), 0);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_dispatch() {
        let surface = InputSurface::new();
        let (_, rx) = surface.listen();
        drop(rx);
        assert_eq!(surface.dispatch(InputEvent::OutsideClick), 0);
        assert_eq!(surface.listener_count(), 0);
    }

    #[test]
    fn cursor_round_trips() {
        let surface = InputSurface::new();
        assert_eq!(surface.cursor(), CursorStyle::Default);
        surface.set_cursor(CursorStyle::Crosshair);
        assert_eq!(surface.cursor(), CursorStyle::Crosshair);
    }
}
