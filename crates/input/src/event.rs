use crate::key::Key;
use std::collections::VecDeque;

/// A raw input event as delivered by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Absolute pointer position in physical pixels.
    PointerMoved { x: f32, y: f32 },
    /// Signed vertical scroll, in lines.
    Scroll { dy: f32 },
    /// The pointer left the window or was released; the next sample restarts
    /// delta tracking.
    PointerReleased,
    FocusLost,
    CloseRequested,
}

/// FIFO of input events collected between frames.
///
/// The window layer only pushes; the frame loop drains once per frame, so
/// no camera or GPU code runs from inside a window callback.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Remove and return every queued event in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut queue = InputQueue::new();
        queue.push(InputEvent::KeyDown(Key::W));
        queue.push(InputEvent::PointerMoved { x: 1.0, y: 2.0 });
        queue.push(InputEvent::Scroll { dy: -1.0 });
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(
            drained,
            vec![
                InputEvent::KeyDown(Key::W),
                InputEvent::PointerMoved { x: 1.0, y: 2.0 },
                InputEvent::Scroll { dy: -1.0 },
            ]
        );
        assert!(queue.is_empty());
    }
}
