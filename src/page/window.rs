use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use super::document::NodeHandle;

/// A cross-document message delivered to the host window.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Serialized origin of the sender, e.g. `https://widgets.example`.
    pub origin: String,
    /// Frame element the message was posted from, when the host can tell.
    pub source: Option<NodeHandle>,
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source: None,
            data,
        }
    }

    pub fn from_frame(mut self, frame: NodeHandle) -> Self {
        self.source = Some(frame);
        self
    }
}

pub type MessageListener = Rc<dyn Fn(&MessageEvent)>;

/// The host window's `message` channel.
#[derive(Default)]
pub struct HostWindow {
    listeners: RefCell<Vec<MessageListener>>,
}

impl HostWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners stay attached for the life of the window.
    pub fn add_message_listener(&self, listener: MessageListener) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver `event` to every listener in registration order.
    pub fn post_message(&self, event: MessageEvent) {
        // Snapshot so listeners may register listeners while running.
        let listeners: Vec<MessageListener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&event);
        }
    }
}
