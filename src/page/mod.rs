mod document;
mod style;
mod window;

pub use document::{HostEvent, HostPage, NodeHandle, PageError};
pub use style::InlineStyle;
pub use window::{HostWindow, MessageEvent, MessageListener};
