// Library exports for embedding hosts and tests

pub mod config;
pub mod page;
pub mod widget;

// Re-export commonly used types
pub use config::WidgetSettings;
pub use page::{HostPage, HostWindow, MessageEvent};
pub use widget::{HttpFrameLoader, Widget, WidgetConfig, WidgetError};
