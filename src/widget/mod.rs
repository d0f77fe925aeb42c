//! Embedding lifecycle: frame construction, load racing, message routing
//! and instance bookkeeping.

mod error;
mod frame;
mod lifecycle;
mod loader;
mod protocol;
mod race;
mod registry;
mod router;

pub use error::WidgetError;
pub use frame::{build_frame, frame_url, MIN_HEIGHT};
pub use lifecycle::{Widget, WidgetConfig, FALLBACK_MESSAGE};
pub use loader::{
    FrameLoad, FrameLoader, FrameRequest, FrameSignal, FrameSignalSender, HttpFrameLoader,
    ManualFrameLoader,
};
pub use protocol::{
    parse_message, Envelope, ProtocolError, RemoteErrorPayload, ResizePayload, WidgetMessage,
};
pub use race::race_load;
pub use registry::{InstanceRegistry, WidgetInstance};
pub use router::{RouteOutcome, ACTION_EVENT, READY_EVENT};
