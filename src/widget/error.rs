use std::time::Duration;

use thiserror::Error;

use crate::page::PageError;

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("required parameter `{0}` is missing")]
    InvalidConfig(&'static str),
    #[error("target element \"{0}\" not found")]
    TargetNotFound(String),
    #[error("failed to load widget: {0}")]
    LoadFailed(String),
    #[error("widget loading timed out after {}ms", .0.as_millis())]
    LoadTimeout(Duration),
    #[error("widget reported error: {0}")]
    RemoteError(String),
    #[error("host page is busy")]
    PageBusy,
    #[error(transparent)]
    Page(#[from] PageError),
}
