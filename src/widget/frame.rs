use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::config::WidgetSettings;
use crate::page::{HostPage, InlineStyle, NodeHandle, PageError};

const WIDGET_PATH: &str = "request-quote-widget";

/// Layout space reserved for the widget before its content arrives.
pub const MIN_HEIGHT: &str = "40rem";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `<base>/request-quote-widget?widgetId=<enc>&salt=<enc>`
pub fn frame_url(base: &Url, widget_id: &str, salt: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(WIDGET_PATH);
    }
    let query = format!(
        "widgetId={}&salt={}",
        utf8_percent_encode(widget_id, COMPONENT),
        utf8_percent_encode(salt, COMPONENT)
    );
    url.set_query(Some(&query));
    url.set_fragment(None);
    url
}

fn sandbox(same_origin: bool) -> &'static str {
    if same_origin {
        "allow-scripts allow-same-origin allow-forms"
    } else {
        "allow-scripts allow-forms"
    }
}

fn frame_style() -> InlineStyle {
    InlineStyle::new()
        .with("border", "none")
        .with("width", "100%")
        .with("height", "100%")
        .with("position", "absolute")
        .with("top", "0")
        .with("left", "0")
        .with("min-height", MIN_HEIGHT)
}

/// Build a detached `<iframe>` pointing at the widget. Returns the frame and the address it loads.
pub fn build_frame(
    page: &mut HostPage,
    settings: &WidgetSettings,
    widget_id: &str,
    salt: &str,
) -> Result<(NodeHandle, Url), PageError> {
    let url = frame_url(settings.base_url(), widget_id, salt);
    let frame = page.create_element("iframe");
    page.set_attribute(frame, "src", url.as_str())?;
    page.set_style(frame, &frame_style())?;
    page.set_attribute(frame, "sandbox", sandbox(settings.same_origin_frame()))?;
    page.set_attribute(frame, "referrerpolicy", "origin")?;
    page.set_attribute(frame, "loading", "lazy")?;
    Ok((frame, url))
}
