use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::page::MessageEvent;

use super::error::WidgetError;
use super::lifecycle::WidgetShared;
use super::protocol::{parse_message, Envelope, ProtocolError, WidgetMessage};
use super::registry::WidgetInstance;

pub const READY_EVENT: &str = "widget:ready";
pub const ACTION_EVENT: &str = "widget:action";

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Sender is not on the allow-list; nothing was parsed.
    UntrustedOrigin,
    /// Payload did not match its declared type.
    Malformed,
    /// Well-formed but not a type this host understands.
    UnknownType(String),
    /// No live instance matches the message.
    NoInstance,
    /// Recognised but had nothing to apply, e.g. a zero height.
    Ignored(&'static str),
    /// Effect applied to the named instance.
    Applied {
        target_id: String,
        kind: &'static str,
    },
    /// Applying the effect failed; the listener stays installed.
    Failed(String),
}

/// Attach the shared listener to the host window, once per widget.
pub(crate) fn install(shared: &Rc<WidgetShared>) {
    if shared.router_installed.replace(true) {
        return;
    }
    let weak = Rc::downgrade(shared);
    shared.window.add_message_listener(Rc::new(move |event: &MessageEvent| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let outcome = route(&shared, event);
        trace!(target: "widget", origin = %event.origin, ?outcome, "routed message");
    }));
    debug!(target: "widget", "message listener installed");
}

pub(crate) fn route(shared: &WidgetShared, event: &MessageEvent) -> RouteOutcome {
    if !shared.settings.is_allowed_origin(&event.origin) {
        warn!(target: "widget", origin = %event.origin, "received message from untrusted domain");
        return RouteOutcome::UntrustedOrigin;
    }

    let envelope = match parse_message(&event.data) {
        Ok(envelope) => envelope,
        Err(ProtocolError::UnknownType(kind)) => {
            debug!(target: "widget", kind = %kind, "unhandled widget message type");
            return RouteOutcome::UnknownType(kind);
        }
        Err(err) => {
            warn!(target: "widget", origin = %event.origin, error = %err, "dropping malformed widget message");
            return RouteOutcome::Malformed;
        }
    };

    let Some(instance) = resolve_instance(shared, event, &envelope) else {
        debug!(
            target: "widget",
            kind = envelope.message.kind(),
            claimed = ?envelope.target_id,
            "message does not match a live instance"
        );
        return RouteOutcome::NoInstance;
    };

    match apply(shared, &instance, envelope.message) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(target: "widget", target_id = %instance.target_id, error = %err, "error handling widget message");
            RouteOutcome::Failed(err.to_string())
        }
    }
}

/// The sending frame identifies the instance; an explicit `targetId` is used
/// when the host cannot tell the source, and must agree with it otherwise.
fn resolve_instance(
    shared: &WidgetShared,
    event: &MessageEvent,
    envelope: &Envelope,
) -> Option<WidgetInstance> {
    let registry = shared.registry.borrow();
    let claimed = envelope.target_id.as_deref();
    match event.source {
        Some(frame) => {
            let instance = registry.find_by_frame(frame)?;
            match claimed {
                Some(id) if id != instance.target_id => None,
                _ => Some(instance.clone()),
            }
        }
        None => claimed.and_then(|id| registry.get(id)).cloned(),
    }
}

fn apply(
    shared: &WidgetShared,
    instance: &WidgetInstance,
    message: WidgetMessage,
) -> Result<RouteOutcome, WidgetError> {
    let kind = message.kind();
    match message {
        WidgetMessage::Ready => {
            shared.with_page(|page| page.dispatch_event(instance.container, READY_EVENT, None))?;
        }
        WidgetMessage::Resize(resize) => {
            if !(resize.height.is_finite() && resize.height > 0.0) {
                return Ok(RouteOutcome::Ignored("resize without a usable height"));
            }
            let height = format!("{}px", resize.height);
            shared.with_page(|page| page.set_style_property(instance.container, "height", &height))?;
        }
        WidgetMessage::Error(payload) => {
            warn!(target: "widget", target_id = %instance.target_id, error = payload.describe(), "widget reported error");
            shared.fail(
                &instance.target_id,
                &WidgetError::RemoteError(payload.describe().to_string()),
            )?;
        }
        WidgetMessage::Action(detail) => {
            shared.with_page(|page| page.dispatch_event(instance.container, ACTION_EVENT, detail))?;
        }
    }
    Ok(RouteOutcome::Applied {
        target_id: instance.target_id.clone(),
        kind,
    })
}
