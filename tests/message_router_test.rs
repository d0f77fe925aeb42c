use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use widget_embed::config::WidgetSettings;
use widget_embed::page::{HostPage, HostWindow, MessageEvent};
use widget_embed::widget::{
    FrameSignal, ManualFrameLoader, RouteOutcome, Widget, WidgetConfig, WidgetError,
    WidgetInstance, ACTION_EVENT, FALLBACK_MESSAGE, READY_EVENT,
};

const TRUSTED: &str = "https://staging-app.avitor.ai";
const PAGE: &str = r#"<!DOCTYPE html><html><body><div id="quote"></div><div id="other"></div></body></html>"#;

struct Harness {
    page: Rc<RefCell<HostPage>>,
    window: Rc<HostWindow>,
    widget: Widget,
}

async fn two_live_instances() -> Harness {
    let page = Rc::new(RefCell::new(HostPage::from_html(PAGE)));
    let window = Rc::new(HostWindow::new());
    let widget = Widget::new(
        Rc::clone(&page),
        Rc::clone(&window),
        Rc::new(ManualFrameLoader::with_auto_signal(FrameSignal::Loaded)),
        WidgetSettings::default(),
    );
    for target in ["quote", "other"] {
        widget
            .initialize(WidgetConfig::new(target, "w", "s"))
            .await
            .expect("initialize");
    }
    Harness {
        page,
        window,
        widget,
    }
}

impl Harness {
    fn instance(&self, id: &str) -> WidgetInstance {
        self.widget.instance(id).expect("live instance")
    }

    fn height(&self, id: &str) -> Option<String> {
        let container = self.instance(id).container;
        self.page.borrow().style_property(container, "height").unwrap()
    }

    fn post_from_frame(&self, id: &str, data: Value) {
        let frame = self.instance(id).frame;
        self.window
            .post_message(MessageEvent::new(TRUSTED, data).from_frame(frame));
    }
}

#[tokio::test]
async fn untrusted_origin_is_inert() {
    let h = two_live_instances().await;
    let before = h.page.borrow().serialize();

    for data in [
        json!({"type": "widget:resize", "targetId": "quote", "payload": {"height": 600}}),
        json!({"type": "widget:error", "targetId": "quote", "payload": {"message": "x"}}),
        json!({"type": "widget:ready", "targetId": "quote"}),
        json!("garbage"),
    ] {
        let event = MessageEvent::new("https://evil.example", data.clone());
        assert_eq!(h.widget.route_message(&event), RouteOutcome::UntrustedOrigin);
        h.window.post_message(event);
    }

    assert_eq!(h.page.borrow().serialize(), before);
    assert_eq!(h.widget.instance_ids(), vec!["other", "quote"]);
    assert!(h.page.borrow_mut().try_recv_event().is_none());
}

#[tokio::test]
async fn resize_only_touches_its_own_container() {
    let h = two_live_instances().await;

    h.post_from_frame("quote", json!({"type": "widget:resize", "payload": {"height": 600}}));

    assert_eq!(h.height("quote").as_deref(), Some("600px"));
    assert_eq!(h.height("other").as_deref(), Some("100%"));
}

#[tokio::test]
async fn resize_by_explicit_target_id_and_last_write_wins() {
    let h = two_live_instances().await;

    for height in [300, 450] {
        h.window.post_message(MessageEvent::new(
            TRUSTED,
            json!({"type": "resize", "targetId": "other", "payload": {"height": height}}),
        ));
    }

    assert_eq!(h.height("other").as_deref(), Some("450px"));
    assert_eq!(h.height("quote").as_deref(), Some("100%"));
}

#[tokio::test]
async fn falsy_height_is_ignored() {
    let h = two_live_instances().await;
    let event = MessageEvent::new(
        TRUSTED,
        json!({"type": "widget:resize", "targetId": "quote", "payload": {"height": 0}}),
    );

    assert!(matches!(h.widget.route_message(&event), RouteOutcome::Ignored(_)));
    assert_eq!(h.height("quote").as_deref(), Some("100%"));
}

#[tokio::test]
async fn ready_and_action_notify_the_host() {
    let h = two_live_instances().await;
    let quote = h.instance("quote");

    h.post_from_frame("quote", json!({"type": "widget:ready"}));
    h.post_from_frame(
        "quote",
        json!({"type": "widget:action", "payload": {"name": "submit", "fields": [1, 2]}}),
    );

    let mut page = h.page.borrow_mut();
    let ready = page.try_recv_event().expect("ready event");
    assert_eq!(ready.name, READY_EVENT);
    assert_eq!(ready.target, quote.container);
    assert_eq!(ready.detail, None);

    let action = page.try_recv_event().expect("action event");
    assert_eq!(action.name, ACTION_EVENT);
    assert_eq!(action.target, quote.container);
    assert_eq!(action.detail, Some(json!({"name": "submit", "fields": [1, 2]})));
    assert!(page.try_recv_event().is_none());
}

#[tokio::test]
async fn remote_error_destroys_only_that_instance() {
    let h = two_live_instances().await;
    let quote = h.instance("quote");

    h.post_from_frame(
        "quote",
        json!({"type": "widget:error", "payload": {"message": "quote service down"}}),
    );

    assert!(!h.widget.is_registered("quote"));
    assert!(h.widget.is_registered("other"));
    let mut page = h.page.borrow_mut();
    assert!(!page.is_attached(quote.container));
    let target = page.find_by_id("quote").unwrap();
    assert_eq!(page.text_content(target).unwrap().trim(), FALLBACK_MESSAGE);
}

#[tokio::test]
async fn unknown_malformed_and_unmatched_messages_change_nothing() {
    let h = two_live_instances().await;
    let before = h.page.borrow().serialize();
    let quote = h.instance("quote");
    let other = h.instance("other");

    let cases = [
        (
            MessageEvent::new(TRUSTED, json!({"type": "widget:dance", "targetId": "quote"})),
            RouteOutcome::UnknownType("widget:dance".into()),
        ),
        (
            MessageEvent::new(
                TRUSTED,
                json!({"type": "widget:resize", "targetId": "quote", "payload": {"height": "tall"}}),
            ),
            RouteOutcome::Malformed,
        ),
        (
            MessageEvent::new(TRUSTED, json!({"type": "widget:resize", "payload": {"height": 10}})),
            RouteOutcome::NoInstance,
        ),
        (
            MessageEvent::new(
                TRUSTED,
                json!({"type": "widget:resize", "targetId": "ghost", "payload": {"height": 10}}),
            ),
            RouteOutcome::NoInstance,
        ),
        (
            MessageEvent::new(
                TRUSTED,
                json!({"type": "widget:resize", "targetId": "other", "payload": {"height": 10}}),
            )
            .from_frame(quote.frame),
            RouteOutcome::NoInstance,
        ),
        (
            MessageEvent::new(TRUSTED, json!({"type": "widget:ready"})).from_frame(other.container),
            RouteOutcome::NoInstance,
        ),
    ];

    for (event, expected) in cases {
        assert_eq!(h.widget.route_message(&event), expected);
    }

    assert_eq!(h.page.borrow().serialize(), before);
    assert_eq!(h.widget.instance_ids(), vec!["other", "quote"]);
}

#[tokio::test]
async fn busy_page_fails_one_message_without_breaking_the_listener() {
    let h = two_live_instances().await;
    let event = MessageEvent::new(
        TRUSTED,
        json!({"type": "widget:resize", "targetId": "quote", "payload": {"height": 700}}),
    );

    {
        let _reader = h.page.borrow();
        assert!(matches!(h.widget.route_message(&event), RouteOutcome::Failed(_)));
        h.window.post_message(event.clone());
    }
    assert_eq!(h.height("quote").as_deref(), Some("100%"));

    h.window.post_message(event);
    assert_eq!(h.height("quote").as_deref(), Some("700px"));
    assert_eq!(h.window.listener_count(), 1);
}

#[tokio::test]
async fn destroy_on_busy_page_keeps_the_instance_owned() {
    let h = two_live_instances().await;
    let quote = h.instance("quote");

    {
        let _reader = h.page.borrow();
        assert!(matches!(h.widget.destroy("quote"), Err(WidgetError::PageBusy)));
    }
    assert!(h.widget.is_registered("quote"));
    assert!(h.page.borrow().is_attached(quote.container));

    h.widget.destroy("quote").unwrap();
    assert!(!h.widget.is_registered("quote"));
    assert!(!h.page.borrow().is_attached(quote.container));
}

#[tokio::test]
async fn remote_error_on_busy_page_can_be_redelivered() {
    let h = two_live_instances().await;
    let quote = h.instance("quote");
    let error = MessageEvent::new(
        TRUSTED,
        json!({"type": "widget:error", "targetId": "quote", "payload": "down"}),
    );

    {
        let _reader = h.page.borrow();
        assert!(matches!(h.widget.route_message(&error), RouteOutcome::Failed(_)));
    }
    assert!(h.widget.is_registered("quote"));
    assert!(h.page.borrow().is_attached(quote.container));

    h.window.post_message(error);
    assert!(!h.widget.is_registered("quote"));
    let mut page = h.page.borrow_mut();
    assert!(!page.is_attached(quote.container));
    let target = page.find_by_id("quote").unwrap();
    assert_eq!(page.text_content(target).unwrap().trim(), FALLBACK_MESSAGE);
}

#[tokio::test]
async fn applied_outcome_names_the_instance() {
    let h = two_live_instances().await;
    let event = MessageEvent::new(TRUSTED, json!({"type": "widget:ready"}))
        .from_frame(h.instance("other").frame);

    assert_eq!(
        h.widget.route_message(&event),
        RouteOutcome::Applied {
            target_id: "other".into(),
            kind: "ready",
        }
    );
}
