use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::WidgetSettings;
use crate::page::{HostPage, HostWindow, InlineStyle, MessageEvent, NodeHandle, PageError};

use super::error::WidgetError;
use super::frame::{build_frame, MIN_HEIGHT};
use super::loader::{FrameLoad, FrameLoader, FrameRequest};
use super::race::race_load;
use super::registry::{InstanceRegistry, WidgetInstance};
use super::router::{self, RouteOutcome};

pub const FALLBACK_MESSAGE: &str = "Failed to load widget. Please try again later.";

/// Host-supplied parameters for one embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    pub target_id: String,
    pub widget_id: String,
    /// Opaque token forwarded to the widget untouched.
    pub salt: String,
}

impl WidgetConfig {
    pub fn new(
        target_id: impl Into<String>,
        widget_id: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            widget_id: widget_id.into(),
            salt: salt.into(),
        }
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        for (name, value) in [
            ("targetId", &self.target_id),
            ("widgetId", &self.widget_id),
            ("salt", &self.salt),
        ] {
            if value.is_empty() {
                return Err(WidgetError::InvalidConfig(name));
            }
        }
        Ok(())
    }
}

pub(crate) struct WidgetShared {
    pub(crate) page: Rc<RefCell<HostPage>>,
    pub(crate) window: Rc<HostWindow>,
    pub(crate) loader: Rc<dyn FrameLoader>,
    pub(crate) settings: WidgetSettings,
    pub(crate) registry: RefCell<InstanceRegistry>,
    pub(crate) router_installed: Cell<bool>,
}

impl WidgetShared {
    pub(crate) fn with_page<T>(
        &self,
        f: impl FnOnce(&mut HostPage) -> Result<T, PageError>,
    ) -> Result<T, WidgetError> {
        let mut page = self
            .page
            .try_borrow_mut()
            .map_err(|_| WidgetError::PageBusy)?;
        Ok(f(&mut page)?)
    }

    fn remove_container(&self, container: NodeHandle) {
        if let Err(err) = self.with_page(|page| page.remove_node(container)) {
            warn!(target: "widget", container = %container, error = %err, "failed to remove widget container");
        }
    }

    /// Detach and forget the instance for `target_id`. The registry entry is
    /// only dropped once its container is off the page.
    pub(crate) fn destroy(&self, target_id: &str) -> Result<(), WidgetError> {
        if !self.registry.borrow().contains(target_id) {
            return Ok(());
        }
        let mut page = self
            .page
            .try_borrow_mut()
            .map_err(|_| WidgetError::PageBusy)?;
        let Some(instance) = self.registry.borrow_mut().remove(target_id) else {
            return Ok(());
        };
        if let Err(err) = page.remove_node(instance.container) {
            self.registry.borrow_mut().register(instance);
            return Err(err.into());
        }
        info!(target: "widget", target_id, "widget destroyed");
        Ok(())
    }

    /// Log, tear down whatever is registered for `target_id`, and leave the
    /// fallback notice in the target. Nothing is retried; when the page is
    /// busy the instance stays registered and the error is returned.
    pub(crate) fn fail(&self, target_id: &str, err: &WidgetError) -> Result<(), WidgetError> {
        error!(target: "widget", target_id, error = %err, "widget initialization failed");
        self.destroy(target_id)?;
        if target_id.is_empty() {
            return Ok(());
        }
        if !self.with_page(|page| render_fallback(page, target_id))? {
            warn!(target: "widget", target_id, "no target element for the fallback notice");
        }
        Ok(())
    }
}

fn container_style() -> InlineStyle {
    InlineStyle::new()
        .with("position", "relative")
        .with("width", "100%")
        .with("height", "100%")
        .with("min-height", MIN_HEIGHT)
        .with("opacity", "0")
        .with("transition", "opacity 0.3s ease")
}

fn fallback_style() -> InlineStyle {
    InlineStyle::new()
        .with("padding", "20px")
        .with("text-align", "center")
        .with("color", "#721c24")
        .with("background-color", "#f8d7da")
        .with("border", "1px solid #f5c6cb")
        .with("border-radius", "4px")
}

fn render_fallback(page: &mut HostPage, target_id: &str) -> Result<bool, PageError> {
    let Some(target) = page.find_by_id(target_id) else {
        return Ok(false);
    };
    let notice = page.create_element("div");
    page.set_style(notice, &fallback_style())?;
    let text = page.create_text_node(FALLBACK_MESSAGE);
    page.append_child(notice, text)?;
    page.replace_children(target, notice)?;
    Ok(true)
}

/// Embeds widgets into one host page and keeps track of the live ones.
#[derive(Clone)]
pub struct Widget {
    shared: Rc<WidgetShared>,
}

impl Widget {
    pub fn new(
        page: Rc<RefCell<HostPage>>,
        window: Rc<HostWindow>,
        loader: Rc<dyn FrameLoader>,
        settings: WidgetSettings,
    ) -> Self {
        Self {
            shared: Rc::new(WidgetShared {
                page,
                window,
                loader,
                settings,
                registry: RefCell::new(InstanceRegistry::new()),
                router_installed: Cell::new(false),
            }),
        }
    }

    /// Embed the widget described by `config` into its target element.
    ///
    /// Every failure has already been turned into the fallback notice by the
    /// time this returns; the `Result` only reports the outcome.
    pub async fn initialize(&self, config: WidgetConfig) -> Result<(), WidgetError> {
        match self.try_initialize(&config).await {
            Ok(()) => {
                info!(target: "widget", target_id = %config.target_id, widget_id = %config.widget_id, "widget loaded");
                Ok(())
            }
            Err(err) => {
                if let Err(cleanup) = self.shared.fail(&config.target_id, &err) {
                    warn!(target: "widget", target_id = %config.target_id, error = %cleanup, "failed to clean up after widget failure");
                }
                Err(err)
            }
        }
    }

    async fn try_initialize(&self, config: &WidgetConfig) -> Result<(), WidgetError> {
        config.validate()?;
        let shared = &self.shared;

        let target = shared
            .with_page(|page| Ok(page.find_by_id(&config.target_id)))?
            .ok_or_else(|| WidgetError::TargetNotFound(config.target_id.clone()))?;

        if shared.registry.borrow().contains(&config.target_id) {
            info!(target: "widget", target_id = %config.target_id, "replacing live widget instance");
            shared.destroy(&config.target_id)?;
        }

        let (container, frame, url) = shared.with_page(|page| {
            let container = page.create_element("div");
            page.set_style(container, &container_style())?;
            let (frame, url) =
                build_frame(page, &shared.settings, &config.widget_id, &config.salt)?;
            Ok((container, frame, url))
        })?;

        router::install(shared);

        shared.with_page(|page| {
            page.append_child(container, frame)?;
            page.append_child(target, container)
        })?;

        let instance = WidgetInstance {
            target_id: config.target_id.clone(),
            container,
            frame,
        };

        let (signal, load) = FrameLoad::channel();
        shared.loader.begin_load(FrameRequest { frame, url, signal });

        let settled = async {
            race_load(load, shared.settings.timeout()).await?;
            shared.with_page(|page| page.set_style_property(container, "opacity", "1"))
        }
        .await;
        if let Err(err) = settled {
            shared.remove_container(container);
            return Err(err);
        }

        let displaced = shared.registry.borrow_mut().register(instance);
        if let Some(displaced) = displaced {
            warn!(target: "widget", target_id = %displaced.target_id, "discarding instance displaced by a concurrent initialize");
            shared.remove_container(displaced.container);
        }
        Ok(())
    }

    /// Remove the instance registered for `target_id`. No-op when absent.
    /// Fails with `PageBusy`, leaving the instance registered, if the host
    /// page is borrowed elsewhere.
    pub fn destroy(&self, target_id: &str) -> Result<(), WidgetError> {
        self.shared.destroy(target_id)
    }

    pub fn destroy_all(&self) -> Result<(), WidgetError> {
        let ids = self.shared.registry.borrow().ids();
        for id in ids {
            self.shared.destroy(&id)?;
        }
        Ok(())
    }

    /// Route one message as the installed listener would.
    pub fn route_message(&self, event: &MessageEvent) -> RouteOutcome {
        router::route(&self.shared, event)
    }

    pub fn is_registered(&self, target_id: &str) -> bool {
        self.shared.registry.borrow().contains(target_id)
    }

    pub fn instance(&self, target_id: &str) -> Option<WidgetInstance> {
        self.shared.registry.borrow().get(target_id).cloned()
    }

    pub fn instance_ids(&self) -> Vec<String> {
        self.shared.registry.borrow().ids()
    }

    pub fn settings(&self) -> &WidgetSettings {
        &self.shared.settings
    }

    pub fn page(&self) -> Rc<RefCell<HostPage>> {
        Rc::clone(&self.shared.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_first_missing_field() {
        assert!(WidgetConfig::new("t", "w", "s").validate().is_ok());
        for (config, field) in [
            (WidgetConfig::new("", "w", "s"), "targetId"),
            (WidgetConfig::new("t", "", "s"), "widgetId"),
            (WidgetConfig::new("t", "w", ""), "salt"),
        ] {
            assert!(matches!(config.validate(), Err(WidgetError::InvalidConfig(name)) if name == field));
        }
    }

    #[test]
    fn config_deserializes_from_host_json() {
        let config: WidgetConfig =
            serde_json::from_str(r#"{"targetId": "quote", "widgetId": "w-1"}"#).unwrap();
        assert_eq!(config, WidgetConfig::new("quote", "w-1", ""));
        assert!(matches!(config.validate(), Err(WidgetError::InvalidConfig("salt"))));
    }

    #[test]
    fn container_starts_hidden() {
        let style = container_style();
        assert_eq!(style.get("opacity"), Some("0"));
        assert_eq!(style.get("position"), Some("relative"));
        assert_eq!(style.get("min-height"), Some(MIN_HEIGHT));
    }
}
