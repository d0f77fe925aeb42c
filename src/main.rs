use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;
use widget_embed::{HostPage, HostWindow, HttpFrameLoader, Widget, WidgetConfig, WidgetSettings};

const USAGE: &str = "usage: widget-embed <page.html> <target-id> <widget-id> <salt>";

fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [page_path, target_id, widget_id, salt] = args.as_slice() else {
        bail!(USAGE);
    };

    let html = std::fs::read_to_string(page_path)
        .with_context(|| format!("failed to read host page {page_path}"))?;

    let settings_path = std::env::var("WIDGET_SETTINGS").ok().map(PathBuf::from);
    let settings = WidgetSettings::load(settings_path).context("failed to load widget settings")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let page = Rc::new(RefCell::new(HostPage::from_html(&html)));
    let widget = Widget::new(
        Rc::clone(&page),
        Rc::new(HostWindow::new()),
        Rc::new(HttpFrameLoader::new()),
        settings,
    );

    let config = WidgetConfig::new(target_id.as_str(), widget_id.as_str(), salt.as_str());
    let outcome = rt.block_on(widget.initialize(config));

    match &outcome {
        Ok(()) => println!("widget loaded into #{target_id}"),
        Err(err) => eprintln!("widget failed: {err}"),
    }
    println!("{}", page.borrow().serialize());

    outcome.map_err(Into::into)
}
