use std::cell::RefCell;

use reqwest::Client;
use tokio::sync::oneshot;
use url::Url;

use crate::page::NodeHandle;

/// Outcome reported by whatever actually loads the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSignal {
    Loaded,
    Failed(String),
}

pub type FrameSignalSender = oneshot::Sender<FrameSignal>;

/// Receiving half of a frame's single-use load signal.
pub struct FrameLoad {
    receiver: oneshot::Receiver<FrameSignal>,
}

impl FrameLoad {
    pub fn channel() -> (FrameSignalSender, Self) {
        let (tx, receiver) = oneshot::channel();
        (tx, Self { receiver })
    }

    pub(crate) fn into_receiver(self) -> oneshot::Receiver<FrameSignal> {
        self.receiver
    }
}

/// A request to start loading `frame` from `url`.
pub struct FrameRequest {
    pub frame: NodeHandle,
    pub url: Url,
    pub signal: FrameSignalSender,
}

impl FrameRequest {
    /// Report the outcome. Returns false when nobody is waiting anymore.
    pub fn settle(self, signal: FrameSignal) -> bool {
        self.signal.send(signal).is_ok()
    }
}

/// Starts loading embedded frames and reports their load/error signal.
pub trait FrameLoader {
    fn begin_load(&self, request: FrameRequest);
}

/// Loads the frame address over HTTP. Any 2xx response counts as a load.
#[derive(Clone, Default)]
pub struct HttpFrameLoader {
    client: Client,
}

impl HttpFrameLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl FrameLoader for HttpFrameLoader {
    fn begin_load(&self, request: FrameRequest) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let FrameRequest { frame, url, signal } = request;
            tracing::debug!(target: "widget", frame = %frame, url = %url, "loading frame");
            let outcome = match client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => FrameSignal::Loaded,
                Ok(response) => FrameSignal::Failed(format!("{url} returned {}", response.status())),
                Err(err) => FrameSignal::Failed(err.to_string()),
            };
            if signal.send(outcome).is_err() {
                tracing::debug!(target: "widget", frame = %frame, "frame settled after the race was decided");
            }
        });
    }
}

/// Holds load requests until the embedder settles them, e.g. from its own
/// network layer or a test.
#[derive(Default)]
pub struct ManualFrameLoader {
    pending: RefCell<Vec<FrameRequest>>,
    auto_signal: Option<FrameSignal>,
}

impl ManualFrameLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle every request with `signal` as soon as it begins.
    pub fn with_auto_signal(signal: FrameSignal) -> Self {
        Self {
            pending: RefCell::default(),
            auto_signal: Some(signal),
        }
    }

    /// Forget requests whose race was already decided without them.
    fn prune(pending: &mut Vec<FrameRequest>) {
        pending.retain(|request| !request.signal.is_closed());
    }

    /// Requests still waiting for a signal, oldest first.
    pub fn pending(&self) -> Vec<(NodeHandle, Url)> {
        let mut pending = self.pending.borrow_mut();
        Self::prune(&mut pending);
        pending
            .iter()
            .map(|request| (request.frame, request.url.clone()))
            .collect()
    }

    /// Settle the request for `frame`. Returns false if it is unknown or nobody waits on it.
    pub fn settle(&self, frame: NodeHandle, signal: FrameSignal) -> bool {
        let request = {
            let mut pending = self.pending.borrow_mut();
            Self::prune(&mut pending);
            let Some(index) = pending.iter().position(|request| request.frame == frame) else {
                return false;
            };
            pending.remove(index)
        };
        request.settle(signal)
    }

    /// Settle the oldest pending request.
    pub fn settle_next(&self, signal: FrameSignal) -> bool {
        let request = {
            let mut pending = self.pending.borrow_mut();
            Self::prune(&mut pending);
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        request.settle(signal)
    }
}

impl FrameLoader for ManualFrameLoader {
    fn begin_load(&self, request: FrameRequest) {
        match &self.auto_signal {
            Some(signal) => {
                request.settle(signal.clone());
            }
            None => {
                let mut pending = self.pending.borrow_mut();
                Self::prune(&mut pending);
                pending.push(request);
            }
        }
    }
}
