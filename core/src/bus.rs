//! Fire-and-forget channel between the authoring shell and the preview.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::service::{ContentInstance, ContentType};

pub const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub path: String,
    #[serde(rename = "type")]
    pub asset_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub instance: ContentInstance,
    pub content_type: ContentType,
}

/// What is being dragged out of the search results.
#[derive(Debug, Clone, PartialEq)]
pub enum DragPayload {
    Asset(AssetRef),
    Component(ComponentRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusMessage {
    AssetDragStarted(AssetRef),
    AssetDragEnded(AssetRef),
    ComponentDragStarted(ComponentRef),
    ComponentDragEnded(ComponentRef),
    /// The preview navigated on its own; sent preview to shell.
    PreviewNavigated { url: String },
    /// Ask the preview to load a page; sent shell to preview.
    PreviewNavigate { url: String },
}

impl BusMessage {
    pub fn drag_started(payload: DragPayload) -> Self {
        match payload {
            DragPayload::Asset(asset) => BusMessage::AssetDragStarted(asset),
            DragPayload::Component(component) => BusMessage::ComponentDragStarted(component),
        }
    }

    pub fn drag_ended(payload: DragPayload) -> Self {
        match payload {
            DragPayload::Asset(asset) => BusMessage::AssetDragEnded(asset),
            DragPayload::Component(component) => BusMessage::ComponentDragEnded(component),
        }
    }
}

pub fn encode(message: &BusMessage) -> anyhow::Result<String> { Ok(serde_json::to_string(message)?) }

/// Decode a wire message; anything malformed is `None`.
pub fn decode(raw: &str) -> Option<BusMessage> {
    match serde_json::from_str(raw) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(error = %err, "dropping malformed bus message");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Shell,
    Preview,
}

pub struct CrossContextBus;

impl CrossContextBus {
    /// Open a channel pair; returns the shell endpoint and the preview endpoint.
    pub fn open(capacity: usize) -> (BusEndpoint, BusEndpoint) {
        let capacity = capacity.max(1);
        let (to_preview, _) = broadcast::channel(capacity);
        let (to_shell, _) = broadcast::channel(capacity);
        let shell = BusEndpoint { side: Side::Shell, outbound: to_preview.clone(), inbound: to_shell.clone() };
        let preview = BusEndpoint { side: Side::Preview, outbound: to_shell, inbound: to_preview };
        (shell, preview)
    }
}

#[derive(Clone)]
pub struct BusEndpoint {
    side: Side,
    outbound: broadcast::Sender<BusMessage>,
    inbound: broadcast::Sender<BusMessage>,
}

impl BusEndpoint {
    /// Send to the other side. Never fails, never waits.
    pub fn publish(&self, message: BusMessage) {
        trace!(side = ?self.side, message = ?message, "publishing bus message");
        // No subscriber on the other side is not an error.
        let _ = self.outbound.send(message);
    }

    /// Decode and send a wire message; returns whether it was well formed.
    pub fn publish_raw(&self, raw: &str) -> bool {
        match decode(raw) {
            Some(message) => {
                self.publish(message);
                true
            }
            None => false,
        }
    }

    /// Messages the other side publishes from now on.
    pub fn subscribe(&self) -> BusSubscription { BusSubscription { receiver: self.inbound.subscribe() } }
}

pub struct BusSubscription {
    receiver: broadcast::Receiver<BusMessage>,
}

impl BusSubscription {
    /// Next message, or `None` once both endpoints are gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "bus subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!(skipped = n, "bus subscriber lagged, messages dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
