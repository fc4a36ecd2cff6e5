use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::types::{ElementId, ElementSnapshot, Point};

/// One loaded page, as seen by the automation steps.
///
/// Element ids are only valid until the next [`Page::scan`].
#[async_trait]
pub trait Page: Send + Sync {
    async fn url(&self) -> Result<String>;

    /// Identifies the current document load; a reload of the same URL gets a
    /// new one.
    async fn load_id(&self) -> Result<String>;

    /// Every candidate element in document order.
    async fn scan(&self) -> Result<Vec<ElementSnapshot>>;

    /// Write `value` so the page's own framework sees the change.
    async fn set_control_value(&self, id: &ElementId, value: &str) -> Result<()>;

    /// Plain user-style click.
    async fn click(&self, id: &ElementId) -> Result<()>;

    /// Outline the element for whoever is watching the tab.
    async fn highlight(&self, id: &ElementId) -> Result<()>;

    /// Viewport coordinates of the element's center.
    async fn center_of(&self, id: &ElementId) -> Result<Point>;

    /// Bubbling mousedown, mouseup, click at `at`, in that order.
    async fn dispatch_pointer_sequence(&self, id: &ElementId, at: Point) -> Result<()>;

    /// `window.postMessage(payload, "*")`.
    async fn post_message(&self, payload: &Value) -> Result<()>;
}
