use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use headless_chrome::Tab;
use serde_json::Value;
use std::sync::Arc;

use crate::injector::set_value_script;
use crate::page::Page;
use crate::types::{ElementId, ElementSnapshot, Point};

/// Elements a scan reports, in document order.
pub const CANDIDATE_SELECTOR: &str =
    r#"input, textarea, [role="checkbox"], [role="button"], button, span"#;

/// JavaScript that tags every candidate with `data-autofill-eid` and returns
/// a JSON array of [`ElementSnapshot`]s.
///
/// Ids from a previous scan are cleared first, so an id only names an element
/// until the next scan.
const SCAN_JS: &str = r#"
(() => {
  const ATTR = 'data-autofill-eid';
  document.querySelectorAll('[' + ATTR + ']').forEach(el => el.removeAttribute(ATTR));
  const nodes = [...document.querySelectorAll(SELECTOR)];
  nodes.forEach((el, i) => el.setAttribute(ATTR, String(i)));
  const eidOf = el => (el ? el.getAttribute(ATTR) : null);
  return JSON.stringify(nodes.map(el => {
    const container = el.closest('label') || el.parentElement || el;
    return {
      eid: eidOf(el),
      tag: el.tagName.toLowerCase(),
      role: el.getAttribute('role'),
      inputType: el.getAttribute('type'),
      text: el.textContent || '',
      labelText: container.textContent || '',
      ariaChecked: el.getAttribute('aria-checked'),
      clickableEid: eidOf(el.closest('[role="button"], button')),
    };
  }));
})()
"#;

/// Start of the current document's time origin; fresh on every load.
const LOAD_ID_JS: &str = "String(performance.timeOrigin)";

fn with_element(id: &ElementId, body: &str) -> Result<String> {
    Ok(format!(
        r#"(() => {{
  const el = document.querySelector('[data-autofill-eid="' + {eid} + '"]');
  if (!el) return false;
  {body}
  return true;
}})()"#,
        eid = serde_json::to_string(&id.0)?,
    ))
}

const CLICK_JS: &str = "el.click();";
const HIGHLIGHT_JS: &str = "el.style.border = '4px solid red';";
const CENTER_JS: &str = r#"
  const r = el.getBoundingClientRect();
  return JSON.stringify({ x: r.left + r.width / 2, y: r.top + r.height / 2 });"#;

fn pointer_sequence_js(at: Point) -> String {
    format!(
        r#"
  const opts = {{ bubbles: true, cancelable: true, view: window, clientX: {x}, clientY: {y} }};
  for (const type of ['mousedown', 'mouseup', 'click']) {{
    el.dispatchEvent(new MouseEvent(type, opts));
  }}"#,
        x = at.x,
        y = at.y,
    )
}

/// A browser tab driven through `Runtime.evaluate`.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    /// Evaluate on a blocking thread; `headless_chrome` calls block.
    async fn evaluate(&self, script: String) -> Result<Option<Value>> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| anyhow!("evaluate task panicked: {e}"))?
            .map(|remote| remote.value)
    }

    async fn on_element(&self, id: &ElementId, body: &str) -> Result<()> {
        match self.evaluate(with_element(id, body)?).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => bail!("element {id} is no longer on the page"),
        }
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn url(&self) -> Result<String> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || tab.get_url())
            .await
            .map_err(|e| anyhow!("url task panicked: {e}"))
    }

    async fn load_id(&self) -> Result<String> {
        match self.evaluate(LOAD_ID_JS.to_string()).await? {
            Some(Value::String(id)) => Ok(id),
            other => bail!("unexpected load id {other:?}"),
        }
    }

    async fn scan(&self) -> Result<Vec<ElementSnapshot>> {
        let script = SCAN_JS.replace("SELECTOR", &serde_json::to_string(CANDIDATE_SELECTOR)?);
        let raw = self
            .evaluate(script)
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .context("scan returned nothing")?;
        serde_json::from_str(&raw).context("malformed scan result")
    }

    async fn set_control_value(&self, id: &ElementId, value: &str) -> Result<()> {
        match self.evaluate(set_value_script(id, value)?).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => bail!("element {id} is no longer on the page"),
        }
    }

    async fn click(&self, id: &ElementId) -> Result<()> {
        self.on_element(id, CLICK_JS).await
    }

    async fn highlight(&self, id: &ElementId) -> Result<()> {
        self.on_element(id, HIGHLIGHT_JS).await
    }

    async fn center_of(&self, id: &ElementId) -> Result<Point> {
        let raw = self
            .evaluate(with_element(id, CENTER_JS)?)
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .with_context(|| format!("element {id} is no longer on the page"))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn dispatch_pointer_sequence(&self, id: &ElementId, at: Point) -> Result<()> {
        self.on_element(id, &pointer_sequence_js(at)).await
    }

    async fn post_message(&self, payload: &Value) -> Result<()> {
        let script = format!("window.postMessage({}, '*')", serde_json::to_string(payload)?);
        self.evaluate(script).await?;
        Ok(())
    }
}
