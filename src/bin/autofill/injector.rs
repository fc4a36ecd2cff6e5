//! Writing a value so the form's reactive framework notices it.
//!
//! Frameworks that track inputs install their own `value` accessor on the
//! element instance. Assigning through that accessor updates their cache but
//! not the element, so the next render throws the value away. The script below
//! goes through the prototype's setter instead and then fires a bubbling
//! `input` event for delegated listeners.

use anyhow::Result;
use tracing::{info, warn};

use crate::locator::{FieldLookup, locate_text_field};
use crate::page::Page;
use crate::types::ElementId;

const SET_VALUE_JS: &str = r#"
((eid, value) => {
  const el = document.querySelector('[data-autofill-eid="' + eid + '"]');
  if (!el) return false;
  const own = Object.getOwnPropertyDescriptor(el, 'value');
  const inherited = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
  const ownSetter = own && own.set;
  const protoSetter = inherited && inherited.set;
  if (protoSetter && ownSetter !== protoSetter) {
    protoSetter.call(el, value);
  } else if (ownSetter) {
    ownSetter.call(el, value);
  } else {
    el.value = value;
  }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  return true;
})"#;

/// Expression that sets `value` on the element and evaluates to whether the
/// element was still there.
pub fn set_value_script(id: &ElementId, value: &str) -> Result<String> {
    Ok(format!(
        "{SET_VALUE_JS}({}, {})",
        serde_json::to_string(&id.0)?,
        serde_json::to_string(value)?
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillResult {
    Filled(ElementId),
    Missing { available: usize },
}

/// Put `value` into the `position`-th free-text field, if there is one.
pub async fn fill_field(page: &dyn Page, position: usize, value: &str) -> Result<FillResult> {
    let elements = page.scan().await?;
    match locate_text_field(&elements, position) {
        FieldLookup::Found(id) => {
            info!(position, eid = %id, "writing profile name");
            page.set_control_value(&id, value).await?;
            Ok(FillResult::Filled(id))
        }
        FieldLookup::Missing { available } => {
            warn!(position, available, "no text field at configured position");
            Ok(FillResult::Missing { available })
        }
    }
}
