//! Editing operations over the ordered target list.
//!
//! Each operation works on an in-memory list; callers hand the result to
//! [`ConfigStore::set_targets`](crate::ConfigStore::set_targets) as is.

use serde::{Deserialize, Serialize};

use crate::urls::extract_match_key;
use crate::{StoreError, TargetRecord};

/// User input for creating or editing a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDraft {
    pub url: String,
    pub label: String,
    #[serde(default)]
    pub field_position: usize,
    #[serde(default = "default_toggle")]
    pub record_email_toggle: bool,
}

fn default_toggle() -> bool {
    true
}

impl TargetDraft {
    fn validate(&self) -> Result<(), StoreError> {
        if self.label.trim().is_empty() {
            return Err(StoreError::MissingField("label"));
        }
        if self.url.trim().is_empty() {
            return Err(StoreError::MissingField("url"));
        }
        Ok(())
    }
}

pub fn new_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Append a new record built from `draft`.
pub fn add(targets: &mut Vec<TargetRecord>, draft: TargetDraft) -> Result<TargetRecord, StoreError> {
    draft.validate()?;
    let record = TargetRecord {
        id: new_id(),
        match_key: extract_match_key(draft.url.trim()),
        display_label: draft.label.trim().to_string(),
        field_position: draft.field_position,
        record_email_toggle: draft.record_email_toggle,
    };
    targets.push(record.clone());
    Ok(record)
}

/// Overwrite the record with `id` in place; its id and position are kept.
pub fn edit(targets: &mut [TargetRecord], id: &str, draft: TargetDraft) -> Result<(), StoreError> {
    draft.validate()?;
    let record = targets
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| StoreError::UnknownTarget(id.to_string()))?;
    record.match_key = extract_match_key(draft.url.trim());
    record.display_label = draft.label.trim().to_string();
    record.field_position = draft.field_position;
    record.record_email_toggle = draft.record_email_toggle;
    Ok(())
}

pub fn remove(targets: &mut Vec<TargetRecord>, id: &str) -> Result<TargetRecord, StoreError> {
    let index = targets
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| StoreError::UnknownTarget(id.to_string()))?;
    Ok(targets.remove(index))
}

/// Move the record at `from` so that it ends up at index `to`.
pub fn reorder(targets: &mut Vec<TargetRecord>, from: usize, to: usize) -> Result<(), StoreError> {
    let len = targets.len();
    for index in [from, to] {
        if index >= len {
            return Err(StoreError::OutOfRange { index, len });
        }
    }
    if from != to {
        let moved = targets.remove(from);
        targets.insert(to, moved);
    }
    Ok(())
}

/// Look a record up by id, falling back to its display label.
pub fn find<'a>(targets: &'a [TargetRecord], id_or_label: &str) -> Option<&'a TargetRecord> {
    targets
        .iter()
        .find(|t| t.id == id_or_label)
        .or_else(|| targets.iter().find(|t| t.display_label == id_or_label))
}
