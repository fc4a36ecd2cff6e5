use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Let the form's own scripts finish their first render.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1500);
/// Between the email toggle step and writing the name.
pub const INJECT_DELAY: Duration = Duration::from_millis(500);
/// Between writing the name and the first submit scan.
pub const SUBMIT_DELAY: Duration = Duration::from_millis(500);

pub const SUBMIT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_SUBMIT_SCANS: u32 = 10;

pub const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_CONFIRM_POLLS: u32 = 20;

pub const TAB_WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Action tag the host understands as "close the sender's tab".
pub const CLOSE_TAB_ACTION: &str = "closeTab";

/// Scan-local handle of an element, written to `data-autofill-eid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a scan reports about one candidate element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub eid: String,
    /// Lower-case tag name.
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Raw `type` attribute.
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Text of the closest `label`, else the parent, else the element.
    #[serde(default)]
    pub label_text: String,
    #[serde(default)]
    pub aria_checked: Option<String>,
    /// Nearest ancestor-or-self with a clickable role.
    #[serde(default)]
    pub clickable_eid: Option<String>,
}

impl ElementSnapshot {
    pub fn id(&self) -> ElementId {
        ElementId(self.eid.clone())
    }

    pub fn is_checked(&self) -> bool {
        self.aria_checked.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Status messages published while a tab is being worked on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Idle { url: String },
    Skipped { url: String, reason: SkipReason },
    Matched { url: String, label: String },
    EmailToggled { count: usize },
    FieldFilled { position: usize },
    FieldMissing { position: usize, available: usize },
    SubmitClicked { attempt: u32 },
    SubmitNotFound { attempts: u32 },
    Confirmed { url: String },
    Unconfirmed { polls: u32 },
    CloseRequested,
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Idle { .. } => "idle",
            RunEvent::Skipped { .. } => "skipped",
            RunEvent::Matched { .. } => "matched",
            RunEvent::EmailToggled { .. } => "email_toggled",
            RunEvent::FieldFilled { .. } => "field_filled",
            RunEvent::FieldMissing { .. } => "field_missing",
            RunEvent::SubmitClicked { .. } => "submit_clicked",
            RunEvent::SubmitNotFound { .. } => "submit_not_found",
            RunEvent::Confirmed { .. } => "confirmed",
            RunEvent::Unconfirmed { .. } => "unconfirmed",
            RunEvent::CloseRequested => "close_requested",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoProfile,
    NoMatchingTarget,
}

/// How one run on a page load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a page this agent acts on.
    Idle,
    Skipped(SkipReason),
    /// No submit control within the scan ceiling.
    Abandoned,
    /// Clicked, but the confirmation page never showed up.
    Unconfirmed,
    /// Confirmation seen and the close request went out.
    Closed,
    /// The page stopped answering mid-run.
    Aborted,
}
