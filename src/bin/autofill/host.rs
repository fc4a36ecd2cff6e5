//! Close-tab requests from a run to the host loop that owns the browser.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::page::Page;
use crate::types::CLOSE_TAB_ACTION;

/// Wire shape of a request: nothing but the action tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequest {
    pub action: String,
}

impl HostRequest {
    pub fn close_tab() -> Self {
        Self {
            action: CLOSE_TAB_ACTION.to_string(),
        }
    }

    pub fn is_close_tab(&self) -> bool {
        self.action == CLOSE_TAB_ACTION
    }
}

/// A request together with the tab that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
    pub sender: String,
    pub request: HostRequest,
}

/// Per-tab flags that outlive a single run but never leave the process.
#[derive(Debug, Default)]
pub struct TabFlags {
    submission_attempted: AtomicBool,
    completed: AtomicBool,
}

impl TabFlags {
    pub fn mark_submitted(&self) {
        self.submission_attempted.store(true, Ordering::SeqCst);
    }

    pub fn submission_attempted(&self) -> bool {
        self.submission_attempted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Forget a submission that never reached the confirmation page, so a
    /// later manual submit does not close the tab.
    pub fn clear_submission(&self) {
        self.submission_attempted.store(false, Ordering::SeqCst);
    }

    /// Start over for a fresh form load.
    pub fn reset(&self) {
        self.submission_attempted.store(false, Ordering::SeqCst);
        self.completed.store(false, Ordering::SeqCst);
    }

    /// Mark completed; `false` if it already was.
    fn complete(&self) -> bool {
        !self.completed.swap(true, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    Sent,
    /// The host was unreachable; an in-page message went out instead.
    Broadcast,
    /// Nothing sent, the fallback failed too.
    Dropped,
    /// This tab never submitted through the agent.
    NotSubmitted,
    AlreadyRequested,
}

/// A run's handle on the host loop.
#[derive(Debug, Clone)]
pub struct HostLink {
    tab_id: String,
    tx: mpsc::Sender<HostMessage>,
}

impl HostLink {
    pub fn new(tab_id: impl Into<String>, tx: mpsc::Sender<HostMessage>) -> Self {
        Self {
            tab_id: tab_id.into(),
            tx,
        }
    }

    /// Ask the host to close this tab. Never fails; every problem is logged.
    pub async fn request_close(&self, flags: &TabFlags, page: &dyn Page) -> CloseRequest {
        if !flags.submission_attempted() {
            debug!(tab = %self.tab_id, "no submission from this tab, not closing it");
            return CloseRequest::NotSubmitted;
        }
        if !flags.complete() {
            debug!(tab = %self.tab_id, "close already requested");
            return CloseRequest::AlreadyRequested;
        }

        let message = HostMessage {
            sender: self.tab_id.clone(),
            request: HostRequest::close_tab(),
        };
        match self.tx.send(message).await {
            Ok(()) => {
                info!(tab = %self.tab_id, "close-tab request sent");
                CloseRequest::Sent
            }
            Err(e) => {
                warn!(tab = %self.tab_id, error = %e, "host unreachable, broadcasting in page");
                match page.post_message(&json!({ "action": CLOSE_TAB_ACTION })).await {
                    Ok(()) => CloseRequest::Broadcast,
                    Err(e) => {
                        warn!(tab = %self.tab_id, error = %e, "in-page broadcast failed too");
                        CloseRequest::Dropped
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixturePage;

    fn page() -> FixturePage {
        FixturePage::from_html("https://x/formResponse", "")
    }

    #[test]
    fn request_serializes_to_action_tag_only() {
        let value = serde_json::to_value(HostRequest::close_tab()).unwrap();
        assert_eq!(value, json!({ "action": "closeTab" }));
    }

    #[tokio::test]
    async fn refuses_without_submission() {
        let (tx, mut rx) = mpsc::channel(4);
        let link = HostLink::new("tab-1", tx);
        let flags = TabFlags::default();

        assert_eq!(link.request_close(&flags, &page()).await, CloseRequest::NotSubmitted);
        assert!(rx.try_recv().is_err());
        assert!(!flags.completed());
    }

    #[tokio::test]
    async fn sends_once_per_tab() {
        let (tx, mut rx) = mpsc::channel(4);
        let link = HostLink::new("tab-1", tx);
        let flags = TabFlags::default();
        flags.mark_submitted();

        assert_eq!(link.request_close(&flags, &page()).await, CloseRequest::Sent);
        assert_eq!(
            link.request_close(&flags, &page()).await,
            CloseRequest::AlreadyRequested
        );

        let message = rx.try_recv().unwrap();
        assert_eq!(message.sender, "tab-1");
        assert!(message.request.is_close_tab());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn falls_back_to_page_broadcast() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let link = HostLink::new("tab-1", tx);
        let flags = TabFlags::default();
        flags.mark_submitted();
        let page = page();

        assert_eq!(link.request_close(&flags, &page).await, CloseRequest::Broadcast);
        assert_eq!(page.posted(), [json!({ "action": "closeTab" })]);
    }
}
