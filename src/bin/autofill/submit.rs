use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::page::Page;
use crate::types::{ElementId, ElementSnapshot, MAX_SUBMIT_SCANS, SUBMIT_RETRY_INTERVAL};
use form_autofill::urls::PageKind;

/// Bounded retry schedule for the submit scan.
#[derive(Debug, Clone)]
pub struct SearchLoop {
    attempts: u32,
    ceiling: u32,
    interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    Retry(Duration),
    Exhausted,
}

impl Default for SearchLoop {
    fn default() -> Self {
        Self::new(MAX_SUBMIT_SCANS, SUBMIT_RETRY_INTERVAL)
    }
}

impl SearchLoop {
    pub fn new(ceiling: u32, interval: Duration) -> Self {
        Self {
            attempts: 0,
            ceiling,
            interval,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// What to do after the current attempt found nothing.
    pub fn after_miss(&self) -> SearchStep {
        if self.attempts < self.ceiling {
            SearchStep::Retry(self.interval)
        } else {
            SearchStep::Exhausted
        }
    }
}

/// First submit-labelled element in document order, widened to its
/// clickable container when it has one.
pub fn find_submit_target(elements: &[ElementSnapshot]) -> Option<ElementId> {
    let matched = elements.iter().find(|el| classify(el).is_submit_control)?;
    let target = matched.clickable_eid.as_ref().unwrap_or(&matched.eid);
    Some(ElementId(target.clone()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Clicked { attempt: u32, target: ElementId },
    /// The page reached the confirmation URL before anything was found.
    AlreadyConfirmed { url: String },
    Exhausted { attempts: u32 },
}

/// Scan for the submit control until it is clicked or the loop runs out.
pub async fn drive_submission(page: &dyn Page, search: &mut SearchLoop) -> Result<SubmitOutcome> {
    loop {
        let attempt = search.begin_attempt();

        let url = page.url().await?;
        if PageKind::of(&url) == PageKind::Confirmation {
            info!(attempt, "page already on confirmation URL, skipping submit scan");
            return Ok(SubmitOutcome::AlreadyConfirmed { url });
        }

        let elements = page.scan().await?;
        if let Some(target) = find_submit_target(&elements) {
            info!(attempt, eid = %target, "submit control found, clicking");
            page.highlight(&target).await?;
            let at = page.center_of(&target).await?;
            page.dispatch_pointer_sequence(&target, at).await?;
            return Ok(SubmitOutcome::Clicked { attempt, target });
        }

        match search.after_miss() {
            SearchStep::Retry(wait) => {
                debug!(attempt, ceiling = search.ceiling, "submit control not found yet");
                tokio::time::sleep(wait).await;
            }
            SearchStep::Exhausted => {
                warn!(attempts = attempt, "gave up looking for the submit control");
                return Ok(SubmitOutcome::Exhausted { attempts: attempt });
            }
        }
    }
}
