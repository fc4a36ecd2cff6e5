use std::time::Duration;
use tracing::{debug, info, warn};

use crate::page::Page;
use crate::types::{CONFIRM_POLL_INTERVAL, MAX_CONFIRM_POLLS};
use form_autofill::urls::PageKind;

/// Bounded URL polling after the submit click.
#[derive(Debug, Clone)]
pub struct PollLoop {
    polls: u32,
    ceiling: u32,
    interval: Duration,
}

impl Default for PollLoop {
    fn default() -> Self {
        Self::new(MAX_CONFIRM_POLLS, CONFIRM_POLL_INTERVAL)
    }
}

impl PollLoop {
    pub fn new(ceiling: u32, interval: Duration) -> Self {
        Self {
            polls: 0,
            ceiling,
            interval,
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Wait one interval and count a poll; `false` once the ceiling is spent.
    pub async fn tick(&mut self) -> bool {
        if self.polls >= self.ceiling {
            return false;
        }
        tokio::time::sleep(self.interval).await;
        self.polls += 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Confirmed { url: String, polls: u32 },
    TimedOut { polls: u32 },
}

/// Poll the page URL until it shows the confirmation marker.
///
/// A failed URL read counts as "not yet"; the tab may be mid-navigation.
pub async fn await_confirmation(page: &dyn Page, poll: &mut PollLoop) -> Completion {
    while poll.tick().await {
        match page.url().await {
            Ok(url) if PageKind::of(&url) == PageKind::Confirmation => {
                info!(polls = poll.polls(), %url, "submission confirmed");
                return Completion::Confirmed {
                    url,
                    polls: poll.polls(),
                };
            }
            Ok(url) => debug!(polls = poll.polls(), %url, "not confirmed yet"),
            Err(e) => debug!(polls = poll.polls(), error = %e, "could not read URL"),
        }
    }
    warn!(polls = poll.polls(), "submission not confirmed in time, leaving tab open");
    Completion::TimedOut {
        polls: poll.polls(),
    }
}
