//! One run of the automation against a single page load.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::host::{CloseRequest, HostLink, TabFlags};
use crate::injector::{FillResult, fill_field};
use crate::locator::activate_email_toggles;
use crate::monitor::{Completion, PollLoop, await_confirmation};
use crate::page::Page;
use crate::submit::{SearchLoop, SubmitOutcome, drive_submission};
use crate::types::{INJECT_DELAY, Outcome, RunEvent, SETTLE_DELAY, SUBMIT_DELAY, SkipReason};
use form_autofill::urls::PageKind;
use form_autofill::{ConfigStore, TargetRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Detecting,
    Submitting,
    Monitoring,
    Done,
}

/// State of one run; dropped when the run ends.
#[derive(Debug, Default)]
pub struct RunContext {
    pub target: Option<TargetRecord>,
    pub profile_name: Option<String>,
    pub search: SearchLoop,
    pub poll: PollLoop,
}

pub struct Controller {
    page: Arc<dyn Page>,
    store: ConfigStore,
    host: HostLink,
    flags: Arc<TabFlags>,
    events: broadcast::Sender<RunEvent>,
    phase: Phase,
    ctx: RunContext,
}

impl Controller {
    pub fn new(
        page: Arc<dyn Page>,
        store: ConfigStore,
        host: HostLink,
        flags: Arc<TabFlags>,
        events: broadcast::Sender<RunEvent>,
    ) -> Self {
        Self {
            page,
            store,
            host,
            flags,
            events,
            phase: Phase::Idle,
            ctx: RunContext::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the page to completion. Page failures end the run quietly.
    pub async fn run(&mut self) -> Outcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, phase = ?self.phase(), "page stopped responding, abandoning run");
                Outcome::Aborted
            }
        };
        if matches!(
            outcome,
            Outcome::Unconfirmed | Outcome::Abandoned | Outcome::Aborted
        ) {
            self.flags.clear_submission();
        }
        self.enter(Phase::Done);
        debug!(
            ?outcome,
            target = self.ctx.target.as_ref().map(|t| t.display_label.as_str()),
            has_profile = self.ctx.profile_name.is_some(),
            submit_scans = self.ctx.search.attempts(),
            confirm_polls = self.ctx.poll.polls(),
            "run summary"
        );
        outcome
    }

    async fn drive(&mut self) -> Result<Outcome> {
        let url = self.page.url().await?;
        match PageKind::of(&url) {
            PageKind::Confirmation => return Ok(self.complete(url).await),
            PageKind::Other => {
                debug!(%url, "not a form page");
                self.emit(RunEvent::Idle { url });
                return Ok(Outcome::Idle);
            }
            PageKind::Form => self.flags.reset(),
        }

        sleep(SETTLE_DELAY).await;
        self.enter(Phase::Detecting);

        let url = self.page.url().await?;
        let config = self.store.get().await;
        let Some(name) = config.profile_name() else {
            info!("no profile name configured, skipping");
            return Ok(self.skip(url, SkipReason::NoProfile));
        };
        let Some(target) = config.target_for(&url) else {
            info!(%url, "no configured target matches this page");
            return Ok(self.skip(url, SkipReason::NoMatchingTarget));
        };
        info!(label = %target.display_label, "target matched, filling form");
        self.emit(RunEvent::Matched {
            url: url.clone(),
            label: target.display_label.clone(),
        });
        self.ctx.profile_name = Some(name.to_string());
        self.ctx.target = Some(target.clone());

        self.enter(Phase::Submitting);
        let target = target.clone();
        let name = name.to_string();

        if target.record_email_toggle {
            match activate_email_toggles(self.page.as_ref()).await {
                Ok(count) => self.emit(RunEvent::EmailToggled { count }),
                Err(e) => warn!(error = %e, "email toggle step failed"),
            }
        }

        sleep(INJECT_DELAY).await;
        let position = target.field_position;
        match fill_field(self.page.as_ref(), position, &name).await {
            Ok(FillResult::Filled(_)) => self.emit(RunEvent::FieldFilled { position }),
            Ok(FillResult::Missing { available }) => {
                self.emit(RunEvent::FieldMissing {
                    position,
                    available,
                });
            }
            Err(e) => warn!(error = %e, position, "could not write profile name"),
        }

        sleep(SUBMIT_DELAY).await;
        match drive_submission(self.page.as_ref(), &mut self.ctx.search).await? {
            SubmitOutcome::Clicked { attempt, .. } => {
                self.flags.mark_submitted();
                self.emit(RunEvent::SubmitClicked { attempt });
            }
            SubmitOutcome::AlreadyConfirmed { url } => {
                self.flags.mark_submitted();
                return Ok(self.complete(url).await);
            }
            SubmitOutcome::Exhausted { attempts } => {
                self.emit(RunEvent::SubmitNotFound { attempts });
                return Ok(Outcome::Abandoned);
            }
        }

        self.enter(Phase::Monitoring);
        match await_confirmation(self.page.as_ref(), &mut self.ctx.poll).await {
            Completion::Confirmed { url, .. } => Ok(self.complete(url).await),
            Completion::TimedOut { polls } => {
                self.emit(RunEvent::Unconfirmed { polls });
                Ok(Outcome::Unconfirmed)
            }
        }
    }

    /// The page is on the confirmation URL.
    async fn complete(&mut self, url: String) -> Outcome {
        if !self.flags.submission_attempted() {
            debug!(%url, "confirmation page was not reached through this agent");
            self.emit(RunEvent::Idle { url });
            return Outcome::Idle;
        }
        if self.flags.completed() {
            debug!(%url, "tab already handled");
            return Outcome::Idle;
        }

        self.emit(RunEvent::Confirmed { url });
        match self.host.request_close(&self.flags, self.page.as_ref()).await {
            CloseRequest::Sent | CloseRequest::Broadcast => {
                self.emit(RunEvent::CloseRequested);
                Outcome::Closed
            }
            CloseRequest::Dropped => Outcome::Aborted,
            CloseRequest::NotSubmitted | CloseRequest::AlreadyRequested => Outcome::Idle,
        }
    }

    fn skip(&mut self, url: String, reason: SkipReason) -> Outcome {
        self.emit(RunEvent::Skipped { url, reason });
        Outcome::Skipped(reason)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    fn emit(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }
}
