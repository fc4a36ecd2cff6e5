use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dom::ChromePage;
use crate::hands::BrowserSession;
use crate::host::{HostLink, HostMessage, TabFlags};
use crate::lifecycle::Controller;
use crate::page::Page;
use crate::types::{Outcome, RunEvent};
use form_autofill::ConfigStore;

/// One document load in a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageLoad {
    url: String,
    load_id: String,
}

#[derive(Default)]
struct TabSession {
    last_load: Option<PageLoad>,
    flags: Arc<TabFlags>,
    run: Option<JoinHandle<Outcome>>,
}

impl TabSession {
    fn busy(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_finished())
    }
}

/// Starts one run per page load on every tab the browser has open.
pub struct TabWatcher {
    sessions: HashMap<String, TabSession>,
    store: ConfigStore,
    host_tx: mpsc::Sender<HostMessage>,
    events: broadcast::Sender<RunEvent>,
}

impl TabWatcher {
    pub fn new(
        store: ConfigStore,
        host_tx: mpsc::Sender<HostMessage>,
        events: broadcast::Sender<RunEvent>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            store,
            host_tx,
            events,
        }
    }

    pub async fn refresh(&mut self, browser: &BrowserSession) -> Result<()> {
        let tabs = browser.tabs()?;
        let mut live = HashSet::new();
        for tab in tabs {
            let id = tab.get_target_id().clone();
            self.visit(&id, Arc::new(ChromePage::new(tab))).await;
            live.insert(id);
        }
        self.forget_closed(&live);
        Ok(())
    }

    /// Start a run on `page` when it shows a load this tab has not run on yet.
    async fn visit(&mut self, tab_id: &str, page: Arc<dyn Page>) {
        if self.sessions.get(tab_id).is_some_and(TabSession::busy) {
            return;
        }
        let load = match current_load(page.as_ref()).await {
            Ok(load) => load,
            Err(e) => {
                debug!(tab = %tab_id, error = %e, "could not identify page load");
                return;
            }
        };
        if let Some(flags) = self.observe(tab_id, load) {
            self.start(tab_id, page, flags);
        }
    }

    /// Record that `tab_id` shows `load`. Returns the tab's flags when a new
    /// run should start: the load is new and nothing is running there.
    fn observe(&mut self, tab_id: &str, load: PageLoad) -> Option<Arc<TabFlags>> {
        let session = self.sessions.entry(tab_id.to_string()).or_default();
        if session.busy() || session.last_load.as_ref() == Some(&load) {
            return None;
        }
        debug!(tab = %tab_id, url = %load.url, load = %load.load_id, "new page load");
        session.last_load = Some(load);
        Some(session.flags.clone())
    }

    fn start(&mut self, tab_id: &str, page: Arc<dyn Page>, flags: Arc<TabFlags>) {
        let host = HostLink::new(tab_id, self.host_tx.clone());
        let mut controller =
            Controller::new(page, self.store.clone(), host, flags, self.events.clone());
        let tab = tab_id.to_string();
        let run = tokio::spawn(async move {
            let outcome = controller.run().await;
            debug!(%tab, ?outcome, "run finished");
            outcome
        });
        if let Some(session) = self.sessions.get_mut(tab_id) {
            session.run = Some(run);
        }
    }

    fn forget_closed(&mut self, live: &HashSet<String>) {
        self.sessions.retain(|id, _| {
            let keep = live.contains(id);
            if !keep {
                info!(tab = %id, "tab closed");
            }
            keep
        });
    }
}

async fn current_load(page: &dyn Page) -> Result<PageLoad> {
    Ok(PageLoad {
        url: page.url().await?,
        load_id: page.load_id().await?,
    })
}
