mod classify;
mod dom;
#[cfg(test)]
mod fixture;
mod hands;
mod host;
mod injector;
mod lifecycle;
mod locator;
mod monitor;
mod page;
mod panel;
mod submit;
mod types;
mod watcher;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use form_autofill::{ConfigStore, StorageData, targets, urls};
use hands::BrowserSession;
use host::HostMessage;
use panel::PanelState;
use types::TAB_WATCH_INTERVAL;
use watcher::TabWatcher;

/// Fill and submit the configured Google Forms in a Chrome window.
#[derive(Parser)]
#[command(name = "autofill", version)]
struct Args {
    /// DevTools endpoint of a running Chrome; one is launched if nothing answers.
    #[arg(long, env = "FORM_AUTOFILL_CDP", default_value = "http://127.0.0.1:9222")]
    cdp_endpoint: String,

    /// First port tried for the local panel.
    #[arg(long, env = "FORM_AUTOFILL_PANEL_PORT", default_value_t = 3000)]
    panel_port: u16,

    /// Open a configured form at startup, by id or label.
    #[arg(long = "open", value_name = "ID|LABEL")]
    open: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = ConfigStore::from_env().context("locating config file")?;
    info!(path = %store.path().display(), "using config");

    let (events, _) = broadcast::channel(64);
    panel::start_server(
        PanelState {
            store: store.clone(),
            events: events.clone(),
        },
        args.panel_port,
    )
    .await?;

    let session = BrowserSession::launch(&args.cdp_endpoint).await?;
    open_requested(&session, &store, &args.open).await;

    let (host_tx, mut host_rx) = mpsc::channel::<HostMessage>(16);
    let mut watcher = TabWatcher::new(store, host_tx, events);
    let mut ticker = tokio::time::interval(TAB_WATCH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("watching tabs");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = watcher.refresh(&session).await {
                    error!(error = %e, "tab refresh failed");
                }
            }
            Some(message) = host_rx.recv() => handle_host_message(&session, message).await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

async fn open_requested(session: &BrowserSession, store: &ConfigStore, wanted: &[String]) {
    if wanted.is_empty() {
        return;
    }
    for (label, url) in forms_to_open(&store.get().await, wanted) {
        match session.open(url.clone()).await {
            Ok(_) => info!(%label, %url, "opened form"),
            Err(e) => error!(%url, error = %e, "could not open form"),
        }
    }
}

/// Label and URL of every requested form. Nothing opens without a profile
/// name, since the run on it would only skip.
fn forms_to_open(data: &StorageData, wanted: &[String]) -> Vec<(String, String)> {
    if data.profile_name().is_none() {
        warn!("no profile name configured, not opening forms; set one first");
        return Vec::new();
    }
    wanted
        .iter()
        .filter_map(|key| match targets::find(&data.targets, key) {
            Some(target) => Some((target.display_label.clone(), urls::form_url(&target.match_key))),
            None => {
                warn!(%key, "no configured form with that id or label");
                None
            }
        })
        .collect()
}

async fn handle_host_message(session: &BrowserSession, message: HostMessage) {
    if !message.request.is_close_tab() {
        warn!(action = %message.request.action, "ignoring unknown host request");
        return;
    }
    match session.close(&message.sender).await {
        Ok(true) => info!(tab = %message.sender, "closed tab"),
        Ok(false) => info!(tab = %message.sender, "tab already gone"),
        Err(e) => error!(tab = %message.sender, error = %e, "could not close tab"),
    }
}
