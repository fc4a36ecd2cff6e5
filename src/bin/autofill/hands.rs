use anyhow::{Context, Result, anyhow};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attached browsers stay connected while the agent runs; tabs can sit idle
/// for a long time between forms.
const ATTACHED_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserVersion {
    web_socket_debugger_url: String,
}

/// The browser the agent works in. Created once, shared by every tab run.
#[derive(Clone)]
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    /// Attach to a browser listening on `endpoint`, else launch one.
    pub async fn launch(endpoint: &str) -> Result<Self> {
        match debugger_url(endpoint).await {
            Ok(ws_url) => {
                info!(%endpoint, "attaching to running browser");
                let browser = tokio::task::spawn_blocking(move || {
                    Browser::connect_with_timeout(ws_url, ATTACHED_IDLE_TIMEOUT)
                })
                .await
                .map_err(|e| anyhow!("attach task panicked: {e}"))?
                .context("attaching to browser")?;
                return Ok(Self { browser });
            }
            Err(e) => warn!(%endpoint, error = %e, "no browser to attach to, launching one"),
        }

        let profile = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("no local data directory"))?
            .join("form-autofill")
            .join("profile");
        std::fs::create_dir_all(&profile)
            .with_context(|| format!("creating browser profile at {}", profile.display()))?;

        let browser = tokio::task::spawn_blocking(move || {
            let options = LaunchOptions {
                headless: false,
                user_data_dir: Some(profile),
                args: vec![
                    std::ffi::OsStr::new("--no-first-run"),
                    std::ffi::OsStr::new("--no-default-browser-check"),
                    std::ffi::OsStr::new("--password-store=basic"),
                ],
                idle_browser_timeout: ATTACHED_IDLE_TIMEOUT,
                ..Default::default()
            };
            Browser::new(options)
        })
        .await
        .map_err(|e| anyhow!("launch task panicked: {e}"))?
        .context("launching browser")?;

        info!("browser launched");
        Ok(Self { browser })
    }

    /// Snapshot of the open tabs.
    pub fn tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|_| anyhow!("browser tab list poisoned"))?;
        Ok(tabs.clone())
    }

    pub async fn open(&self, url: String) -> Result<Arc<Tab>> {
        let browser = self.browser.clone();
        tokio::task::spawn_blocking(move || {
            let tab = browser.new_tab()?;
            tab.navigate_to(&url)?;
            Ok::<_, anyhow::Error>(tab)
        })
        .await
        .map_err(|e| anyhow!("open task panicked: {e}"))?
    }

    /// Close the tab with this target id. `false` if it is already gone.
    pub async fn close(&self, target_id: &str) -> Result<bool> {
        let Some(tab) = self
            .tabs()?
            .into_iter()
            .find(|t| t.get_target_id() == target_id)
        else {
            return Ok(false);
        };
        tokio::task::spawn_blocking(move || tab.close(true))
            .await
            .map_err(|e| anyhow!("close task panicked: {e}"))?
    }
}

/// Websocket URL of the DevTools endpoint at `endpoint` (http form).
async fn debugger_url(endpoint: &str) -> Result<String> {
    let version: BrowserVersion = reqwest::get(format!("{}/json/version", endpoint.trim_end_matches('/')))
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(version.web_socket_debugger_url)
}
