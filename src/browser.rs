//! Shared headless-browser session.
//!
//! One Chromium process and one page, launched on first use and reused until
//! [`BrowserSession::shutdown`]. Every navigation holds the session lock, so
//! the single page is never driven by two callers at once.
//!
//! A failed launch is remembered: later calls fail fast instead of trying to
//! spawn the browser again, and the scrape provider treats that as "no data".
//!
//! The session counts as alive while the CDP event stream is open. When
//! Chromium exits on its own the stream ends, the session reports not alive,
//! and the next use launches a fresh process.

use crate::config::ServiceConfig;
use crate::error::{CiteError, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Poll period while waiting for a selector to render
const SELECTOR_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
}

impl From<&ServiceConfig> for BrowserSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            navigation_timeout: config.navigation_timeout,
        }
    }
}

/// HTML of a rendered page and whether the awaited selector showed up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
    pub selector_found: bool,
}

struct LiveBrowser {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

pub struct BrowserSession {
    settings: BrowserSettings,
    live: Mutex<Option<LiveBrowser>>,
    alive: Arc<AtomicBool>,
    launch_failed: AtomicBool,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("settings", &self.settings)
            .field("alive", &self.is_alive())
            .field("launch_failed", &self.is_disabled())
            .finish()
    }
}

impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            live: Mutex::new(None),
            alive: Arc::new(AtomicBool::new(false)),
            launch_failed: AtomicBool::new(false),
        }
    }

    /// Whether a browser process is running and still connected.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether a launch attempt failed; no further launches are attempted.
    pub fn is_disabled(&self) -> bool {
        self.launch_failed.load(Ordering::SeqCst)
    }

    /// Launch the browser if it is not running yet. Idempotent.
    pub async fn ensure_started(&self) -> Result<()> {
        let mut live = self.live.lock().await;
        self.start_locked(&mut live).await
    }

    async fn start_locked(&self, live: &mut Option<LiveBrowser>) -> Result<()> {
        if live.is_some() {
            if self.is_alive() {
                return Ok(());
            }
            if let Some(dead) = live.take() {
                warn!("Browser connection lost, relaunching");
                dead.handler.abort();
            }
        }
        if self.is_disabled() {
            return Err(CiteError::Browser("browser launch failed earlier".to_string()));
        }

        match self.launch().await {
            Ok(browser) => {
                *live = Some(browser);
                Ok(())
            }
            Err(e) => {
                self.launch_failed.store(true, Ordering::SeqCst);
                error!(error = %e, "Browser launch failed, scrape provider disabled");
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<LiveBrowser> {
        info!(headless = self.settings.headless, "Launching headless browser");

        let mut builder = BrowserConfig::builder()
            .request_timeout(self.settings.navigation_timeout)
            .args(vec![
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                format!("--user-agent={}", self.settings.user_agent),
            ]);
        if self.settings.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| CiteError::Browser(format!("invalid browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| CiteError::Browser(format!("launch failed: {}", e)))?;

        // CDP events must be drained for the browser to make progress
        self.alive.store(true, Ordering::SeqCst);
        let handler = spawn_event_drain(handler, Arc::clone(&self.alive));

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                self.alive.store(false, Ordering::SeqCst);
                return Err(CiteError::Browser(format!("failed to open page: {}", e)));
            }
        };

        debug!("Browser ready");
        Ok(LiveBrowser {
            browser,
            page,
            handler,
        })
    }

    /// Navigate to `url` and return the page HTML once `selector` is present.
    ///
    /// When the selector does not appear within `wait` the page is still
    /// returned, with `selector_found` unset, so callers can inspect it.
    pub async fn render(&self, url: &str, selector: &str, wait: Duration) -> Result<RenderedPage> {
        let mut guard = self.live.lock().await;
        self.start_locked(&mut guard).await?;
        let Some(live) = guard.as_ref() else {
            return Err(CiteError::Browser("browser not running".to_string()));
        };

        let started = Instant::now();
        timeout(self.settings.navigation_timeout, live.page.goto(url))
            .await
            .map_err(|_| CiteError::Browser(format!("navigation timed out: {}", url)))?
            .map_err(|e| CiteError::Browser(format!("navigation failed: {}", e)))?;

        let appeared = timeout(wait, async {
            loop {
                if live.page.find_element(selector).await.is_ok() {
                    break;
                }
                sleep(SELECTOR_POLL).await;
            }
        })
        .await
        .is_ok();

        if !appeared {
            warn!(selector = selector, "Result element did not render in time");
        }

        let html = live
            .page
            .content()
            .await
            .map_err(|e| CiteError::Browser(format!("failed to read page: {}", e)))?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Page rendered");
        Ok(RenderedPage {
            html,
            selector_found: appeared,
        })
    }

    /// Close the browser process. Safe to call repeatedly or before any launch.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        let Some(mut running) = live.take() else {
            return;
        };

        info!("Shutting down headless browser");
        if let Err(e) = running.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = running.browser.wait().await {
            warn!(error = %e, "Browser process wait failed");
        }
        running.handler.abort();
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Drive the CDP event stream until it ends or errors, then clear `alive`.
fn spawn_event_drain<S, T, E>(mut events: S, alive: Arc<AtomicBool>) -> JoinHandle<()>
where
    S: Stream<Item = std::result::Result<T, E>> + Send + Unpin + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = event {
                warn!(error = %e, "Browser event stream failed");
                break;
            }
        }
        alive.store(false, Ordering::SeqCst);
        debug!("Browser event stream closed");
    })
}
