use crate::config::Pacing;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on scroll rounds, in case the page keeps growing forever
const MAX_SCROLLS: usize = 500;

/// Headless Chrome used to render the lazy-loading search page
pub struct SearchPageRenderer {
    browser: Browser,
    pacing: Pacing,
}

/// Open tab that is closed when dropped, whichever way the render exits
struct TabSession {
    tab: Arc<Tab>,
}

impl TabSession {
    fn open(browser: &Browser) -> Result<Self> {
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        Ok(Self { tab })
    }
}

impl std::ops::Deref for TabSession {
    type Target = Tab;

    fn deref(&self) -> &Tab {
        &self.tab
    }
}

impl Drop for TabSession {
    fn drop(&mut self) {
        match self.tab.close(true) {
            Ok(_) => debug!("Closed browser tab"),
            Err(e) => warn!("Failed to close browser tab: {e:#}"),
        }
    }
}

impl SearchPageRenderer {
    /// Launch headless Chrome
    pub fn launch(pacing: Pacing) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, pacing })
    }

    /// Load `url`, scroll until no more listings appear, return the page source
    pub fn render(&self, url: &str) -> Result<String> {
        info!("Opening search page {url}");
        let tab = TabSession::open(&self.browser)?;

        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))?;
        tab.wait_until_navigated()?;

        info!("Waiting for page to fully load...");
        thread::sleep(Pacing::jitter(self.pacing.initial_load_ms));

        self.scroll_to_bottom(&tab)?;

        thread::sleep(Pacing::jitter(self.pacing.before_capture_ms));

        let html = tab.get_content().context("Failed to capture page source")?;
        info!("Captured search page ({} bytes)", html.len());

        Ok(html)
    }

    fn scroll_to_bottom(&self, tab: &Tab) -> Result<()> {
        let pause = Duration::from_millis(self.pacing.scroll_pause_ms);
        let mut last_height = scroll_height(tab)?;

        for round in 1..=MAX_SCROLLS {
            tab.evaluate("window.scrollTo(0, document.body.scrollHeight);", false)?;
            thread::sleep(pause);

            let new_height = scroll_height(tab)?;
            debug!("Scroll {round}: height {last_height} -> {new_height}");
            if new_height == last_height {
                return Ok(());
            }
            last_height = new_height;
        }

        warn!("Page still growing after {MAX_SCROLLS} scrolls, capturing anyway");
        Ok(())
    }
}

fn scroll_height(tab: &Tab) -> Result<f64> {
    let result = tab
        .evaluate("document.body.scrollHeight", false)
        .context("Failed to read scroll height")?;
    Ok(result.value.and_then(|v| v.as_f64()).unwrap_or_default())
}
