//! Rendered-page fetching through a W3C WebDriver endpoint such as
//! chromedriver. One browser session per fetch; the session is quit on every
//! exit path, including navigation failures and timeouts.

use std::time::Instant;

use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tokio::runtime::Runtime;

use crate::config::FetchConfig;
use crate::error::RetrievalError;
use crate::fetch::Fetcher;

const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
    "--disable-blink-features=AutomationControlled",
];

/// Blocking [`Fetcher`] over `thirtyfour`; drives its own tokio runtime so it
/// can be called from the sequential loop or rayon workers alike.
pub struct WebDriverFetcher {
    runtime: Runtime,
    endpoint: String,
    config: FetchConfig,
}

impl WebDriverFetcher {
    pub fn new(endpoint: impl Into<String>, config: FetchConfig) -> Result<Self, RetrievalError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|err| RetrievalError::WebDriver {
                url: endpoint.clone(),
                step: "runtime",
                reason: err.to_string(),
            })?;
        Ok(Self {
            runtime,
            endpoint,
            config,
        })
    }

    async fn fetch_rendered(&self, url: &str) -> Result<String, RetrievalError> {
        let mut caps = DesiredCapabilities::chrome();
        let args = CHROME_ARGS
            .iter()
            .map(|a| a.to_string())
            .chain(std::iter::once(format!("user-agent={}", self.config.user_agent)))
            .collect::<Vec<_>>();
        caps.add_chrome_option("args", args)
            .map_err(step_error(url, "capabilities"))?;
        let driver = WebDriver::new(&self.endpoint, caps)
            .await
            .map_err(step_error(url, "new session"))?;

        let result = self.render(&driver, url).await;

        if let Err(err) = driver.quit().await {
            tracing::warn!(url, error = %err, "failed to close webdriver session");
        }
        result
    }

    async fn render(&self, driver: &WebDriver, url: &str) -> Result<String, RetrievalError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let not_ready = || RetrievalError::NotReady {
            url: url.to_string(),
            waited: started.elapsed(),
        };

        match tokio::time::timeout(self.config.timeout, driver.goto(url)).await {
            Ok(navigated) => navigated.map_err(step_error(url, "navigate"))?,
            Err(_) => return Err(not_ready()),
        }

        let Some(marker) = self.config.ready_marker.as_deref() else {
            tokio::time::sleep(self.config.settle_delay).await;
            return driver.source().await.map_err(step_error(url, "page source"));
        };

        loop {
            let html = driver
                .source()
                .await
                .map_err(step_error(url, "page source"))?;
            if html.contains(marker) {
                tracing::debug!(url, waited_ms = started.elapsed().as_millis() as u64, "page ready");
                return Ok(html);
            }
            if Instant::now() + self.config.poll_interval > deadline {
                return Err(not_ready());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl Fetcher for WebDriverFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        self.runtime.block_on(self.fetch_rendered(url))
    }
}

fn step_error<'a>(url: &'a str, step: &'static str) -> impl Fn(WebDriverError) -> RetrievalError + 'a {
    move |err| RetrievalError::WebDriver {
        url: url.to_string(),
        step,
        reason: err.to_string(),
    }
}
