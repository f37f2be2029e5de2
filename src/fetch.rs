use std::collections::HashMap;
use std::thread;
use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::config::FetchConfig;
use crate::error::RetrievalError;

/// Retrieves fully rendered page markup for a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        (**self).fetch(url)
    }
}

pub fn http_client(config: &FetchConfig) -> Result<Client, RetrievalError> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|source| RetrievalError::Http {
            url: String::new(),
            source,
        })
}

/// Plain HTTP GET. Suitable when the tables are in the served HTML. With a
/// ready marker configured, a body without it is [`RetrievalError::NotReady`];
/// without one, the settle delay is waited instead.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, RetrievalError> {
        Ok(Self {
            client: http_client(&config)?,
            config,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        let started = Instant::now();
        let http_err = |source| RetrievalError::Http {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().map_err(http_err)?;
        match self.config.ready_marker.as_deref() {
            None => thread::sleep(self.config.settle_delay),
            Some(marker) if !body.contains(marker) => {
                return Err(RetrievalError::NotReady {
                    url: url.to_string(),
                    waited: started.elapsed(),
                });
            }
            Some(_) => {}
        }
        Ok(body)
    }
}

/// Serves canned pages by URL; unknown URLs fail like a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| RetrievalError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
