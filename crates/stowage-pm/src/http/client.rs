//! Blocking HTTP client for package downloads.
//!
//! Wraps `reqwest::blocking` with:
//! - Automatic retry with exponential backoff on 5xx and 429
//! - The package API key attached as the `api_key` query parameter
//! - Timeouts, user agent and proxy taken from [`Config`]
//!
//! # Examples
//!
//! ```no_run
//! use stowage_pm::http::{HttpClient, HttpClientConfig, Transport};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::new()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_max_retries(5);
//!
//! let client = HttpClient::with_config(config)?;
//! let bytes = client.get("https://example.com/blog.zip", Some("api-key"))?;
//! # Ok(())
//! # }
//! ```

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const DEFAULT_USER_AGENT: &str = concat!("stowage/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Query parameter carrying the package API credential
pub const API_KEY_PARAM: &str = "api_key";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Max retries exceeded for {url}")]
    MaxRetries { url: String },
}

impl HttpError {
    /// Whether the remote end refused the credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HttpError::HttpStatus { status: 401 | 403, .. })
    }
}

/// Fetches a resource into memory.
///
/// Implemented by [`HttpClient`]; tests substitute an in-memory fake.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, credential: Option<&str>) -> Result<Vec<u8>, HttpError>;
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Perform GET request with automatic retries
    fn get_with_retries(&self, url: &str, credential: Option<&str>) -> Result<Response, HttpError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.execute_get(url, credential) {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    } else {
                        // Don't retry on client errors (4xx except 429)
                        return Err(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }

            if attempt < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = self.retry_delay * 2_u32.pow(attempt);
                log::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                std::thread::sleep(delay);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(HttpError::MaxRetries {
                url: url.to_string(),
            }),
        }
    }

    /// Execute a GET request without retries
    fn execute_get(&self, url: &str, credential: Option<&str>) -> Result<Response, HttpError> {
        let mut request = self.client.get(url);

        if let Some(key) = credential.filter(|k| !k.is_empty()) {
            request = request.query(&[(API_KEY_PARAM, key)]);
        }

        Ok(request.send()?)
    }

    /// Get the configured user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Get the maximum number of retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Transport for HttpClient {
    fn get(&self, url: &str, credential: Option<&str>) -> Result<Vec<u8>, HttpError> {
        log::debug!("Downloading {}", url);
        let response = self.get_with_retries(url, credential)?;
        let bytes = response.bytes()?;
        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&Config> for HttpClientConfig {
    fn from(config: &Config) -> Self {
        let http = Self::default()
            .with_timeout(Duration::from_secs(config.timeout))
            .with_connect_timeout(Duration::from_secs(config.connect_timeout))
            .with_max_retries(config.max_retries);

        match &config.proxy {
            Some(proxy) => http.with_proxy(proxy.clone()),
            None => http,
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
