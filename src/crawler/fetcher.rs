//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made during an audit:
//! - GET requests for page content, tolerating statuses below 500
//! - Plain-text fetches for sitemaps and robots.txt
//! - Status probes for link-liveness checks
//! - Redirect probes with redirects disabled
//!
//! Every request presents the next identity from the fetcher's own rotation.

use crate::config::FetcherConfig;
use crate::crawler::identity::IdentityRotation;
use crate::{FetchError, FetchResult};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{redirect::Policy, Client, Method, RequestBuilder, StatusCode};
use std::time::Duration;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A successfully received HTTP response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: String,
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code (always below 500)
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: String,
    /// X-Robots-Tag header value, if present
    pub x_robots_tag: Option<String>,
    /// Response body
    pub body: String,
}

impl FetchedPage {
    /// Size of the body in bytes
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Returns true if the response declares an HTML body (or declares nothing)
    pub fn is_html(&self) -> bool {
        self.content_type.is_empty() || self.content_type.contains("html")
    }
}

/// HTTP fetcher with its own identity rotation
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    probe_client: Client,
    identities: IdentityRotation,
    discovery_timeout: Duration,
    analysis_timeout: Duration,
}

impl Fetcher {
    /// Builds a fetcher from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Successfully built HTTP clients
    /// * `Err(reqwest::Error)` - Failed to build a client
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        let probe_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            probe_client,
            identities: IdentityRotation::new(&config.user_agents),
            discovery_timeout: Duration::from_secs(config.discovery_timeout_secs),
            analysis_timeout: Duration::from_secs(config.analysis_timeout_secs),
        })
    }

    /// Timeout used for discovery fetches
    pub fn discovery_timeout(&self) -> Duration {
        self.discovery_timeout
    }

    /// Timeout used for analysis fetches
    pub fn analysis_timeout(&self) -> Duration {
        self.analysis_timeout
    }

    /// Applies the next identity's headers to a request
    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        let identity = self.identities.advance();
        request
            .header(USER_AGENT, identity.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, identity.accept_language.as_str())
            .header(ACCEPT, ACCEPT_HTML)
    }

    /// Fetches a page with GET, following redirects
    ///
    /// # Status Handling
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP < 500 | `Ok(FetchedPage)` with the status recorded |
    /// | HTTP 5xx | `Err(FetchError::Status)` |
    /// | Timeout | `Err(FetchError::Timeout)` |
    /// | Connection refused / DNS / TLS | `Err(FetchError::Connect)` |
    pub async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        let response = self
            .identify(self.client.get(url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = header_value(&response, CONTENT_TYPE.as_str()).unwrap_or_default();
        let x_robots_tag = header_value(&response, "x-robots-tag");

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status_code: status.as_u16(),
            content_type,
            x_robots_tag,
            body,
        })
    }

    /// Fetches a plain-text resource, accepting only 2xx responses
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> FetchResult<String> {
        let response = self
            .identify(self.client.get(url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Returns the status code a link answers with
    ///
    /// Sends HEAD first and falls back to GET when the server rejects HEAD.
    /// Redirects are followed.
    pub async fn probe_status(&self, url: &str, timeout: Duration) -> FetchResult<u16> {
        let status = self.send_status(Method::HEAD, url, timeout).await?;
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            return Ok(self.send_status(Method::GET, url, timeout).await?.as_u16());
        }
        Ok(status.as_u16())
    }

    async fn send_status(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> FetchResult<StatusCode> {
        self.identify(self.client.request(method, url))
            .timeout(timeout)
            .send()
            .await
            .map(|response| response.status())
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// Requests a URL without following redirects
    ///
    /// # Returns
    ///
    /// * `Ok(Some(location))` - The URL answered with a 3xx redirect
    /// * `Ok(None)` - The URL answered without redirecting
    pub async fn probe_redirect(&self, url: &str, timeout: Duration) -> FetchResult<Option<String>> {
        let response = self
            .identify(self.probe_client.get(url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if response.status().is_redirection() {
            let location = header_value(&response, LOCATION.as_str()).unwrap_or_default();
            Ok(Some(location))
        } else {
            Ok(None)
        }
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}
