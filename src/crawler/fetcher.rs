//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client from the crawl configuration
//! - GET requests with the configured timeout and redirect limit
//! - Classifying responses into success, not found and retriable failures
//! - Extracting the content type used for file naming
//! - Reading HTML bodies in their declared character set

use crate::config::MirrorConfig;
use crate::crawler::charset::decode_html;
use crate::{MirrorError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Content type assumed when a response carries none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawl configuration (timeout and redirect limit)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use webmirror::config::MirrorConfig;
/// use webmirror::crawler::build_http_client;
///
/// let client = build_http_client(&MirrorConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &MirrorConfig) -> std::result::Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let redirect = if config.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(config.max_redirects as usize)
    };

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_millis(config.timeout_ms))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET request and checks the response status
///
/// # Returns
///
/// * `Ok(Response)` - A 2xx response; the body has not been read yet
/// * `Err(MirrorError::NotFound)` - HTTP 404, never retried
/// * `Err(MirrorError::Fetch)` - Any other status or transport failure
pub async fn fetch(client: &Client, url: &Url) -> Result<Response> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| MirrorError::Fetch {
            url: url.to_string(),
            message: describe_error(&e),
        })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(MirrorError::NotFound {
            url: url.to_string(),
        });
    }

    if !status.is_success() {
        return Err(MirrorError::Fetch {
            url: url.to_string(),
            message: format!("failed with HTTP status {}", status.as_u16()),
        });
    }

    Ok(response)
}

/// Returns the response content type without parameters, lowercased
pub fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(normalize_content_type)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Reads an HTML body and decodes it to UTF-8
///
/// Unlike `Response::text`, a `<meta>` charset declaration in the page is
/// honored when the header carries none.
pub async fn html_text(response: Response) -> Result<String> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?;
    Ok(decode_html(&body, content_type.as_deref()))
}

/// Strips parameters from a Content-Type value
///
/// `text/html; charset=UTF-8` gives `text/html`.
pub fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("too many redirects: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&MirrorConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_redirects() {
        let config = MirrorConfig {
            max_redirects: 5,
            ..MirrorConfig::default()
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(normalize_content_type("text/html; charset=UTF-8"), "text/html");
        assert_eq!(normalize_content_type("Image/PNG"), "image/png");
        assert_eq!(normalize_content_type("  text/css  "), "text/css");
        assert_eq!(normalize_content_type(""), "");
    }

    // Status classification is exercised against wiremock servers in the
    // integration tests
}
