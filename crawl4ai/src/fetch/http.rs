//! HTTP fetch strategy: a single GET with no JS execution, used whenever a
//! RunConfig doesn't require the browser (§4.1).

use crate::config::BrowserConfig;
use crate::error::CrawlError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;

/// What the HTTP strategy hands back to the orchestrator.
pub struct HttpFetchOutcome {
    pub html: String,
    pub status_code: u16,
    pub response_headers: HashMap<String, String>,
    pub redirected_url: Option<String>,
}

fn build_client(browser_config: &BrowserConfig, timeout: Duration) -> Result<reqwest::Client, CrawlError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(browser_config.ignore_https_errors);

    if let Some(ua) = &browser_config.user_agent {
        builder = builder.user_agent(ua.clone());
    }

    let mut headers = HeaderMap::new();
    for (name, value) in &browser_config.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    if !headers.is_empty() {
        builder = builder.default_headers(headers);
    }

    if let Some(proxy_config) = &browser_config.proxy_config {
        let mut proxy = reqwest::Proxy::all(&proxy_config.server).map_err(|e| CrawlError::NetworkError {
            url: proxy_config.server.clone(),
            source: e,
        })?;
        if let (Some(user), Some(pass)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(user, pass);
        }
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| CrawlError::NetworkError {
        url: String::new(),
        source: e,
    })
}

/// Issue the GET, streaming the body into memory (the core doesn't cap
/// response size; that's a deployment concern).
pub async fn fetch(url: &str, browser_config: &BrowserConfig, timeout: Duration) -> Result<HttpFetchOutcome, CrawlError> {
    let client = build_client(browser_config, timeout)?;

    let mut request = client.get(url);
    if !browser_config.cookies.is_empty() {
        let cookie_header = browser_config
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        request = request.header(reqwest::header::COOKIE, cookie_header);
    }

    let response = request.send().await.map_err(|e| CrawlError::NetworkError {
        url: url.to_string(),
        source: e,
    })?;

    let status = response.status();
    let final_url = response.url().to_string();
    let redirected_url = if final_url != url { Some(final_url) } else { None };

    let mut response_headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            response_headers.insert(name.to_string(), value.to_string());
        }
    }

    if !status.is_success() {
        return Err(CrawlError::HttpError {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let html = response.text().await.map_err(|e| CrawlError::NetworkError {
        url: url.to_string(),
        source: e,
    })?;

    Ok(HttpFetchOutcome {
        html,
        status_code: status.as_u16(),
        response_headers,
        redirected_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_default_browser_config() {
        let config = BrowserConfig::default();
        let client = build_client(&config, Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn client_builds_with_proxy_credentials() {
        let mut config = BrowserConfig::default();
        config.proxy_config = Some(crate::config::ProxyConfig {
            server: "http://proxy.test:8080".into(),
            username: Some("u".into()),
            password: Some("p".into()),
        });
        let client = build_client(&config, Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
