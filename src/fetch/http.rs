//! reqwest-backed [`Transport`]

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::LINK;

use super::transport::{ArchiveStream, JsonPage, Transport, TransportError};

// Timeouts for API traffic; archive bodies are guarded by an inactivity timeout instead
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const API_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("targit/", env!("CARGO_PKG_VERSION"));

/// HTTP transport used by the CLI and by default library callers
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client (proxies, custom roots, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<JsonPage, TransportError> {
        let mut request = self.client.get(url).timeout(API_TIMEOUT);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| request_error(url, e))?;
        check_status(url, &response)?;

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(JsonPage { body, next })
    }

    async fn probe(&self, url: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        check_status(url, &response)
    }

    async fn open(&self, url: &str) -> Result<ArchiveStream, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        check_status(url, &response)?;

        let content_length = response.content_length();
        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| request_error(&owned_url, e)))
            .boxed();

        Ok(ArchiveStream {
            content_length,
            body,
        })
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

fn request_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
