//! HTTP transport with session cookies and preemptive basic auth

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use packman_core::error::{PackmanError, PackmanResult};

use super::{
    charset_from_content_type, decode_lines, encoding_for, with_idle_timeout, CommandRequest, RawResponse,
    StreamingResponse, Transport, JSON_SERVICE_PATH, KEY_QUERY, LIST_PATH, LOGIN_PATH,
};
use crate::wait::Availability;

/// Connection settings for [`ReqwestTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server root, e.g. `http://localhost:4502`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Whole-request timeout for simple commands and listings. Streaming
    /// commands may run longer; for them this bounds the wait for the
    /// response head and each pause between body chunks.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4502".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            user_agent: concat!("packman/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// [`Transport`] backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Transport for `http://localhost:4502` with default credentials
    pub fn new() -> PackmanResult<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> PackmanResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|e| PackmanError::ConfigValidation {
            field: "base-url".to_string(),
            reason: format!("'{}' is not a valid URL: {}", config.base_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PackmanError::ConfigValidation {
                field: "base-url".to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let client = ClientBuilder::new()
            .cookie_store(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| PackmanError::network(format!("Failed to create HTTP client: {}", e), e))?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a form-login session; the session cookie is kept for later requests.
    ///
    /// Returns `false` when the server rejects the credentials.
    pub async fn login(&self, username: &str, password: &str) -> PackmanResult<bool> {
        let url = self.url(LOGIN_PATH);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .form(&[
                ("j_username", username),
                ("j_password", password),
                ("j_validate", "true"),
                ("_charset_", "utf-8"),
            ])
            .send()
            .await
            .map_err(|e| PackmanError::network(format!("Failed to login at {}: {}", url, e), e))?;

        let accepted = response.status() == StatusCode::OK;
        if !accepted {
            warn!("Login rejected with status {}", response.status());
        }
        Ok(accepted)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.username, Some(&self.password))
    }

    /// Build the POST for a command: a url-encoded form, or query parameters
    /// plus a multipart body when files are attached.
    fn command(&self, request: &CommandRequest) -> PackmanResult<RequestBuilder> {
        let url = self.url(&request.path());
        debug!("POST {} ({})", url, request.command().unwrap_or("?"));

        let builder = self.authorized(self.client.post(url));
        if !request.has_files() {
            return Ok(builder.form(&request.text_params()));
        }

        let mut form = Form::new();
        for (name, file) in request.file_params() {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| PackmanError::network(format!("Invalid mime type {}: {}", file.mime_type, e), e))?;
            form = form.part(name.to_string(), part);
        }
        Ok(builder.query(&request.text_params()).multipart(form))
    }

    async fn send(&self, builder: RequestBuilder) -> PackmanResult<Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PackmanError::ServiceTimeout {
                    message: format!("Request timed out: {}", e),
                }
            } else {
                PackmanError::network(format!("Request failed: {}", e), e)
            }
        })
    }

    /// Send with a deadline on the whole exchange, body included
    async fn send_bounded(&self, builder: RequestBuilder) -> PackmanResult<Response> {
        self.send(builder.timeout(self.request_timeout)).await
    }

    async fn buffer(response: Response) -> PackmanResult<RawResponse> {
        let status = response.status();
        let charset = response_charset(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| PackmanError::network(format!("Failed to read response body: {}", e), e))?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason: reason_phrase(status),
            charset,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn probe(&self, enforce_timeout: bool, remaining: Duration) -> PackmanResult<Availability> {
        let timeout = if enforce_timeout { remaining } else { self.request_timeout };
        let builder = self
            .authorized(self.client.get(self.url(JSON_SERVICE_PATH)))
            .timeout(timeout);

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(PackmanError::ServiceTimeout {
                    message: "Service timeout exceeded.".to_string(),
                })
            }
            Err(e) if e.is_connect() => {
                debug!("Service not reachable: {}", e);
                return Ok(Availability::Unready);
            }
            Err(e) => return Err(PackmanError::network(format!("Availability check failed: {}", e), e)),
        };

        match response.status() {
            StatusCode::METHOD_NOT_ALLOWED => Ok(Availability::Ready),
            StatusCode::UNAUTHORIZED => Err(PackmanError::Unauthorized {
                message: format!("401 {}", reason_phrase(StatusCode::UNAUTHORIZED)),
            }),
            status => {
                debug!("Service answered {}", status);
                Ok(Availability::Unready)
            }
        }
    }

    async fn execute_simple(&self, request: &CommandRequest) -> PackmanResult<RawResponse> {
        let response = self.send_bounded(self.command(request)?).await?;
        Self::buffer(response).await
    }

    async fn execute_streaming(&self, request: &CommandRequest) -> PackmanResult<StreamingResponse> {
        // No whole-request deadline: a long install keeps the body open for as
        // long as it reports progress.
        let response = tokio::time::timeout(self.request_timeout, self.send(self.command(request)?))
            .await
            .map_err(|_| PackmanError::ServiceTimeout {
                message: format!("no response within {}ms", self.request_timeout.as_millis()),
            })??;
        let status = response.status();
        let encoding = encoding_for(response_charset(&response).as_deref());

        let body = response
            .bytes_stream()
            .map_err(|e| PackmanError::network(format!("Failed to read response body: {}", e), e))
            .boxed();

        Ok(StreamingResponse {
            status: status.as_u16(),
            reason: reason_phrase(status),
            lines: decode_lines(with_idle_timeout(body, self.request_timeout), encoding),
        })
    }

    async fn list(&self, query: Option<&str>) -> PackmanResult<RawResponse> {
        let url = self.url(LIST_PATH);
        debug!("GET {}", url);

        let mut builder = self.authorized(self.client.get(url));
        if let Some(query) = query {
            builder = builder.query(&[(KEY_QUERY, query)]);
        }
        let response = self.send_bounded(builder).await?;
        Self::buffer(response).await
    }
}

fn response_charset(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type)
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests;
