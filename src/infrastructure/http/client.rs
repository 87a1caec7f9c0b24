//! REST Client
//!
//! Request/response calls to the HTTP API, with JSON or multipart bodies.
//! No rate limiting and no retries: failures are returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;

use crate::shared::error::HttpError;

/// A file uploaded with a multipart request.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileAttachment {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: None,
        }
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` for empty bodies.
    pub body: Value,
}

/// Sends requests to the HTTP API.
#[async_trait]
pub trait RestSender: Send + Sync {
    /// `path` is relative to the versioned API root, e.g. `/channels/42/messages`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        json_body: Option<Value>,
        files: Vec<FileAttachment>,
    ) -> Result<RestResponse, HttpError>;
}

/// reqwest-backed `RestSender`
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        version: u8,
        token: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, HttpError> {
        let mut headers = header::HeaderMap::new();
        let mut authorization = header::HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|_| HttpError::InvalidRequest("token contains invalid characters".into()))?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/v{}", base_url.trim_end_matches('/'), version),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the authenticated user; fails with `Unauthorized` for a bad token.
    pub async fn current_user(&self) -> Result<Value, HttpError> {
        let response = self.send(Method::GET, "/users/@me", None, Vec::new()).await?;
        Ok(response.body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RestSender for HttpClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        json_body: Option<Value>,
        files: Vec<FileAttachment>,
    ) -> Result<RestResponse, HttpError> {
        let url = self.url(path);
        tracing::debug!(method = %method, url = %url, files = files.len(), "REST request");

        let mut request = self.client.request(method.clone(), &url);
        request = if files.is_empty() {
            match json_body {
                Some(body) => request.json(&body),
                None => request,
            }
        } else {
            request.multipart(multipart_form(json_body, files)?)
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "REST response");

        into_response(status, text)
    }
}

/// `payload_json` part followed by one `files[n]` part per attachment.
fn multipart_form(json_body: Option<Value>, files: Vec<FileAttachment>) -> Result<Form, HttpError> {
    let mut form = Form::new();
    if let Some(body) = json_body {
        let part = Part::text(serde_json::to_string(&body)?).mime_str("application/json")?;
        form = form.part("payload_json", part);
    }

    for (index, file) in files.into_iter().enumerate() {
        let mut part = Part::bytes(file.content).file_name(file.filename);
        if let Some(content_type) = file.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        form = form.part(format!("files[{}]", index), part);
    }

    Ok(form)
}

fn into_response(status: StatusCode, text: String) -> Result<RestResponse, HttpError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(HttpError::Unauthorized(text));
    }
    if !status.is_success() {
        return Err(HttpError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)?
    };

    Ok(RestResponse {
        status: status.as_u16(),
        body,
    })
}
