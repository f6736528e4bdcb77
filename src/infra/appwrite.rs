use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE, ORIGIN};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::app::ports::{AccountPort, DatabasePort, StoragePort};
use crate::config::Config;
use crate::domain::{Account, DocumentList, FileUpload, PreviewOptions, Session, StoredFile};
use crate::error::{GatewayError, Result};
use crate::infra::urls;
use crate::query::{to_query_params, Query};

pub const RESPONSE_FORMAT: &str = "1.4.0";
/// Files above this size are sent in `Content-Range` chunks.
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

const FALLBACK_COOKIES: &str = "X-Fallback-Cookies";

/// reqwest-backed client for an Appwrite-compatible backend. Implements
/// every port, so one instance serves the whole gateway.
pub struct AppwriteBackend {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    database_id: String,
    chunk_size: usize,
    /// Session cookie echoed back by the server for clients that cannot
    /// persist cookies; replayed on every request.
    fallback_cookies: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl AppwriteBackend {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = &config.backend;

        let mut headers = HeaderMap::new();
        headers.insert("X-Appwrite-Project", header_value(&backend.project_id)?);
        headers.insert("X-Appwrite-Response-Format", HeaderValue::from_static(RESPONSE_FORMAT));
        headers.insert(
            ORIGIN,
            header_value(&format!("appwrite-android://{}", backend.platform))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(backend.timeout_seconds))
            .user_agent(concat!("sena_geo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: backend.endpoint.trim_end_matches('/').to_string(),
            project_id: backend.project_id.clone(),
            database_id: config.collections.database_id.clone(),
            chunk_size: CHUNK_SIZE,
            fallback_cookies: RwLock::new(None),
        })
    }

    /// Overrides the upload chunk size. Zero is ignored.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder> {
        let url = urls::api_url(&self.endpoint, path)?;
        let mut builder = self.client.request(method, url);
        if let Some(cookies) = self.fallback_cookies.read().ok().and_then(|c| c.clone()) {
            builder = builder.header(FALLBACK_COOKIES, cookies);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();

        if let Some(cookies) = response
            .headers()
            .get(FALLBACK_COOKIES)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.fallback_cookies.write() {
                *slot = Some(cookies.to_string());
            }
        }

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error_response(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn documents_path(&self, collection_id: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            self.database_id, collection_id
        )
    }

    fn clear_fallback_cookies(&self) {
        if let Ok(mut slot) = self.fallback_cookies.write() {
            *slot = None;
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Config(format!("invalid header value '{}': {}", value, e)))
}

/// Maps a non-2xx backend response onto an error kind. The body is the
/// backend's `{message, code, type}` object when it is JSON at all.
pub fn map_error_response(status: StatusCode, body: &str) -> GatewayError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = match &parsed {
        Some(b) if !b.message.is_empty() => b.message.clone(),
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    debug!(
        status = status.as_u16(),
        error_type = parsed.as_ref().map(|b| b.kind.as_str()).unwrap_or(""),
        "Backend returned an error"
    );

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::AuthFailure(message),
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => GatewayError::InvalidInput(message),
        other => GatewayError::Backend {
            status: other.as_u16(),
            message,
        },
    }
}

/// Inclusive byte ranges of each upload chunk.
pub fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if len == 0 {
        return vec![(0, 0)];
    }
    (0..len)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(len) - 1))
        .collect()
}

#[async_trait]
impl AccountPort for AppwriteBackend {
    #[instrument(skip(self, password))]
    async fn create_account(&self, user_id: &str, email: &str, password: &str, name: &str) -> Result<Account> {
        let body = json!({ "userId": user_id, "email": email, "password": password, "name": name });
        let builder = self.request(reqwest::Method::POST, "/account")?.json(&body);
        self.send_json(builder).await
    }

    #[instrument(skip(self, password))]
    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session> {
        let body = json!({ "email": email, "password": password });
        let builder = self
            .request(reqwest::Method::POST, "/account/sessions/email")?
            .json(&body);
        self.send_json(builder).await
    }

    async fn get_account(&self) -> Result<Account> {
        let builder = self.request(reqwest::Method::GET, "/account")?;
        self.send_json(builder).await
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let builder = self.request(
            reqwest::Method::DELETE,
            &format!("/account/sessions/{}", session_id),
        )?;
        self.send(builder).await?;
        if session_id == "current" {
            self.clear_fallback_cookies();
        }
        Ok(())
    }

    fn initials_avatar_url(&self, name: &str) -> Result<String> {
        urls::initials_avatar(&self.endpoint, &self.project_id, name)
    }
}

#[async_trait]
impl DatabasePort for AppwriteBackend {
    #[instrument(skip(self, data))]
    async fn create_document(&self, collection_id: &str, document_id: &str, data: Value) -> Result<Value> {
        let body = json!({ "documentId": document_id, "data": data });
        let builder = self
            .request(reqwest::Method::POST, &self.documents_path(collection_id))?
            .json(&body);
        self.send_json(builder).await
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection_id: &str, document_id: &str) -> Result<Value> {
        let path = format!("{}/{}", self.documents_path(collection_id), document_id);
        let builder = self.request(reqwest::Method::GET, &path)?;
        self.send_json(builder).await
    }

    #[instrument(skip(self, queries), fields(queries = queries.len()))]
    async fn list_documents(&self, collection_id: &str, queries: &[Query]) -> Result<DocumentList<Value>> {
        let builder = self
            .request(reqwest::Method::GET, &self.documents_path(collection_id))?
            .query(&to_query_params(queries));
        self.send_json(builder).await
    }
}

#[async_trait]
impl StoragePort for AppwriteBackend {
    #[instrument(skip(self, file), fields(name = %file.name, size = file.bytes.len()))]
    async fn create_file(&self, bucket_id: &str, file_id: &str, file: FileUpload) -> Result<StoredFile> {
        let path = format!("/storage/buckets/{}/files", bucket_id);
        let total = file.bytes.len();
        let ranges = chunk_ranges(total, self.chunk_size);
        let chunked = ranges.len() > 1;

        let mut uploaded_id: Option<String> = None;
        let mut stored: Option<StoredFile> = None;
        for (start, end) in ranges {
            let chunk = if total == 0 {
                Vec::new()
            } else {
                file.bytes[start..=end].to_vec()
            };
            let part = Part::bytes(chunk)
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| GatewayError::InvalidInput(format!("bad MIME type '{}': {}", file.mime_type, e)))?;
            let form = Form::new().text("fileId", file_id.to_string()).part("file", part);

            let mut builder = self.request(reqwest::Method::POST, &path)?.multipart(form);
            if chunked {
                builder = builder.header(CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total));
                if let Some(id) = &uploaded_id {
                    builder = builder.header("x-appwrite-id", id.as_str());
                }
            }

            let response: StoredFile = self.send_json(builder).await?;
            debug!(start, end, total, "Uploaded chunk");
            uploaded_id = Some(response.id.clone());
            stored = Some(response);
        }

        stored.ok_or_else(|| GatewayError::Backend {
            status: 0,
            message: "upload produced no response".to_string(),
        })
    }

    fn file_preview_url(&self, bucket_id: &str, file_id: &str, options: &PreviewOptions) -> Result<String> {
        urls::file_preview(&self.endpoint, &self.project_id, bucket_id, file_id, options)
    }
}
