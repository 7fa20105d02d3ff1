//! HTTP client for the chat service.
//!
//! Endpoints:
//! - `POST /chat/stream` (via `ChatTransport`), `POST /chat`
//! - `GET /health`
//! - `POST /documents/upload`, `GET /documents/stats`, `POST /documents/reindex`

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use medchat_core::config::ServerConfig;

use crate::error::ClientError;
use crate::transport::{ByteStream, ChatTransport};
use crate::types::{
    ChatRequest, ChatResponse, DocumentStats, DocumentUploadResponse, HealthResponse,
    UploadProgress,
};

/// Header carrying the API key when one is configured.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Size of the pieces an upload body is handed to the transport in.
const UPLOAD_PIECE_BYTES: usize = 64 * 1024;

/// Client for the chat service REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl ApiClient {
    /// Build a client from the server section of the configuration.
    ///
    /// Only the connect timeout is set on the underlying client. Streamed
    /// replies are bounded by the session controller instead.
    pub fn new(config: &ServerConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Non-streaming chat: the whole reply in one response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let response = self
            .request(Method::POST, "/chat")
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    /// Server and model backend status.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self
            .request(Method::GET, "/health")
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }

    /// Counts of indexed documents.
    pub async fn document_stats(&self) -> Result<DocumentStats, ClientError> {
        let response = self
            .request(Method::GET, "/documents/stats")
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }

    /// Ask the server to rebuild its document index. The reply shape is
    /// server-defined.
    pub async fn reindex(&self) -> Result<serde_json::Value, ClientError> {
        info!("Requesting document reindex");
        let response = self.request(Method::POST, "/documents/reindex").send().await?;
        read_json(response).await
    }

    /// Upload a PDF for indexing.
    ///
    /// `on_progress` is called each time another piece of the body is handed
    /// to the transport.
    pub async fn upload_document<F>(
        &self,
        path: &Path,
        on_progress: F,
    ) -> Result<DocumentUploadResponse, ClientError>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidDocument(format!("{} has no file name", path.display()))
            })?;
        if !file_name.ends_with(".pdf") {
            return Err(ClientError::InvalidDocument(format!(
                "{} is not a PDF",
                file_name
            )));
        }

        let content = Bytes::from(tokio::fs::read(path).await?);
        let total = content.len() as u64;
        info!(file = %file_name, bytes = total, "Uploading document");

        let part = Part::stream_with_length(progress_body(content, on_progress), total)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .request(Method::POST, "/documents/upload")
            .multipart(form)
            .send()
            .await?;
        let uploaded: DocumentUploadResponse = read_json(response).await?;
        info!(
            file = %uploaded.filename,
            chunks = uploaded.chunks_created,
            "Document indexed"
        );
        Ok(uploaded)
    }
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        debug!(
            history = request.conversation_history.len(),
            use_rag = request.use_rag,
            "Opening chat stream"
        );
        let response = self
            .request(Method::POST, "/chat/stream")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        check_event_stream(&response)?;

        let body = response
            .bytes_stream()
            .map_err(|e| ClientError::Stream(e.to_string()));
        Ok(Box::pin(body))
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Chat service returned an error status");
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Reject a success response that declares a content type other than
/// `text/event-stream`. A missing header is left to the decoder.
fn check_event_stream(response: &Response) -> Result<(), ClientError> {
    let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = content_type.to_str().unwrap_or("");
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime.eq_ignore_ascii_case("text/event-stream") {
        return Ok(());
    }
    warn!(content_type = %content_type, "Chat stream answered with a non-event-stream body");
    Err(ClientError::Decode(format!(
        "expected text/event-stream, got {}",
        content_type
    )))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

fn progress_body<F>(content: Bytes, on_progress: F) -> reqwest::Body
where
    F: Fn(UploadProgress) + Send + Sync + 'static,
{
    let total = content.len() as u64;
    let pieces: Vec<Bytes> = (0..content.len())
        .step_by(UPLOAD_PIECE_BYTES)
        .map(|start| content.slice(start..(start + UPLOAD_PIECE_BYTES).min(content.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(pieces).map(move |piece| {
        sent += piece.len() as u64;
        on_progress(UploadProgress { sent, total });
        Ok::<Bytes, std::io::Error>(piece)
    });
    reqwest::Body::wrap_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ServerConfig {
        ServerConfig {
            base_url: base_url.to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(&config("http://localhost:8000/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let mut cfg = config("http://localhost:8000");
        cfg.api_key = Some(String::new());
        let client = ApiClient::new(&cfg).unwrap();
        assert!(client.api_key.is_none());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let client = ApiClient::new(&config("http://127.0.0.1:9")).unwrap();
        let result = client.upload_document(&path, |_| {}).await;
        assert!(matches!(result, Err(ClientError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let client = ApiClient::new(&config("http://127.0.0.1:9")).unwrap();
        let result = client
            .upload_document(Path::new("/nonexistent/guide.pdf"), |_| {})
            .await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    }
}
