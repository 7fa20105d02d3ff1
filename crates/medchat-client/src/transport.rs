//! Streaming transport seam.
//!
//! The session controller only needs "send this request, give me the body
//! bytes as they arrive". `ApiClient` implements that over HTTP;
//! `ScriptedTransport` replays canned reads for tests and demos.

use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::ClientError;
use crate::types::ChatRequest;

/// Response body of a streaming chat request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Opens a streamed reply for one chat turn.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and return the response body once the server has
    /// accepted it. Non-success statuses are errors.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver these bytes as one transport read.
    Bytes(Bytes),
    /// Fail the read with a stream error.
    Fail(String),
    /// Never deliver anything further, without ending the stream.
    Hang,
}

/// Transport that replays a fixed sequence of reads.
///
/// Every `open_stream` call records the request and replays the same script.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Vec<ScriptStep>,
    delay: Option<Duration>,
    reject_status: Option<u16>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Script that delivers each string as one read.
    pub fn from_reads<I, S>(reads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            reads
                .into_iter()
                .map(|s| ScriptStep::Bytes(Bytes::from(s.into())))
                .collect(),
        )
    }

    /// Script that delivers each text as one `data: {"chunk": ...}` frame.
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_reads(chunks.into_iter().map(|c| {
            format!("data: {}\n\n", serde_json::json!({ "chunk": c.as_ref() }))
        }))
    }

    /// Transport whose server refuses every request with `status`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_status: Some(status),
            ..Self::default()
        }
    }

    /// Wait this long before each read.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(e) => e.into_inner().push(request.clone()),
        }

        if let Some(status) = self.reject_status {
            return Err(ClientError::Status {
                status,
                body: "rejected".to_string(),
            });
        }

        let steps = self.steps.clone();
        let delay = self.delay;
        let stream = async_stream::stream! {
            for step in steps {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                match step {
                    ScriptStep::Bytes(bytes) => yield Ok(bytes),
                    ScriptStep::Fail(reason) => {
                        yield Err(ClientError::Stream(reason));
                        return;
                    }
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(stream: ByteStream) -> Vec<Result<Bytes, ClientError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_scripted_reads_replay_in_order() {
        let transport = ScriptedTransport::from_reads(["data: {\"chunk\":", "\"a\"}\n"]);
        let request = ChatRequest::new("q", &[], true);
        let reads = collect(transport.open_stream(&request).await.unwrap()).await;
        let reads: Vec<Bytes> = reads.into_iter().map(Result::unwrap).collect();
        assert_eq!(reads[0], Bytes::from_static(b"data: {\"chunk\":"));
        assert_eq!(reads[1], Bytes::from_static(b"\"a\"}\n"));
        assert_eq!(transport.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_from_chunks_escapes_json() {
        let transport = ScriptedTransport::from_chunks(["say \"hi\"\n"]);
        let reads = collect(
            transport
                .open_stream(&ChatRequest::new("q", &[], true))
                .await
                .unwrap(),
        )
        .await;
        let body = reads[0].as_ref().unwrap();
        assert_eq!(&body[..], b"data: {\"chunk\":\"say \\\"hi\\\"\\n\"}\n\n");
    }

    #[tokio::test]
    async fn test_fail_step_ends_stream() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::Fail("reset".to_string()),
            ScriptStep::Bytes(Bytes::from_static(b"never")),
        ]);
        let reads = collect(
            transport
                .open_stream(&ChatRequest::new("q", &[], true))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(reads.len(), 1);
        assert!(matches!(reads[0], Err(ClientError::Stream(_))));
    }

    #[tokio::test]
    async fn test_rejecting_transport() {
        let transport = ScriptedTransport::rejecting(500);
        let result = transport
            .open_stream(&ChatRequest::new("q", &[], true))
            .await;
        assert!(matches!(
            result,
            Err(ClientError::Status { status: 500, .. })
        ));
        assert_eq!(transport.requests().len(), 1);
    }
}
