//! Error types for the chat service client.

use medchat_core::error::MedchatError;

/// Errors from talking to the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClientError> for MedchatError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Io(e) => MedchatError::Io(e),
            other => MedchatError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Status {
            status: 503,
            body: "model unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server returned status 503: model unavailable"
        );

        let err = ClientError::Stream("connection reset".to_string());
        assert_eq!(err.to_string(), "stream error: connection reset");

        let err = ClientError::Decode("expected value".to_string());
        assert_eq!(err.to_string(), "decode error: expected value");

        let err = ClientError::InvalidDocument("notes.txt is not a PDF".to_string());
        assert_eq!(err.to_string(), "invalid document: notes.txt is not a PDF");
    }

    #[test]
    fn test_client_error_into_medchat_error() {
        let err: MedchatError = ClientError::Stream("eof".to_string()).into();
        assert!(matches!(err, MedchatError::Transport(_)));
        assert!(err.to_string().contains("eof"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: MedchatError = ClientError::Io(io).into();
        assert!(matches!(err, MedchatError::Io(_)));
    }
}
