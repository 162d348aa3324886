use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use folio_core::storage::SyncError;

/// Internal error type of the HTTP remote.
///
/// Converted into the public [`SyncError`] at the [`RemoteSource`] boundary.
///
/// [`RemoteSource`]: folio_core::storage::RemoteSource
#[derive(Error, Debug)]
pub enum HttpRemoteError {
    /// Sending the request or reading the response failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server error: status={status}, message='{body_text}'")]
    ApiError { status: StatusCode, body_text: String },

    /// A success response could not be decoded.
    #[error("Failed to parse response body ({context}): {source}")]
    ResponseParsing {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Turns a non-success response into [`HttpRemoteError::ApiError`], keeping the body text
/// the server sent (the backend answers errors with plain text).
pub(crate) async fn map_response_error(response: reqwest::Response) -> HttpRemoteError {
    let status = response.status();
    debug_assert!(!status.is_success(), "map_response_error called with success status");

    match response.text().await {
        Ok(body_text) => HttpRemoteError::ApiError {
            status,
            body_text: body_text.trim().to_string(),
        },
        Err(e) => {
            warn!(status = %status, error = %e, "Failed to read error response body");
            HttpRemoteError::Network(e)
        }
    }
}

impl From<HttpRemoteError> for SyncError {
    fn from(err: HttpRemoteError) -> Self {
        match err {
            HttpRemoteError::Network(source) => SyncError::Unreachable(source.to_string()),
            HttpRemoteError::ApiError { status, body_text } => SyncError::Status {
                status: status.as_u16(),
                message: if body_text.is_empty() {
                    status.canonical_reason().unwrap_or("unknown status").to_string()
                } else {
                    body_text
                },
            },
            HttpRemoteError::ResponseParsing { context, source } => {
                SyncError::InvalidResponse(format!("{}: {}", context, source))
            }
            HttpRemoteError::InvalidConfiguration(msg) => SyncError::Configuration(msg),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_keeps_status_and_body() {
        let err = HttpRemoteError::ApiError {
            status: StatusCode::NOT_FOUND,
            body_text: "File not found".into(),
        };
        match SyncError::from(err) {
            SyncError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "File not found");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn empty_body_falls_back_to_reason_phrase() {
        let err = HttpRemoteError::ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body_text: String::new(),
        };
        assert!(matches!(
            SyncError::from(err),
            SyncError::Status { status: 503, ref message } if message == "Service Unavailable"
        ));
    }

    #[test]
    fn configuration_error_maps_to_configuration() {
        let err = HttpRemoteError::InvalidConfiguration("bad url".into());
        assert!(matches!(SyncError::from(err), SyncError::Configuration(m) if m == "bad url"));
    }
}
