use adsight_core::error::AdsightError;

/// Failures talking to a remote service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Build an `Api` error from a non-success response, consuming its body.
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        BackendError::Api { status, message }
    }
}

impl From<BackendError> for AdsightError {
    fn from(err: BackendError) -> Self {
        AdsightError::Backend(err.to_string())
    }
}
