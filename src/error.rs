#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Identity provider error during {operation} (status {status:?}): {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[cfg(feature = "provider")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("Malformed session cookie: {0}")]
    MalformedSession(String),
    #[error("Identity provider call timed out")]
    Timeout,
}

impl Error {
    /// Expected on every anonymous visit; not worth a warning.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoRefreshToken)
    }
}
