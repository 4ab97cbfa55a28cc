//! Error types for MIME generation.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header name is empty or contains characters not allowed by RFC 5322.
    #[error("Invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// Header value contains a bare line break.
    #[error("Header {0} contains a line break")]
    HeaderInjection(String),

    /// Boundary is empty, too long, or contains forbidden characters.
    #[error("Invalid multipart boundary: {0:?}")]
    InvalidBoundary(String),

    /// Message has neither a text nor an HTML body.
    #[error("Message has no body")]
    MissingBody,
}
