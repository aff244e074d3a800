//! PKI error types

use thiserror::Error;

/// PKI errors
#[derive(Debug, Error)]
pub enum PkiError {
    /// Certificate generation failed
    #[error("certificate generation failed: {0}")]
    CertificateGenerationFailed(String),

    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate or key parsing error
    #[error("certificate parsing error: {0}")]
    ParseError(String),

    /// The material parsed but is not usable as a CA
    #[error("invalid CA: {0}")]
    InvalidCa(String),

    /// Rotation parameters are out of range
    #[error("invalid rotation parameters: {0}")]
    InvalidRotation(String),
}

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, PkiError>;
