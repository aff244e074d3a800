//! Error types for the Tessera operator
//!
//! Errors fall into three groups with different handling:
//!
//! - **Transient** (API server unavailable, deadline exceeded, CA generation
//!   hiccups): returned unchanged, the reconciliation pass is retried and no
//!   Event is emitted.
//! - **User configuration** (referenced custom CA secret missing or invalid):
//!   surfaced as a Warning Event by the code that detects it, then returned so
//!   the pass aborts and the previously persisted CA stays in effect.
//! - **Non-critical clean-up** failures never become an `Error`; they are
//!   logged where they happen.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Tessera operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A store operation did not finish within its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being attempted (e.g. "get secret ns/name")
        operation: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The referenced custom CA secret does not exist
    #[error("custom CA secret {namespace}/{name} not found")]
    CustomCaNotFound {
        /// Namespace of the referenced secret
        namespace: String,
        /// Name of the referenced secret
        name: String,
    },

    /// The referenced custom CA secret exists but does not hold a usable CA
    #[error("custom CA secret {namespace}/{name} is invalid: {message}")]
    InvalidCustomCa {
        /// Namespace of the referenced secret
        namespace: String,
        /// Name of the referenced secret
        name: String,
        /// The underlying parse or validation failure
        message: String,
    },

    /// CA generation or loading failed
    #[error("PKI error: {message}")]
    Pki {
        /// Description of what failed
        message: String,
    },

    /// Registering or removing a dynamic watch failed
    #[error("watch error for {key}: {message}")]
    Watch {
        /// The watch key being changed
        key: String,
        /// Description of what failed
        message: String,
    },

    /// Validation error for a cluster resource
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "controller")
        context: String,
    },
}

impl Error {
    /// Create a timeout error for the given operation
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create a not-found error for a referenced custom CA secret
    pub fn custom_ca_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::CustomCaNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-content error for a referenced custom CA secret
    pub fn invalid_custom_ca(
        namespace: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::InvalidCustomCa {
            namespace: namespace.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a PKI error with the given message
    pub fn pki(msg: impl Into<String>) -> Self {
        Self::Pki {
            message: msg.into(),
        }
    }

    /// Create a watch error for the given key
    pub fn watch(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Watch {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// User configuration errors are not retryable as-is: they need the user
    /// to fix the referenced secret, which the secret watch notices.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout)
                // Don't retry on 4xx errors (validation, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Timeout { .. } => true,
            Error::CustomCaNotFound { .. } => false,
            Error::InvalidCustomCa { .. } => false,
            Error::Pki { .. } => true,
            Error::Watch { .. } => true,
            Error::Validation { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Whether this error was caused by user configuration
    pub fn is_user_configuration(&self) -> bool {
        matches!(
            self,
            Error::CustomCaNotFound { .. }
                | Error::InvalidCustomCa { .. }
                | Error::Validation { .. }
        )
    }
}

/// Whether a kube error is a 404 from the API server
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}
