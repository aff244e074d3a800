//! PKI primitives for Tessera transport security
//!
//! This crate wraps `rcgen` and `x509-parser` into the handful of operations
//! the transport CA lifecycle needs:
//!
//! - Generating a self-signed CA with a configurable validity
//! - Loading a CA back from PEM (operator-managed secrets, shared CA directory)
//! - Parsing and validating a user-supplied CA (exactly one certificate, marked
//!   as a CA, within its validity window, optional matching private key in
//!   PKCS#8, PKCS#1 or SEC1 encoding)
//! - Deciding whether an existing CA can be reused under [`RotationParams`]
//!
//! It deliberately knows nothing about Kubernetes. Persistence and selection
//! of the authoritative CA live in `tessera-transport`.

mod ca;
mod error;
mod rotation;

pub use ca::{unix_now, CertificateAuthority, CertificateInfo, CA_DIR_CERT_FILE, CA_DIR_KEY_FILE};
pub use error::{PkiError, Result};
pub use rotation::{
    RotationParams, DEFAULT_CA_VALIDITY, DEFAULT_RENEW_THRESHOLD, SECONDS_PER_DAY,
};
