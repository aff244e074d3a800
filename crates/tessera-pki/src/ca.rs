//! Certificate authority handling
//!
//! A [`CertificateAuthority`] is an immutable value: a new CA is a new
//! instance, never a mutation of an existing one. It holds the PEM encoded
//! certificate, the PEM encoded private key when we have it, and the parsed
//! validity information used for rotation decisions.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair,
    KeyUsagePurpose, PublicKeyData,
};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};
use x509_parser::prelude::*;

use crate::{PkiError, Result, RotationParams};

/// File name of the CA certificate in a CA directory
pub const CA_DIR_CERT_FILE: &str = "tls.crt";

/// File name of the CA private key in a CA directory
pub const CA_DIR_KEY_FILE: &str = "tls.key";

/// PEM tag of X.509 certificates
const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

const PKCS8_KEY_PEM_TAG: &str = "PRIVATE KEY";
const PKCS1_KEY_PEM_TAG: &str = "RSA PRIVATE KEY";
const SEC1_KEY_PEM_TAG: &str = "EC PRIVATE KEY";

/// Current time as a Unix timestamp
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Compute certificate validity period from now
///
/// Returns (not_before, not_after) timestamps for certificate generation.
fn compute_validity(validity: Duration) -> Result<(::time::OffsetDateTime, ::time::OffsetDateTime)> {
    let lifetime = ::time::Duration::try_from(validity).map_err(|e| {
        PkiError::CertificateGenerationFailed(format!("validity out of range: {}", e))
    })?;
    let now = ::time::OffsetDateTime::now_utc();
    let not_after = now.checked_add(lifetime).ok_or_else(|| {
        PkiError::CertificateGenerationFailed("validity overflows the calendar".to_string())
    })?;
    Ok((now, not_after))
}

/// Parse PEM-encoded data and return the DER bytes of the first block
fn parse_pem(pem_data: &str) -> Result<Vec<u8>> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| PkiError::ParseError(format!("failed to parse PEM: {}", e)))?;
    Ok(pem_obj.contents().to_vec())
}

/// Parse a PEM private key in PKCS#8, PKCS#1 (RSA) or SEC1 (EC) encoding
///
/// Blocks that are not private keys are skipped, such as the
/// `EC PARAMETERS` block `openssl ecparam -genkey` writes ahead of the key.
fn parse_key_pair(key_pem: &str) -> Result<KeyPair> {
    let blocks = ::pem::parse_many(key_pem)
        .map_err(|e| PkiError::ParseError(format!("failed to parse CA key PEM: {}", e)))?;

    let der = blocks
        .into_iter()
        .find_map(|block| {
            let wrap: fn(Vec<u8>) -> PrivateKeyDer<'static> = match block.tag() {
                PKCS8_KEY_PEM_TAG => |der| PrivatePkcs8KeyDer::from(der).into(),
                PKCS1_KEY_PEM_TAG => |der| PrivatePkcs1KeyDer::from(der).into(),
                SEC1_KEY_PEM_TAG => |der| PrivateSec1KeyDer::from(der).into(),
                _ => return None,
            };
            Some(wrap(block.into_contents()))
        })
        .ok_or_else(|| PkiError::ParseError("no PEM private key found".to_string()))?;

    KeyPair::try_from(&der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse CA key: {}", e)))
}

/// Information about a certificate's validity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// When the certificate becomes valid (Unix timestamp)
    pub not_before: i64,
    /// When the certificate expires (Unix timestamp)
    pub not_after: i64,
    /// Subject common name
    pub common_name: String,
}

impl CertificateInfo {
    /// Parse certificate info from DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {}", e)))?;
        Ok(Self::from_x509(&cert))
    }

    fn from_x509(cert: &X509Certificate<'_>) -> Self {
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or("")
            .to_string();

        Self {
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            common_name,
        }
    }

    /// Total lifetime of the certificate in seconds
    pub fn lifetime_secs(&self) -> i64 {
        self.not_after - self.not_before
    }
}

/// Certificate authority securing transport traffic
///
/// Equality compares the certificate and key material, so two loads of the
/// same persisted CA are equal while a regenerated CA never is.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateAuthority {
    /// PEM-encoded CA certificate for distribution
    cert_pem: String,
    /// PEM-encoded private key, absent for trust-only CAs
    key_pem: Option<String>,
    /// Parsed validity of `cert_pem`
    info: CertificateInfo,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("common_name", &self.info.common_name)
            .field("not_before", &self.info.not_before)
            .field("not_after", &self.info.not_after)
            .field("has_private_key", &self.key_pem.is_some())
            .finish()
    }
}

impl CertificateAuthority {
    /// Generate a new self-signed CA valid for `validity` from now
    pub fn generate(common_name: &str, validity: Duration) -> Result<Self> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(common_name.to_string()),
        );
        dn.push(
            DnType::OrganizationName,
            DnValue::Utf8String("Tessera".to_string()),
        );
        params.distinguished_name = dn;

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let (not_before, not_after) = compute_validity(validity)?;
        params.not_before = not_before;
        params.not_after = not_after;

        let key_pair = KeyPair::generate().map_err(|e| {
            PkiError::KeyGenerationFailed(format!("failed to generate CA key: {}", e))
        })?;

        let cert = params.self_signed(&key_pair).map_err(|e| {
            PkiError::CertificateGenerationFailed(format!("failed to create CA cert: {}", e))
        })?;

        let cert_pem = cert.pem();
        let info = CertificateInfo::from_der(cert.der())?;

        Ok(Self {
            cert_pem,
            key_pem: Some(key_pair.serialize_pem()),
            info,
        })
    }

    /// Load a CA we persisted ourselves from its certificate and key PEM
    ///
    /// The key must parse and belong to the certificate. Validity is not
    /// checked here; callers decide with [`CertificateAuthority::can_reuse`].
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let der = parse_pem(cert_pem)?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| PkiError::ParseError(format!("failed to parse CA cert: {}", e)))?;
        let key_pair = parse_key_pair(key_pem)?;
        ensure_key_matches(&key_pair, &cert)?;

        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pem: Some(key_pem.to_string()),
            info: CertificateInfo::from_x509(&cert),
        })
    }

    /// Load a CA from a directory containing `tls.crt` and `tls.key`
    ///
    /// Used for the shared CA handed to every cluster an operator manages.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(dir.join(CA_DIR_CERT_FILE))?;
        let key_pem = std::fs::read_to_string(dir.join(CA_DIR_KEY_FILE))?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Parse and validate a user-supplied CA at the current time
    ///
    /// See [`CertificateAuthority::parse_custom_at`].
    pub fn parse_custom(cert_pem: &[u8], key_pem: Option<&[u8]>) -> Result<Self> {
        Self::parse_custom_at(cert_pem, key_pem, unix_now())
    }

    /// Parse and validate a user-supplied CA
    ///
    /// The certificate bundle must hold exactly one certificate, marked as a
    /// CA, allowed to sign certificates when key usage is restricted, and
    /// valid at `now`. When a key is supplied it must match the certificate.
    /// Without a key the CA is trust-only.
    pub fn parse_custom_at(cert_pem: &[u8], key_pem: Option<&[u8]>, now: i64) -> Result<Self> {
        let blocks = ::pem::parse_many(cert_pem)
            .map_err(|e| PkiError::ParseError(format!("failed to parse PEM: {}", e)))?;
        let certs: Vec<&::pem::Pem> = blocks
            .iter()
            .filter(|p| p.tag() == CERTIFICATE_PEM_TAG)
            .collect();

        let cert_block = match certs.as_slice() {
            [] => {
                return Err(PkiError::InvalidCa(
                    "no PEM certificate found".to_string(),
                ))
            }
            [single] => *single,
            many => {
                return Err(PkiError::InvalidCa(format!(
                    "expected exactly one CA certificate, found {}",
                    many.len()
                )))
            }
        };

        let (_, cert) = X509Certificate::from_der(cert_block.contents())
            .map_err(|e| PkiError::ParseError(format!("failed to parse CA cert: {}", e)))?;

        if !cert.is_ca() {
            return Err(PkiError::InvalidCa(
                "certificate is not a CA (basic constraints CA:TRUE missing)".to_string(),
            ));
        }

        if let Ok(Some(key_usage)) = cert.key_usage() {
            if !key_usage.value.key_cert_sign() {
                return Err(PkiError::InvalidCa(
                    "key usage does not permit certificate signing".to_string(),
                ));
            }
        }

        let info = CertificateInfo::from_x509(&cert);
        if now < info.not_before {
            return Err(PkiError::InvalidCa(format!(
                "certificate is not valid before {}",
                cert.validity().not_before
            )));
        }
        if now > info.not_after {
            return Err(PkiError::InvalidCa(format!(
                "certificate expired at {}",
                cert.validity().not_after
            )));
        }

        let key_pem = match key_pem {
            Some(bytes) => {
                let key_str = std::str::from_utf8(bytes).map_err(|e| {
                    PkiError::ParseError(format!("CA key is not valid UTF-8: {}", e))
                })?;
                let key_pair = parse_key_pair(key_str)?;
                ensure_key_matches(&key_pair, &cert)?;
                Some(key_str.to_string())
            }
            None => None,
        };

        Ok(Self {
            cert_pem: ::pem::encode(cert_block),
            key_pem,
            info,
        })
    }

    /// Get the CA certificate in PEM format
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Get the CA private key in PEM format, if this CA can sign
    pub fn key_pem(&self) -> Option<&str> {
        self.key_pem.as_deref()
    }

    /// Whether the private key is available (false for trust-only CAs)
    pub fn can_sign(&self) -> bool {
        self.key_pem.is_some()
    }

    /// Validity information of the CA certificate
    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    /// Expiry of the CA certificate (Unix timestamp)
    pub fn not_after(&self) -> i64 {
        self.info.not_after
    }

    /// Whether this CA can keep being used at `now` under `params`
    ///
    /// True when the CA is already valid and more than `rotate_before`
    /// remains before it expires.
    pub fn can_reuse_at(&self, params: &RotationParams, now: i64) -> bool {
        self.info.not_before <= now && now < params.renew_at(self.info.not_after)
    }

    /// Whether this CA can keep being used now under `params`
    pub fn can_reuse(&self, params: &RotationParams) -> bool {
        self.can_reuse_at(params, unix_now())
    }

    /// Unix timestamp at which this CA should be renewed under `params`
    pub fn renew_at(&self, params: &RotationParams) -> i64 {
        params.renew_at(self.info.not_after)
    }
}

fn ensure_key_matches(key_pair: &KeyPair, cert: &X509Certificate<'_>) -> Result<()> {
    if key_pair.subject_public_key_info() != cert.public_key().raw {
        return Err(PkiError::InvalidCa(
            "private key does not match the certificate public key".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SECONDS_PER_DAY, DEFAULT_CA_VALIDITY};

    const ONE_YEAR: Duration = Duration::from_secs(365 * SECONDS_PER_DAY);

    fn leaf_certificate() -> (String, String) {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String("leaf".to_string()));
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        let key = KeyPair::generate().expect("key generation should succeed");
        let cert = params
            .self_signed(&key)
            .expect("leaf generation should succeed");
        (cert.pem(), key.serialize_pem())
    }

    #[test]
    fn ca_can_be_generated() {
        let ca = CertificateAuthority::generate("Tessera Test CA", ONE_YEAR)
            .expect("CA generation should succeed");
        assert!(ca.cert_pem().contains("BEGIN CERTIFICATE"));
        assert!(ca.key_pem().expect("generated CA has a key").contains("PRIVATE KEY"));
        assert!(ca.can_sign());
        assert_eq!(ca.info().common_name, "Tessera Test CA");
    }

    #[test]
    fn generated_ca_honours_requested_validity() {
        let ca = CertificateAuthority::generate("Short CA", Duration::from_secs(30 * SECONDS_PER_DAY))
            .expect("CA generation should succeed");
        let days = ca.info().lifetime_secs() / SECONDS_PER_DAY as i64;
        assert!((days - 30).abs() <= 1, "expected ~30 days, got {}", days);
        assert!(ca.not_after() > unix_now());
    }

    #[test]
    fn generated_ca_passes_custom_validation() {
        let ca = CertificateAuthority::generate("Roundtrip CA", ONE_YEAR)
            .expect("CA generation should succeed");
        let parsed = CertificateAuthority::parse_custom(
            ca.cert_pem().as_bytes(),
            ca.key_pem().map(str::as_bytes),
        )
        .expect("a generated CA is a valid custom CA");
        assert_eq!(parsed.info(), ca.info());
        assert!(parsed.can_sign());
    }

    #[test]
    fn ca_can_be_saved_and_loaded() {
        let ca = CertificateAuthority::generate("Persistent CA", ONE_YEAR)
            .expect("CA generation should succeed");
        let key = ca.key_pem().expect("generated CA has a key");

        let loaded = CertificateAuthority::from_pem(ca.cert_pem(), key)
            .expect("CA loading should succeed");
        assert_eq!(loaded, ca);
    }

    #[test]
    fn regenerated_ca_is_not_equal() {
        let first = CertificateAuthority::generate("CA", ONE_YEAR).expect("generation");
        let second = CertificateAuthority::generate("CA", ONE_YEAR).expect("generation");
        assert_ne!(first, second);
    }

    /// Story: Error handling - corrupted or mismatched persisted material
    #[test]
    fn story_corrupted_ca_detection() {
        let good = CertificateAuthority::generate("Good CA", ONE_YEAR).expect("generation");
        let other = CertificateAuthority::generate("Other CA", ONE_YEAR).expect("generation");
        let good_key = good.key_pem().expect("key");

        assert!(CertificateAuthority::from_pem(good.cert_pem(), "invalid key pem").is_err());
        assert!(CertificateAuthority::from_pem("invalid cert pem", good_key).is_err());

        let mismatched =
            CertificateAuthority::from_pem(other.cert_pem(), good_key);
        assert!(matches!(mismatched, Err(PkiError::InvalidCa(_))));
    }

    #[test]
    fn custom_ca_without_key_is_trust_only() {
        let ca = CertificateAuthority::generate("Trust CA", ONE_YEAR).expect("generation");
        let parsed = CertificateAuthority::parse_custom(ca.cert_pem().as_bytes(), None)
            .expect("certificate-only CA should parse");
        assert!(!parsed.can_sign());
        assert!(parsed.key_pem().is_none());
    }

    #[test]
    fn custom_ca_rejects_garbage() {
        let result = CertificateAuthority::parse_custom(b"definitely not pem", None);
        assert!(result.is_err());

        let result = CertificateAuthority::parse_custom(
            b"-----BEGIN CERTIFICATE-----\ncorrupted\n-----END CERTIFICATE-----\n",
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn custom_ca_requires_exactly_one_certificate() {
        let first = CertificateAuthority::generate("One", ONE_YEAR).expect("generation");
        let second = CertificateAuthority::generate("Two", ONE_YEAR).expect("generation");
        let bundle = format!("{}{}", first.cert_pem(), second.cert_pem());

        match CertificateAuthority::parse_custom(bundle.as_bytes(), None) {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("found 2"), "{}", msg),
            other => panic!("expected InvalidCa, got {:?}", other),
        }
    }

    #[test]
    fn custom_ca_must_be_a_ca() {
        let (cert, key) = leaf_certificate();
        match CertificateAuthority::parse_custom(cert.as_bytes(), Some(key.as_bytes())) {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("not a CA")),
            other => panic!("expected InvalidCa, got {:?}", other),
        }
    }

    #[test]
    fn custom_ca_key_must_match_certificate() {
        let ca = CertificateAuthority::generate("Cert", ONE_YEAR).expect("generation");
        let other = CertificateAuthority::generate("Key", ONE_YEAR).expect("generation");

        let result = CertificateAuthority::parse_custom(
            ca.cert_pem().as_bytes(),
            other.key_pem().map(str::as_bytes),
        );
        match result {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("does not match")),
            other => panic!("expected InvalidCa, got {:?}", other),
        }
    }

    #[test]
    fn custom_ca_outside_validity_window_is_rejected() {
        let ca = CertificateAuthority::generate("Window", ONE_YEAR).expect("generation");
        let cert = ca.cert_pem().as_bytes();

        let expired_at = ca.not_after() + 1;
        match CertificateAuthority::parse_custom_at(cert, None, expired_at) {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected InvalidCa, got {:?}", other),
        }

        let before = ca.info().not_before - 1;
        match CertificateAuthority::parse_custom_at(cert, None, before) {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("not valid before")),
            other => panic!("expected InvalidCa, got {:?}", other),
        }
    }

    #[test]
    fn fresh_ca_is_reusable_until_renewal_point() {
        let params = RotationParams::default();
        let ca = CertificateAuthority::generate("Rotating", DEFAULT_CA_VALIDITY)
            .expect("generation");
        let renew_at = ca.renew_at(&params);

        assert!(ca.can_reuse(&params));
        assert!(ca.can_reuse_at(&params, renew_at - 1));
        assert!(!ca.can_reuse_at(&params, renew_at));
        assert!(!ca.can_reuse_at(&params, ca.not_after() + 1));
    }

    #[test]
    fn margin_longer_than_validity_never_reuses() {
        let params = RotationParams::new(ONE_YEAR, ONE_YEAR * 2).expect("params");
        let ca = CertificateAuthority::generate("Always stale", ONE_YEAR).expect("generation");
        assert!(!ca.can_reuse(&params));
    }

    #[test]
    fn ca_can_be_loaded_from_directory() {
        let ca = CertificateAuthority::generate("Shared CA", ONE_YEAR).expect("generation");
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CA_DIR_CERT_FILE), ca.cert_pem()).expect("write cert");
        std::fs::write(
            dir.path().join(CA_DIR_KEY_FILE),
            ca.key_pem().expect("key"),
        )
        .expect("write key");

        let loaded = CertificateAuthority::from_dir(dir.path()).expect("load from dir");
        assert_eq!(loaded, ca);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = CertificateAuthority::from_dir(&dir.path().join("absent"));
        assert!(matches!(result, Err(PkiError::Io(_))));
    }

    #[test]
    fn debug_output_never_contains_key_material() {
        let ca = CertificateAuthority::generate("Debug CA", ONE_YEAR).expect("generation");
        let debug = format!("{:?}", ca);
        assert!(debug.contains("Debug CA"));
        assert!(!debug.contains("PRIVATE KEY"));
    }

    /// Story: PEM parsing error handling
    #[test]
    fn story_pem_parsing_errors() {
        match parse_pem("this is not valid PEM data at all") {
            Err(PkiError::ParseError(msg)) => assert!(msg.contains("parse PEM")),
            _ => panic!("Expected ParseError"),
        }
    }

    const OPENSSL_RSA_CA: &str = include_str!("../testdata/rsa-pkcs1.crt");
    const OPENSSL_RSA_PKCS1_KEY: &str = include_str!("../testdata/rsa-pkcs1.key");
    const OPENSSL_EC_CA: &str = include_str!("../testdata/ec-sec1.crt");
    const OPENSSL_EC_SEC1_KEY: &str = include_str!("../testdata/ec-sec1.key");

    /// prime256v1, as written by `openssl ecparam -genkey` without `-noout`
    const EC_PARAMETERS_BLOCK: &str =
        "-----BEGIN EC PARAMETERS-----\nBggqhkjOPQMBBw==\n-----END EC PARAMETERS-----\n";

    #[test]
    fn custom_ca_accepts_pkcs1_rsa_key() {
        assert!(OPENSSL_RSA_PKCS1_KEY.contains("BEGIN RSA PRIVATE KEY"));
        let ca = CertificateAuthority::parse_custom(
            OPENSSL_RSA_CA.as_bytes(),
            Some(OPENSSL_RSA_PKCS1_KEY.as_bytes()),
        )
        .expect("PKCS#1 RSA key should be accepted");

        assert!(ca.can_sign());
        assert_eq!(ca.info().common_name, "OpenSSL RSA CA");
        assert_eq!(ca.key_pem(), Some(OPENSSL_RSA_PKCS1_KEY));
    }

    #[test]
    fn custom_ca_accepts_sec1_ec_key() {
        assert!(OPENSSL_EC_SEC1_KEY.contains("BEGIN EC PRIVATE KEY"));
        let ca = CertificateAuthority::parse_custom(
            OPENSSL_EC_CA.as_bytes(),
            Some(OPENSSL_EC_SEC1_KEY.as_bytes()),
        )
        .expect("SEC1 EC key should be accepted");
        assert!(ca.can_sign());

        let with_parameters = format!("{}{}", EC_PARAMETERS_BLOCK, OPENSSL_EC_SEC1_KEY);
        CertificateAuthority::parse_custom(
            OPENSSL_EC_CA.as_bytes(),
            Some(with_parameters.as_bytes()),
        )
        .expect("leading EC PARAMETERS block should be skipped");
    }

    #[test]
    fn traditional_keys_still_have_to_match() {
        let result = CertificateAuthority::parse_custom(
            OPENSSL_EC_CA.as_bytes(),
            Some(OPENSSL_RSA_PKCS1_KEY.as_bytes()),
        );
        assert!(matches!(result, Err(PkiError::InvalidCa(_))));
    }

    #[test]
    fn key_pem_without_private_key_block_is_rejected() {
        let result = CertificateAuthority::parse_custom(
            OPENSSL_EC_CA.as_bytes(),
            Some(EC_PARAMETERS_BLOCK.as_bytes()),
        );
        match result {
            Err(PkiError::ParseError(msg)) => assert!(msg.contains("no PEM private key")),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn shared_ca_directory_accepts_pkcs1_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CA_DIR_CERT_FILE), OPENSSL_RSA_CA).expect("write cert");
        std::fs::write(dir.path().join(CA_DIR_KEY_FILE), OPENSSL_RSA_PKCS1_KEY)
            .expect("write key");

        let loaded = CertificateAuthority::from_dir(dir.path()).expect("load from dir");
        assert_eq!(loaded.info().common_name, "OpenSSL RSA CA");
    }

    #[test]
    fn custom_ca_key_usage_must_allow_certificate_signing() {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String("signing-only".to_string()));
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        let key = KeyPair::generate().expect("key generation should succeed");
        let cert = params.self_signed(&key).expect("certificate generation should succeed");

        let result = CertificateAuthority::parse_custom(
            cert.pem().as_bytes(),
            Some(key.serialize_pem().as_bytes()),
        );
        match result {
            Err(PkiError::InvalidCa(msg)) => assert!(msg.contains("key usage"), "{}", msg),
            other => panic!("expected InvalidCa, got {:?}", other),
        }
    }

    #[test]
    fn enormous_margin_never_reuses() {
        let params =
            RotationParams::new(ONE_YEAR, Duration::from_secs(u64::MAX)).expect("params");
        let ca = CertificateAuthority::generate("Huge margin", ONE_YEAR).expect("generation");
        assert!(!ca.can_reuse(&params));
        assert!(ca.renew_at(&params) < ca.info().not_before);
    }
}
