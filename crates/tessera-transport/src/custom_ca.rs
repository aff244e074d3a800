//! Custom (user-supplied) transport CA
//!
//! A cluster may point `spec.transport.tls.certificate` at a Secret holding
//! its own CA. The secret must carry `ca.crt` and may carry `ca.key`; without
//! a key the CA is trust-only.
//!
//! A dangling reference or unusable content is a user configuration problem:
//! it is reported as a Warning event on the cluster and returned as an error,
//! so the pass aborts and whatever CA was in effect stays in effect.

use k8s_openapi::api::core::v1::Secret;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, warn};

use tessera_common::events::{actions, reasons};
use tessera_common::Error;
use tessera_pki::CertificateAuthority;

use crate::selection::{TransportCaContext, TransportCaRequest};
use crate::store::{secret_data, BoundedSecretStore};

/// Secret key holding the PEM CA certificate
pub const CA_CERT_KEY: &str = "ca.crt";

/// Secret key holding the optional PEM CA private key
pub const CA_PRIVATE_KEY_KEY: &str = "ca.key";

/// Parse and validate a custom CA secret
///
/// An empty `ca.key` is treated as absent.
pub fn parse_custom_ca_secret(secret: &Secret) -> Result<CertificateAuthority, Error> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();

    let cert = secret_data(secret, CA_CERT_KEY).ok_or_else(|| {
        Error::invalid_custom_ca(
            &namespace,
            &name,
            format!("can't find certificate {} in secret", CA_CERT_KEY),
        )
    })?;
    let key = secret_data(secret, CA_PRIVATE_KEY_KEY).filter(|k| !k.is_empty());

    CertificateAuthority::parse_custom(cert, key)
        .map_err(|e| Error::invalid_custom_ca(&namespace, &name, e.to_string()))
}

/// Resolve the custom CA referenced by the request
///
/// Returns `Ok(None)` when no custom CA is configured.
pub async fn resolve_custom_ca(
    ctx: &TransportCaContext,
    request: &TransportCaRequest<'_>,
) -> Result<Option<CertificateAuthority>, Error> {
    let Some(secret_name) = request.custom_ca.and_then(|r| r.name()) else {
        return Ok(None);
    };
    let namespace = &request.cluster.namespace;
    let store = BoundedSecretStore::new(ctx.store.as_ref(), ctx.operation_timeout);

    let secret = fetch_referenced_secret(&store, namespace, secret_name).await?;
    let Some(secret) = secret else {
        let err = Error::custom_ca_not_found(namespace, secret_name);
        warn!(
            cluster = %request.cluster,
            secret = %secret_name,
            "Referenced custom transport CA secret not found"
        );
        ctx.events
            .publish(
                request.event_ref,
                EventType::Warning,
                reasons::UNEXPECTED,
                actions::RESOLVE_CUSTOM_CA,
                Some(err.to_string()),
            )
            .await;
        return Err(err);
    };

    match parse_custom_ca_secret(&secret) {
        Ok(ca) => {
            debug!(
                cluster = %request.cluster,
                secret = %secret_name,
                can_sign = ca.can_sign(),
                "Using custom transport CA"
            );
            Ok(Some(ca))
        }
        Err(err) => {
            warn!(
                cluster = %request.cluster,
                secret = %secret_name,
                error = %err,
                "Custom transport CA failed validation"
            );
            ctx.events
                .publish(
                    request.event_ref,
                    EventType::Warning,
                    reasons::VALIDATION_FAILED,
                    actions::RESOLVE_CUSTOM_CA,
                    Some(err.to_string()),
                )
                .await;
            Err(err)
        }
    }
}

async fn fetch_referenced_secret(
    store: &BoundedSecretStore<'_>,
    namespace: &str,
    name: &str,
) -> Result<Option<Secret>, Error> {
    // Transient: no event, the driver retries the pass
    store.get(namespace, name).await
}
