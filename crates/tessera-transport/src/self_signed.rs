//! Operator-managed self-signed transport CA
//!
//! The CA lives in `<cluster>-transport-ca-internal` next to the cluster,
//! labelled with the cluster name and CA type and owned by the cluster so that
//! Kubernetes garbage collection removes it together with the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use tracing::{debug, info, warn};

use tessera_common::{
    ClusterIdentity, Error, CA_TYPE_LABEL, CLUSTER_NAME_LABEL, TRANSPORT_CA_TYPE,
};
use tessera_pki::{CertificateAuthority, RotationParams, CA_DIR_CERT_FILE, CA_DIR_KEY_FILE};

use crate::naming::self_signed_ca_secret_name;
use crate::store::{secret_data, BoundedSecretStore};

/// Secret key holding the self-signed CA certificate
pub const SELF_SIGNED_CERT_KEY: &str = CA_DIR_CERT_FILE;

/// Secret key holding the self-signed CA private key
pub const SELF_SIGNED_KEY_KEY: &str = CA_DIR_KEY_FILE;

/// Return the cluster's self-signed CA, generating a new one when needed
///
/// An existing CA is returned unchanged while it can be reused under
/// `rotation`. A missing, unparseable, or rotation-due CA is replaced by a
/// freshly generated one valid for `rotation.validity`.
pub async fn reconcile_self_signed_ca(
    store: &BoundedSecretStore<'_>,
    cluster: &ClusterIdentity,
    labels: &BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
    rotation: &RotationParams,
) -> Result<CertificateAuthority, Error> {
    let secret_name = self_signed_ca_secret_name(&cluster.name);
    let desired_labels = ca_labels(cluster, labels);

    if let Some(existing) = store.get(&cluster.namespace, &secret_name).await? {
        match load_self_signed_ca(&existing) {
            Ok(ca) if ca.can_reuse(rotation) => {
                if metadata_drifted(&existing, &desired_labels, owner) {
                    info!(
                        cluster = %cluster,
                        secret = %secret_name,
                        "Re-applying self-signed transport CA metadata"
                    );
                    store
                        .put(&build_ca_secret(
                            cluster,
                            &secret_name,
                            desired_labels,
                            owner,
                            &ca,
                        )?)
                        .await?;
                }
                debug!(
                    cluster = %cluster,
                    secret = %secret_name,
                    "Reusing self-signed transport CA"
                );
                return Ok(ca);
            }
            Ok(ca) => {
                info!(
                    cluster = %cluster,
                    secret = %secret_name,
                    not_after = ca.not_after(),
                    "Self-signed transport CA is due for rotation"
                );
            }
            Err(e) => {
                warn!(
                    cluster = %cluster,
                    secret = %secret_name,
                    error = %e,
                    "Self-signed transport CA secret is unusable, regenerating"
                );
            }
        }
    }

    let common_name = format!("{}-transport", cluster.name);
    let ca = CertificateAuthority::generate(&common_name, rotation.validity).map_err(|e| {
        Error::pki(format!(
            "failed to generate transport CA for {}: {}",
            cluster, e
        ))
    })?;

    store
        .put(&build_ca_secret(
            cluster,
            &secret_name,
            desired_labels,
            owner,
            &ca,
        )?)
        .await?;

    info!(
        cluster = %cluster,
        secret = %secret_name,
        not_after = ca.not_after(),
        "Created self-signed transport CA"
    );
    Ok(ca)
}

/// Load a persisted self-signed CA from its secret
pub fn load_self_signed_ca(secret: &Secret) -> Result<CertificateAuthority, Error> {
    let cert = utf8_entry(secret, SELF_SIGNED_CERT_KEY)?;
    let key = utf8_entry(secret, SELF_SIGNED_KEY_KEY)?;
    CertificateAuthority::from_pem(cert, key).map_err(|e| Error::pki(e.to_string()))
}

fn utf8_entry<'s>(secret: &'s Secret, key: &str) -> Result<&'s str, Error> {
    let bytes =
        secret_data(secret, key).ok_or_else(|| Error::pki(format!("CA secret missing {}", key)))?;
    std::str::from_utf8(bytes).map_err(|e| Error::pki(format!("invalid {} encoding: {}", key, e)))
}

fn ca_labels(
    cluster: &ClusterIdentity,
    labels: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = labels.clone();
    out.insert(CLUSTER_NAME_LABEL.to_string(), cluster.name.clone());
    out.insert(CA_TYPE_LABEL.to_string(), TRANSPORT_CA_TYPE.to_string());
    out
}

fn metadata_drifted(
    secret: &Secret,
    desired_labels: &BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
) -> bool {
    let labels = secret.metadata.labels.as_ref();
    let labels_match = desired_labels
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v));

    let owner_matches = match owner {
        Some(owner) => secret
            .metadata
            .owner_references
            .as_ref()
            .is_some_and(|refs| refs.iter().any(|r| r.uid == owner.uid)),
        None => true,
    };

    !(labels_match && owner_matches)
}

fn build_ca_secret(
    cluster: &ClusterIdentity,
    secret_name: &str,
    labels: BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
    ca: &CertificateAuthority,
) -> Result<Secret, Error> {
    let key_pem = ca.key_pem().ok_or_else(|| {
        Error::internal_with_context("self-signed-ca", "generated CA has no private key")
    })?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(secret_name.to_string()),
            namespace: Some(cluster.namespace.clone()),
            labels: Some(labels),
            owner_references: owner.map(|o| vec![o.clone()]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            (
                SELF_SIGNED_CERT_KEY.to_string(),
                ByteString(ca.cert_pem().as_bytes().to_vec()),
            ),
            (
                SELF_SIGNED_KEY_KEY.to_string(),
                ByteString(key_pem.as_bytes().to_vec()),
            ),
        ])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}
