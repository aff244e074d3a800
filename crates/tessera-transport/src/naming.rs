//! Deterministic names derived from a cluster identity
//!
//! Lookups by these names need no index: the same cluster always maps to the
//! same secret and the same watch key.

use tessera_common::ClusterIdentity;

use crate::watches::WatchKey;

/// Suffix of the operator-managed self-signed transport CA secret
pub const TRANSPORT_CA_INTERNAL_SUFFIX: &str = "transport-ca-internal";

/// Purpose suffix of the watch on a user-supplied transport CA secret
pub const CUSTOM_TRANSPORT_CERTS_SUFFIX: &str = "custom-transport-certs";

/// Name of the self-signed transport CA secret for a cluster
pub fn self_signed_ca_secret_name(cluster_name: &str) -> String {
    format!("{}-{}", cluster_name, TRANSPORT_CA_INTERNAL_SUFFIX)
}

/// Watch key for the custom transport CA secret of a cluster
pub fn custom_transport_certs_watch_key(cluster: &ClusterIdentity) -> WatchKey {
    WatchKey::new(
        cluster.clone(),
        format!("{}-{}", cluster.name, CUSTOM_TRANSPORT_CERTS_SUFFIX),
    )
}
