//! Clean-up of the self-signed CA once a custom CA takes over
//!
//! Deletion here is hygiene only. A failure is logged and reported through
//! [`GcOutcome`]; it never becomes an [`Error`](tessera_common::Error) and
//! never aborts the pass.

use tracing::{debug, info, warn};

use tessera_common::ClusterIdentity;

use crate::naming::self_signed_ca_secret_name;
use crate::store::BoundedSecretStore;

/// What happened to the stale self-signed CA secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcOutcome {
    /// The secret existed and was deleted
    Deleted,
    /// There was nothing to delete
    AlreadyAbsent,
    /// Deletion failed; the secret may still exist
    Failed(String),
}

/// Best-effort delete of the cluster's self-signed transport CA secret
pub async fn collect_stale_self_signed(
    store: &BoundedSecretStore<'_>,
    cluster: &ClusterIdentity,
) -> GcOutcome {
    let secret_name = self_signed_ca_secret_name(&cluster.name);
    match store.delete(&cluster.namespace, &secret_name).await {
        Ok(true) => {
            info!(
                cluster = %cluster,
                secret = %secret_name,
                "Deleted self-signed transport CA superseded by custom CA"
            );
            GcOutcome::Deleted
        }
        Ok(false) => {
            debug!(
                cluster = %cluster,
                secret = %secret_name,
                "No self-signed transport CA to delete"
            );
            GcOutcome::AlreadyAbsent
        }
        Err(e) => {
            warn!(
                cluster = %cluster,
                secret = %secret_name,
                error = %e,
                "Failed to garbage collect self-signed transport CA secret, non-critical, continuing"
            );
            GcOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockSecretStore, DEFAULT_OPERATION_TIMEOUT};
    use std::time::Duration;
    use tessera_common::Error;

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("search", "logs")
    }

    #[tokio::test]
    async fn deletes_the_deterministic_secret() {
        let mut mock = MockSecretStore::new();
        mock.expect_delete()
            .withf(|ns, name| ns == "search" && name == "logs-transport-ca-internal")
            .times(1)
            .returning(|_, _| Ok(true));
        let store = BoundedSecretStore::new(&mock, DEFAULT_OPERATION_TIMEOUT);

        assert_eq!(
            collect_stale_self_signed(&store, &cluster()).await,
            GcOutcome::Deleted
        );
    }

    #[tokio::test]
    async fn not_found_is_success() {
        let mut mock = MockSecretStore::new();
        mock.expect_delete().returning(|_, _| Ok(false));
        let store = BoundedSecretStore::new(&mock, DEFAULT_OPERATION_TIMEOUT);

        assert_eq!(
            collect_stale_self_signed(&store, &cluster()).await,
            GcOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let mut mock = MockSecretStore::new();
        mock.expect_delete()
            .returning(|_, _| Err(Error::internal_with_context("test", "forbidden")));
        let store = BoundedSecretStore::new(&mock, DEFAULT_OPERATION_TIMEOUT);

        let outcome = collect_stale_self_signed(&store, &cluster()).await;
        assert!(matches!(outcome, GcOutcome::Failed(msg) if msg.contains("forbidden")));
    }

    #[tokio::test]
    async fn timeouts_are_reported_not_raised() {
        let mut mock = MockSecretStore::new();
        mock.expect_delete().returning(|ns, name| {
            Err(Error::timeout(
                format!("delete secret {}/{}", ns, name),
                Duration::from_secs(10),
            ))
        });
        let store = BoundedSecretStore::new(&mock, DEFAULT_OPERATION_TIMEOUT);

        let outcome = collect_stale_self_signed(&store, &cluster()).await;
        assert!(matches!(outcome, GcOutcome::Failed(msg) if msg.contains("timed out")));
    }
}
