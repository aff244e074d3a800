//! Controller runner - wires the TesseraCluster controller to its watches

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{metadata_watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};

use tessera_common::crd::TesseraCluster;
use tessera_transport::WatchRegistry;

use crate::controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the TesseraCluster controller future
///
/// Besides its own resources the controller watches Secret metadata; a Secret
/// change re-queues the clusters the watch registry lists for it. Only names
/// are needed for the mapping, so Secret payloads are never streamed.
pub fn build_controller(
    client: Client,
    ctx: Arc<Context>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let clusters: Api<TesseraCluster> = Api::all(client.clone());
    let secrets = metadata_watcher(
        Api::<Secret>::all(client),
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .default_backoff()
    .touched_objects();
    let registry = ctx.registry.clone();

    tracing::info!("- TesseraCluster controller");

    Box::pin(
        Controller::new(
            clusters,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .watches_stream(secrets, move |secret| {
            clusters_watching(&registry, &secret)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("TesseraCluster")),
    )
}

/// Clusters to re-queue after `secret` changed
fn clusters_watching<S: Resource>(
    registry: &WatchRegistry,
    secret: &S,
) -> Vec<ObjectRef<TesseraCluster>> {
    let Some(namespace) = secret.namespace() else {
        return vec![];
    };
    let target = ObjectRef::<Secret>::new(&secret.name_any()).within(&namespace);
    let affected = registry.watchers_of(&target);
    if !affected.is_empty() {
        tracing::debug!(
            secret = %target,
            affected_count = affected.len(),
            "Triggering re-reconciliation of clusters watching secret"
        );
    }
    affected
        .into_iter()
        .map(|id| ObjectRef::<TesseraCluster>::new(&id.name).within(&id.namespace))
        .collect()
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use kube::core::PartialObjectMetaExt;
    use tessera_common::crd::SecretRef;
    use tessera_common::ClusterIdentity;
    use tessera_transport::naming::custom_transport_certs_watch_key;
    use tessera_transport::watches::reconcile_custom_cert_watch;

    fn secret(namespace: &str, name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn watch(registry: &WatchRegistry, namespace: &str, cluster: &str, secret_name: &str) {
        let id = ClusterIdentity::new(namespace, cluster);
        reconcile_custom_cert_watch(
            registry,
            custom_transport_certs_watch_key(&id),
            Some(&SecretRef::new(secret_name)),
        )
        .expect("register");
    }

    #[test]
    fn watched_secret_requeues_its_clusters() {
        let registry = WatchRegistry::new();
        watch(&registry, "search", "logs", "custom-ca");
        watch(&registry, "search", "metrics", "custom-ca");
        watch(&registry, "other", "logs", "custom-ca");

        let refs = clusters_watching(&registry, &secret("search", "custom-ca"));

        assert_eq!(
            refs,
            vec![
                ObjectRef::<TesseraCluster>::new("logs").within("search"),
                ObjectRef::<TesseraCluster>::new("metrics").within("search"),
            ]
        );
    }

    #[test]
    fn unrelated_secret_requeues_nothing() {
        let registry = WatchRegistry::new();
        watch(&registry, "search", "logs", "custom-ca");

        assert!(clusters_watching(&registry, &secret("search", "other")).is_empty());
        assert!(clusters_watching(&registry, &Secret::default()).is_empty());
    }

    #[test]
    fn metadata_only_events_requeue_watchers() {
        let registry = WatchRegistry::new();
        watch(&registry, "search", "logs", "custom-ca");

        let meta = ObjectMeta {
            name: Some("custom-ca".to_string()),
            namespace: Some("search".to_string()),
            ..Default::default()
        }
        .into_request_partial::<Secret>();

        assert_eq!(
            clusters_watching(&registry, &meta),
            vec![ObjectRef::<TesseraCluster>::new("logs").within("search")]
        );
    }
}
