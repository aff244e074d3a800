//! TesseraCluster controller
//!
//! Each pass:
//! 1. handles deletion (drop watch registrations, release the finalizer)
//! 2. ensures the finalizer is present
//! 3. selects the authoritative transport CA
//! 4. records the result on the cluster status and requeues at the CA's
//!    renewal instant
//!
//! User configuration errors (bad custom CA reference) are written to the
//! status message before the error is returned, so `kubectl get` shows why the
//! cluster is stuck while the previous CA stays in effect.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use tessera_common::crd::{CaSource, TesseraCluster, TesseraClusterStatus, TransportCaStatus};
use tessera_common::events::{EventPublisher, KubeEventPublisher};
use tessera_common::{ClusterIdentity, Error, FIELD_MANAGER};
use tessera_pki::{unix_now, CertificateAuthority, RotationParams};
use tessera_transport::naming::self_signed_ca_secret_name;
use tessera_transport::{
    reconcile_or_retrieve_ca, AuthoritativeCa, KubeSecretStore, SecretStore, TransportCaContext,
    TransportCaRequest, WatchRegistry, DEFAULT_OPERATION_TIMEOUT,
};

/// Finalizer guarding removal of a cluster's watch registrations
pub const TRANSPORT_CA_FINALIZER: &str = "tessera.dev/transport-ca";

/// Label marking resources managed by this operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Longest interval between two passes of a healthy cluster
pub const MAX_REQUEUE: Duration = Duration::from_secs(3600);

/// Requeue delay after a transient failure
pub const TRANSIENT_RETRY: Duration = Duration::from_secs(5);

/// Requeue delay after a user configuration error
///
/// The Secret watch re-triggers the cluster as soon as the referenced secret
/// changes, so this only bounds how long a stale error can linger.
pub const USER_CONFIGURATION_RETRY: Duration = Duration::from_secs(60);

/// Trait abstracting TesseraCluster writes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Replace the status of a TesseraCluster
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &TesseraClusterStatus,
    ) -> Result<(), Error>;

    /// Add a finalizer (no-op when already present)
    async fn add_finalizer(&self, namespace: &str, name: &str, finalizer: &str)
        -> Result<(), Error>;

    /// Remove a finalizer (no-op when absent)
    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a new KubeClusterClient wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<TesseraCluster> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &TesseraClusterStatus,
    ) -> Result<(), Error> {
        let status_patch = serde_json::json!({
            "status": status
        });

        self.api(namespace)
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?;

        Ok(())
    }

    async fn add_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let cluster = self.api(namespace).get(name).await?;
        let mut finalizers = cluster.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(namespace, name, finalizers).await
    }

    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let cluster = self.api(namespace).get(name).await?;
        let current = cluster.metadata.finalizers.unwrap_or_default();
        if !current.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        let finalizers = current.into_iter().filter(|f| f != finalizer).collect();
        self.patch_finalizers(namespace, name, finalizers).await
    }
}

/// Shared state of the TesseraCluster controller
pub struct Context {
    /// Cluster writes (trait object for testability)
    pub kube: Arc<dyn ClusterClient>,
    /// Collaborators of the transport CA selection
    pub transport: TransportCaContext,
    /// Watch registry consulted by the Secret watch
    pub registry: Arc<WatchRegistry>,
    /// CA shared by every cluster, if configured
    pub shared_ca: Option<Arc<CertificateAuthority>>,
    /// Validity and renewal of self-signed CAs
    pub rotation: RotationParams,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with in-memory collaborators
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn ClusterClient>,
        store: Arc<dyn SecretStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let registry = Arc::new(WatchRegistry::new());
        Self {
            kube,
            transport: TransportCaContext::new(store, registry.clone(), events),
            registry,
            shared_ca: None,
            rotation: RotationParams::default(),
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn ClusterClient>>,
    store: Option<Arc<dyn SecretStore>>,
    events: Option<Arc<dyn EventPublisher>>,
    registry: Option<Arc<WatchRegistry>>,
    shared_ca: Option<Arc<CertificateAuthority>>,
    rotation: RotationParams,
    operation_timeout: Duration,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            store: None,
            events: None,
            registry: None,
            shared_ca: None,
            rotation: RotationParams::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the cluster client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn ClusterClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the secret store (primarily for testing)
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the event publisher
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share an existing watch registry
    pub fn watch_registry(mut self, registry: Arc<WatchRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a CA shared by every managed cluster
    pub fn shared_ca(mut self, ca: Option<Arc<CertificateAuthority>>) -> Self {
        self.shared_ca = ca;
        self
    }

    /// Validity and renewal of self-signed CAs
    pub fn rotation(mut self, rotation: RotationParams) -> Self {
        self.rotation = rotation;
        self
    }

    /// Deadline for each Secret API call
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(WatchRegistry::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(KubeSecretStore::new(self.client.clone())));
        let events = self.events.unwrap_or_else(|| {
            Arc::new(KubeEventPublisher::new(
                self.client.clone(),
                FIELD_MANAGER,
            ))
        });
        let transport = TransportCaContext::new(store, registry.clone(), events)
            .with_operation_timeout(self.operation_timeout);

        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClusterClient::new(self.client))),
            transport,
            registry,
            shared_ca: self.shared_ca,
            rotation: self.rotation,
        }
    }
}

/// Reconcile a TesseraCluster
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<TesseraCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let id = ClusterIdentity::of(cluster.as_ref()).ok_or_else(|| {
        Error::validation_for(cluster.name_any(), "TesseraCluster has no namespace")
    })?;

    if cluster.metadata.deletion_timestamp.is_some() {
        return cleanup(&cluster, &id, &ctx).await;
    }

    if !has_finalizer(&cluster) {
        debug!("Adding transport CA finalizer");
        ctx.kube
            .add_finalizer(&id.namespace, &id.name, TRANSPORT_CA_FINALIZER)
            .await?;
    }

    let event_ref = cluster.object_ref(&());
    let owner = cluster.controller_owner_ref(&());
    let labels = BTreeMap::from([(MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string())]);
    let request = TransportCaRequest {
        cluster: &id,
        event_ref: &event_ref,
        owner_reference: owner.as_ref(),
        labels: &labels,
        custom_ca: cluster.spec.custom_transport_ca(),
        shared_ca: ctx.shared_ca.as_ref(),
        rotation: ctx.rotation,
    };

    let ca = match reconcile_or_retrieve_ca(&ctx.transport, &request).await {
        Ok(ca) => ca,
        Err(e) => {
            if e.is_user_configuration() {
                record_failure(&cluster, &id, &ctx, &e).await;
            }
            return Err(e);
        }
    };

    let status = TesseraClusterStatus {
        observed_generation: cluster.metadata.generation,
        transport_ca: Some(transport_ca_status(&cluster, &ca)),
        message: Some(format!("Transport CA source: {}", ca.source())),
    };
    if cluster.status.as_ref() != Some(&status) {
        ctx.kube
            .patch_status(&id.namespace, &id.name, &status)
            .await?;
    }

    let requeue = requeue_after(&ca, &ctx.rotation, unix_now());
    info!(
        source = %ca.source(),
        requeue_secs = requeue.as_secs(),
        "Transport CA reconciled"
    );
    Ok(Action::requeue(requeue))
}

/// Requeue policy for failed passes
pub fn error_policy(cluster: Arc<TesseraCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_user_configuration() {
        warn!(
            cluster = %cluster.name_any(),
            error = %error,
            "Transport CA configuration error, waiting for a fix"
        );
        return Action::requeue(USER_CONFIGURATION_RETRY);
    }
    error!(
        ?error,
        cluster = %cluster.name_any(),
        "Transport CA reconciliation failed"
    );
    Action::requeue(TRANSIENT_RETRY)
}

async fn cleanup(
    cluster: &TesseraCluster,
    id: &ClusterIdentity,
    ctx: &Context,
) -> Result<Action, Error> {
    ctx.registry.unregister_owner(id);
    if has_finalizer(cluster) {
        ctx.kube
            .remove_finalizer(&id.namespace, &id.name, TRANSPORT_CA_FINALIZER)
            .await?;
        info!("Released transport CA finalizer");
    }
    Ok(Action::await_change())
}

async fn record_failure(cluster: &TesseraCluster, id: &ClusterIdentity, ctx: &Context, e: &Error) {
    let status = TesseraClusterStatus {
        observed_generation: cluster.metadata.generation,
        transport_ca: cluster.status.as_ref().and_then(|s| s.transport_ca.clone()),
        message: Some(e.to_string()),
    };
    if let Err(patch_err) = ctx.kube.patch_status(&id.namespace, &id.name, &status).await {
        warn!(error = %patch_err, "Failed to record transport CA error on status");
    }
}

fn has_finalizer(cluster: &TesseraCluster) -> bool {
    cluster
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|s| s == TRANSPORT_CA_FINALIZER))
}

fn transport_ca_status(cluster: &TesseraCluster, ca: &AuthoritativeCa) -> TransportCaStatus {
    let secret_name = match ca.source() {
        CaSource::Custom => cluster
            .spec
            .custom_transport_ca()
            .and_then(|r| r.name())
            .map(str::to_string),
        CaSource::SelfSigned => Some(self_signed_ca_secret_name(&cluster.name_any())),
        CaSource::Shared => None,
    };
    TransportCaStatus {
        source: ca.source(),
        not_after: chrono::DateTime::from_timestamp(ca.ca().not_after(), 0)
            .map(|t| t.to_rfc3339()),
        secret_name,
    }
}

/// Time until the next pass: the self-signed CA's renewal instant, capped
fn requeue_after(ca: &AuthoritativeCa, rotation: &RotationParams, now: i64) -> Duration {
    let until = match ca {
        AuthoritativeCa::SelfSigned(ca) => ca.renew_at(rotation) - now,
        // Custom and shared CAs are not renewed by us; re-check on expiry
        AuthoritativeCa::Custom(ca) => ca.not_after() - now,
        AuthoritativeCa::Shared(ca) => ca.not_after() - now,
    };
    Duration::from_secs(until.max(1) as u64).min(MAX_REQUEUE)
}
