//! Selection of the authoritative transport CA
//!
//! Every pass picks exactly one CA, in fixed precedence:
//!
//! 1. **Custom**: the cluster references a secret holding a valid CA
//! 2. **Shared**: the operator was given a CA for every cluster it manages
//! 3. **SelfSigned**: an operator-managed CA owned by the cluster
//!
//! Switching from self-signed to custom deletes the self-signed secret on a
//! best-effort basis. Switching back provisions a fresh self-signed CA. Any
//! error aborts the pass before the persisted CA is touched, so the previous
//! authoritative CA stays in effect until resolution succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, instrument};

use tessera_common::crd::{CaSource, SecretRef};
use tessera_common::events::EventPublisher;
use tessera_common::{ClusterIdentity, Error};
use tessera_pki::{CertificateAuthority, RotationParams};

use crate::custom_ca::resolve_custom_ca;
use crate::gc::collect_stale_self_signed;
use crate::naming::custom_transport_certs_watch_key;
use crate::self_signed::reconcile_self_signed_ca;
use crate::store::{BoundedSecretStore, SecretStore, DEFAULT_OPERATION_TIMEOUT};
use crate::watches::{reconcile_custom_cert_watch, DynamicWatches};

/// Collaborators shared by every pass
#[derive(Clone)]
pub struct TransportCaContext {
    /// Secret persistence
    pub store: Arc<dyn SecretStore>,
    /// Dynamic watch service
    pub watches: Arc<dyn DynamicWatches>,
    /// Event sink for user-facing warnings
    pub events: Arc<dyn EventPublisher>,
    /// Deadline for each store call
    pub operation_timeout: Duration,
}

impl TransportCaContext {
    /// Create a context with the default operation timeout
    pub fn new(
        store: Arc<dyn SecretStore>,
        watches: Arc<dyn DynamicWatches>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            watches,
            events,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the deadline for each store call
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn bounded_store(&self) -> BoundedSecretStore<'_> {
        BoundedSecretStore::new(self.store.as_ref(), self.operation_timeout)
    }
}

/// Inputs of one pass for one cluster
#[derive(Clone, Copy)]
pub struct TransportCaRequest<'a> {
    /// The cluster being reconciled
    pub cluster: &'a ClusterIdentity,
    /// Object that user-facing events are attached to
    pub event_ref: &'a ObjectReference,
    /// Owner reference placed on the self-signed CA secret
    pub owner_reference: Option<&'a OwnerReference>,
    /// Labels placed on the self-signed CA secret
    pub labels: &'a BTreeMap<String, String>,
    /// User-supplied CA reference from the cluster spec
    pub custom_ca: Option<&'a SecretRef>,
    /// CA shared across every cluster managed by this operator
    pub shared_ca: Option<&'a Arc<CertificateAuthority>>,
    /// Validity and renewal of self-signed CAs
    pub rotation: RotationParams,
}

/// The one CA that secures a cluster's transport traffic for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthoritativeCa {
    /// From the referenced custom CA secret
    Custom(CertificateAuthority),
    /// The operator-wide shared CA
    Shared(Arc<CertificateAuthority>),
    /// The operator-managed self-signed CA
    SelfSigned(CertificateAuthority),
}

impl AuthoritativeCa {
    /// Which source provided the CA
    pub fn source(&self) -> CaSource {
        match self {
            AuthoritativeCa::Custom(_) => CaSource::Custom,
            AuthoritativeCa::Shared(_) => CaSource::Shared,
            AuthoritativeCa::SelfSigned(_) => CaSource::SelfSigned,
        }
    }

    /// The CA itself
    pub fn ca(&self) -> &CertificateAuthority {
        match self {
            AuthoritativeCa::Custom(ca) | AuthoritativeCa::SelfSigned(ca) => ca,
            AuthoritativeCa::Shared(ca) => ca.as_ref(),
        }
    }
}

/// Decide the authoritative transport CA for one pass
///
/// The custom CA watch is reconciled first, so a later fix to a broken custom
/// CA secret re-triggers the cluster even when this pass fails.
#[instrument(skip_all, fields(cluster = %request.cluster))]
pub async fn reconcile_or_retrieve_ca(
    ctx: &TransportCaContext,
    request: &TransportCaRequest<'_>,
) -> Result<AuthoritativeCa, Error> {
    reconcile_custom_cert_watch(
        ctx.watches.as_ref(),
        custom_transport_certs_watch_key(request.cluster),
        request.custom_ca,
    )?;

    if let Some(custom) = resolve_custom_ca(ctx, request).await? {
        let gc = collect_stale_self_signed(&ctx.bounded_store(), request.cluster).await;
        debug!(outcome = ?gc, "Using custom transport CA");
        return Ok(AuthoritativeCa::Custom(custom));
    }

    if let Some(shared) = request.shared_ca {
        debug!("Using shared transport CA");
        return Ok(AuthoritativeCa::Shared(shared.clone()));
    }

    let ca = reconcile_self_signed_ca(
        &ctx.bounded_store(),
        request.cluster,
        request.labels,
        request.owner_reference,
        &request.rotation,
    )
    .await?;
    Ok(AuthoritativeCa::SelfSigned(ca))
}
