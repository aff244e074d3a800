//! Kubernetes Event recording for Tessera controllers.
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so that controllers can emit standard Kubernetes Events visible via
//! `kubectl describe` and `kubectl get events`.
//!
//! Events are **fire-and-forget**: the Kubernetes implementation hands the
//! event to a background task and returns immediately. Failures are logged
//! as warnings and never propagate errors.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
///
/// Implementations are expected to be fire-and-forget: `publish()` never
/// returns an error and never waits on the API server.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "ValidationFailed")
    /// * `action` - What action was taken (e.g. "Reconcile")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher for the given controller name.
    ///
    /// The controller name appears as the "reportingComponent" on Events
    /// (e.g. "tessera-operator").
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        let recorder = self.recorder.clone();
        let resource_ref = resource_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.publish(&event, &resource_ref).await {
                warn!(
                    reason = %event.reason,
                    action = %event.action,
                    error = %e,
                    "Failed to publish Kubernetes event"
                );
            }
        });
    }
}

/// No-op implementation for tests.
///
/// All calls are silently ignored, no Kubernetes API interaction.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// A referenced resource could not be found or read
    pub const UNEXPECTED: &str = "Unexpected";
    /// User-supplied configuration failed validation
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
}

/// Well-known event action strings.
///
/// These appear in `kubectl get events` under the ACTION column.
pub mod actions {
    /// Resolving a user-supplied transport CA
    pub const RESOLVE_CUSTOM_CA: &str = "ResolveCustomCA";
}
