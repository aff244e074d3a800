//! Transport CA lifecycle for Tessera clusters
//!
//! On every reconciliation pass [`reconcile_or_retrieve_ca`] decides which CA
//! secures node-to-node traffic of a cluster:
//!
//! - a **custom** CA from a secret referenced by the cluster spec
//! - a **shared** CA handed to the operator for all of its clusters
//! - an operator-managed **self-signed** CA, rotated per [`RotationParams`]
//!
//! Collaborators sit behind traits so the driver can plug in the real
//! Kubernetes API and tests can plug in mocks:
//!
//! - [`SecretStore`] persists CA material
//! - [`DynamicWatches`] re-triggers a cluster when its custom CA secret changes
//! - [`EventPublisher`](tessera_common::events::EventPublisher) surfaces user
//!   configuration problems as Kubernetes Events
//!
//! [`RotationParams`]: tessera_pki::RotationParams

#![deny(missing_docs)]

pub mod custom_ca;
pub mod gc;
pub mod naming;
pub mod self_signed;
pub mod selection;
pub mod store;
pub mod watches;

#[cfg(test)]
#[allow(missing_docs)]
mod testing;

pub use gc::GcOutcome;
pub use selection::{
    reconcile_or_retrieve_ca, AuthoritativeCa, TransportCaContext, TransportCaRequest,
};
pub use store::{KubeSecretStore, SecretStore, DEFAULT_OPERATION_TIMEOUT};
pub use watches::{DynamicWatches, WatchKey, WatchRegistration, WatchRegistry};
