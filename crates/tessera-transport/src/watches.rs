//! Dynamic watches on user-referenced secrets
//!
//! A cluster that references a custom CA secret must be reconciled again
//! whenever that secret changes. The controller watches all Secrets and asks
//! the [`WatchRegistry`] which clusters care about the one that changed.
//!
//! Registrations are keyed by [`WatchKey`] (owner cluster + purpose). The
//! registry is the only state shared between reconciliation passes of
//! different clusters; each key is updated atomically, and re-registering an
//! identical registration is a no-op.

use std::fmt;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::reflector::ObjectRef;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use tessera_common::crd::SecretRef;
use tessera_common::{ClusterIdentity, Error};

/// Key of a watch registration: owning cluster plus purpose
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    /// The cluster that is re-queued when a target changes
    pub owner: ClusterIdentity,
    /// What the watch is for (e.g. "logs-custom-transport-certs")
    pub purpose: String,
}

impl WatchKey {
    /// Create a key for `owner` and `purpose`
    pub fn new(owner: ClusterIdentity, purpose: impl Into<String>) -> Self {
        Self {
            owner,
            purpose: purpose.into(),
        }
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.purpose)
    }
}

/// A recorded (key, owner, targets) watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRegistration {
    /// Registration key
    pub key: WatchKey,
    /// Secrets whose changes re-queue the owner
    pub targets: Vec<ObjectRef<Secret>>,
}

impl WatchRegistration {
    /// The cluster re-queued by this registration
    pub fn owner(&self) -> &ClusterIdentity {
        &self.key.owner
    }
}

/// Trait for installing and removing dynamic watches
#[cfg_attr(test, automock)]
pub trait DynamicWatches: Send + Sync {
    /// Install or replace the registration under its key
    ///
    /// Registering a registration equal to the installed one changes nothing.
    fn register(&self, registration: WatchRegistration) -> Result<(), Error>;

    /// Remove the registration under `key`; absent keys are fine
    fn unregister(&self, key: &WatchKey) -> Result<(), Error>;
}

/// Process-wide table of watch registrations
#[derive(Default)]
pub struct WatchRegistry {
    registrations: DashMap<WatchKey, WatchRegistration>,
}

impl WatchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Clusters that must be re-queued when `secret` changes
    pub fn watchers_of(&self, secret: &ObjectRef<Secret>) -> Vec<ClusterIdentity> {
        let mut owners: Vec<ClusterIdentity> = self
            .registrations
            .iter()
            .filter(|entry| entry.value().targets.contains(secret))
            .map(|entry| entry.key().owner.clone())
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// The registration installed under `key`, if any
    pub fn get(&self, key: &WatchKey) -> Option<WatchRegistration> {
        self.registrations.get(key).map(|entry| entry.value().clone())
    }

    /// Remove every registration owned by `owner` (cluster deletion)
    ///
    /// Returns the number of registrations removed.
    pub fn unregister_owner(&self, owner: &ClusterIdentity) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|key, _| &key.owner != owner);
        let removed = before.saturating_sub(self.registrations.len());
        if removed > 0 {
            info!(cluster = %owner, removed, "Removed watch registrations of deleted cluster");
        }
        removed
    }

    /// Number of installed registrations
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no registration is installed
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl DynamicWatches for WatchRegistry {
    fn register(&self, registration: WatchRegistration) -> Result<(), Error> {
        if registration.targets.is_empty() {
            return Err(Error::watch(
                registration.key.to_string(),
                "registration has no targets",
            ));
        }

        match self.registrations.entry(registration.key.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get() == &registration {
                    return Ok(());
                }
                debug!(key = %registration.key, "Updating watch registration");
                existing.insert(registration);
            }
            Entry::Vacant(slot) => {
                debug!(key = %registration.key, "Installing watch registration");
                slot.insert(registration);
            }
        }
        Ok(())
    }

    fn unregister(&self, key: &WatchKey) -> Result<(), Error> {
        if self.registrations.remove(key).is_some() {
            debug!(key = %key, "Removed watch registration");
        }
        Ok(())
    }
}

/// Keep the custom CA secret watch of `owner` in line with `reference`
///
/// With a reference the watch targets the referenced secret in the owner's
/// namespace; without one any previous watch under `key` is removed. Safe to
/// call on every pass.
pub fn reconcile_custom_cert_watch(
    watches: &dyn DynamicWatches,
    key: WatchKey,
    reference: Option<&SecretRef>,
) -> Result<(), Error> {
    match reference.and_then(SecretRef::name) {
        Some(secret_name) => {
            let target = ObjectRef::<Secret>::new(secret_name).within(&key.owner.namespace);
            watches.register(WatchRegistration {
                key,
                targets: vec![target],
            })
        }
        None => watches.unregister(&key),
    }
}
