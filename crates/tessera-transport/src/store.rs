//! Secret store seam
//!
//! All persistence of CA material goes through [`SecretStore`]. The
//! production implementation talks to the Kubernetes API; tests substitute
//! mocks or in-memory stores.
//!
//! Every call made during a reconciliation pass is bounded by a deadline
//! through [`BoundedSecretStore`], which turns an exceeded deadline into the
//! transient [`Error::Timeout`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use tessera_common::error::is_not_found;
use tessera_common::{Error, FIELD_MANAGER};

/// Default deadline for a single store operation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait abstracting Secret persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret, `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create or replace a secret (namespace and name come from its metadata)
    async fn put(&self, secret: &Secret) -> Result<(), Error>;

    /// Delete a secret
    ///
    /// Returns `Ok(false)` when there was nothing to delete.
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, Error>;
}

/// Real Kubernetes secret store
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Create a new store wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        match self.api(namespace).get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, secret: &Secret) -> Result<(), Error> {
        let namespace = secret.namespace().ok_or_else(|| {
            Error::internal_with_context("secret-store", "secret to persist has no namespace")
        })?;
        let name = secret.name_any();

        self.api(&namespace)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(secret),
            )
            .await?;

        debug!(namespace = %namespace, secret = %name, "Applied secret");
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Run `fut` under `timeout`, reporting an exceeded deadline as [`Error::Timeout`]
pub async fn with_deadline<T, F>(
    timeout: Duration,
    operation: impl FnOnce() -> String,
    fut: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation(), timeout)),
    }
}

/// A [`SecretStore`] view whose every call is bounded by a deadline
#[derive(Clone, Copy)]
pub struct BoundedSecretStore<'a> {
    inner: &'a dyn SecretStore,
    timeout: Duration,
}

impl<'a> BoundedSecretStore<'a> {
    /// Bound every call to `inner` by `timeout`
    pub fn new(inner: &'a dyn SecretStore, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// See [`SecretStore::get`]
    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        with_deadline(
            self.timeout,
            || format!("get secret {}/{}", namespace, name),
            self.inner.get(namespace, name),
        )
        .await
    }

    /// See [`SecretStore::put`]
    pub async fn put(&self, secret: &Secret) -> Result<(), Error> {
        with_deadline(
            self.timeout,
            || {
                format!(
                    "put secret {}/{}",
                    secret.namespace().unwrap_or_default(),
                    secret.name_any()
                )
            },
            self.inner.put(secret),
        )
        .await
    }

    /// See [`SecretStore::delete`]
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        with_deadline(
            self.timeout,
            || format!("delete secret {}/{}", namespace, name),
            self.inner.delete(namespace, name),
        )
        .await
    }
}

/// Raw bytes of `key` in a secret's data, if present
pub fn secret_data<'s>(secret: &'s Secret, key: &str) -> Option<&'s [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| bytes.0.as_slice())
}
