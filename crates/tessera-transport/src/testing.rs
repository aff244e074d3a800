//! In-memory collaborators for scenario tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::runtime::events::EventType;
use kube::ResourceExt;

use tessera_common::events::EventPublisher;
use tessera_common::{ClusterIdentity, Error};
use tessera_pki::{CertificateAuthority, DEFAULT_CA_VALIDITY};

use crate::custom_ca::{CA_CERT_KEY, CA_PRIVATE_KEY_KEY};
use crate::store::SecretStore;

/// Secret store backed by a map, with call counters and failure switches
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), Secret>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
    get_stall: Mutex<Option<Duration>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, secret: Secret) {
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        self.secrets.lock().unwrap().insert(key, secret);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every `get` sleep for `stall` before answering
    pub fn stall_gets(&self, stall: Duration) {
        *self.get_stall.lock().unwrap() = Some(stall);
    }
}

fn unavailable() -> Error {
    Error::Kube {
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "service unavailable".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        }),
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let stall = *self.get_stall.lock().unwrap();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.secret(namespace, name))
    }

    async fn put(&self, secret: &Secret) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(secret.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some())
    }
}

/// An event captured by [`RecordingEventPublisher`]
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub type_: EventType,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Event sink that keeps every published event
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            type_,
            reason: reason.to_string(),
            action: action.to_string(),
            note,
        });
    }
}

pub fn test_ca(common_name: &str) -> CertificateAuthority {
    CertificateAuthority::generate(common_name, DEFAULT_CA_VALIDITY).expect("CA generation")
}

/// A custom CA secret in the `ca.crt` / `ca.key` layout
pub fn custom_ca_secret(
    namespace: &str,
    name: &str,
    ca: &CertificateAuthority,
    with_key: bool,
) -> Secret {
    let mut data = BTreeMap::from([(
        CA_CERT_KEY.to_string(),
        ByteString(ca.cert_pem().as_bytes().to_vec()),
    )]);
    if with_key {
        let key = ca.key_pem().expect("generated CA has a key");
        data.insert(
            CA_PRIVATE_KEY_KEY.to_string(),
            ByteString(key.as_bytes().to_vec()),
        );
    }
    let mut secret = Secret {
        data: Some(data),
        ..Default::default()
    };
    secret.metadata.name = Some(name.to_string());
    secret.metadata.namespace = Some(namespace.to_string());
    secret
}

pub fn event_ref(cluster: &ClusterIdentity) -> ObjectReference {
    ObjectReference {
        api_version: Some("tessera.dev/v1alpha1".to_string()),
        kind: Some("TesseraCluster".to_string()),
        namespace: Some(cluster.namespace.clone()),
        name: Some(cluster.name.clone()),
        ..Default::default()
    }
}

pub fn owner_reference(cluster: &ClusterIdentity, uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: "tessera.dev/v1alpha1".to_string(),
        kind: "TesseraCluster".to_string(),
        name: cluster.name.clone(),
        uid: uid.to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
