//! Stable identity of a managed cluster

use std::fmt;

use kube::ResourceExt;

/// A (namespace, name) pair identifying a cluster instance
///
/// Deterministic secret names and watch keys are derived from it, so it
/// must stay stable for the whole life of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterIdentity {
    /// Namespace the cluster lives in
    pub namespace: String,
    /// Name of the cluster
    pub name: String,
}

impl ClusterIdentity {
    /// Create an identity from its parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a namespaced Kubernetes object
    ///
    /// Returns `None` for cluster-scoped objects, which have no namespace.
    pub fn of<K: ResourceExt>(obj: &K) -> Option<Self> {
        let namespace = obj.namespace()?;
        Some(Self::new(namespace, obj.name_any()))
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
