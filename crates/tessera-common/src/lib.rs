//! Common types for Tessera: CRDs, errors, events, and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod identity;
pub mod telemetry;

pub use error::Error;
pub use identity::ClusterIdentity;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "tessera-operator";

/// Label carrying the name of the cluster a resource belongs to
pub const CLUSTER_NAME_LABEL: &str = "tessera.dev/cluster-name";

/// Label carrying the purpose of an operator-managed CA secret
pub const CA_TYPE_LABEL: &str = "tessera.dev/ca-type";

/// Label selector value for transport CA secrets
pub const TRANSPORT_CA_TYPE: &str = "transport";
