//! TesseraCluster Custom Resource Definition
//!
//! A TesseraCluster is one instance of the clustered data store. Only the
//! transport security surface is modelled here: which CA secures
//! node-to-node traffic, and what the operator last decided about it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{CaSource, SecretRef};

/// Specification for a TesseraCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "tessera.dev",
    version = "v1alpha1",
    kind = "TesseraCluster",
    plural = "tesseraclusters",
    shortname = "tc",
    status = "TesseraClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"CA","type":"string","jsonPath":".status.transportCa.source"}"#,
    printcolumn = r#"{"name":"CA Expiry","type":"string","jsonPath":".status.transportCa.notAfter"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TesseraClusterSpec {
    /// Transport (node-to-node) layer settings
    #[serde(default)]
    pub transport: TransportSpec,
}

/// Transport layer settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportSpec {
    /// TLS settings for transport traffic
    #[serde(default)]
    pub tls: TransportTlsSpec,
}

/// TLS settings for transport traffic
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportTlsSpec {
    /// Secret holding a user-supplied CA (`ca.crt`, optional `ca.key`)
    ///
    /// When set, this CA replaces the operator-managed one. Changes to the
    /// secret are picked up without touching the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<SecretRef>,
}

impl TesseraClusterSpec {
    /// The referenced custom transport CA secret, if one is configured
    pub fn custom_transport_ca(&self) -> Option<&SecretRef> {
        self.transport
            .tls
            .certificate
            .as_ref()
            .filter(|r| r.name().is_some())
    }
}

/// Transport CA as last reconciled
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportCaStatus {
    /// Where the authoritative CA came from
    pub source: CaSource,

    /// Expiry of the CA certificate (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    /// Secret holding the CA (the custom secret or the operator-managed one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Status for a TesseraCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TesseraClusterStatus {
    /// The generation of the spec that was last processed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// The authoritative transport CA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_ca: Option<TransportCaStatus>,

    /// Human-readable message about the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
