//! Custom Resource Definitions for Tessera
//!
//! This module contains the CRD definitions used by the Tessera operator.

mod cluster;
mod types;

pub use cluster::{
    TesseraCluster, TesseraClusterSpec, TesseraClusterStatus, TransportCaStatus, TransportSpec,
    TransportTlsSpec,
};
pub use types::{CaSource, SecretRef};
