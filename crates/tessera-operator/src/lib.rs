//! Tessera operator - reconciles the transport CA of TesseraCluster resources
//!
//! The binary wires these pieces together:
//!
//! - [`config`]: CLI flags and environment, validated into [`OperatorConfig`]
//! - [`controller`]: per-cluster reconcile, finalizer and status handling
//! - [`runner`]: the kube-rs `Controller` with its dynamic Secret watch

pub mod config;
pub mod controller;
pub mod runner;

pub use config::{Cli, ConfigError, OperatorConfig};
pub use controller::{error_policy, reconcile, Context, ContextBuilder};
pub use runner::build_controller;
