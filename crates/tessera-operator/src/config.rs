//! Operator command line and environment configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use tessera_pki::{CertificateAuthority, PkiError, RotationParams, DEFAULT_RENEW_THRESHOLD};

/// Tessera operator - manages transport security of Tessera clusters
#[derive(Parser, Debug, Clone)]
#[command(name = "tessera-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the TesseraCluster CRD as YAML and exit
    #[arg(long)]
    pub crd: bool,

    /// Validity of generated self-signed transport CAs
    #[arg(
        long,
        env = "TESSERA_CA_CERT_VALIDITY",
        value_parser = humantime::parse_duration,
        default_value = "1y"
    )]
    pub ca_cert_validity: Duration,

    /// Fraction of the CA validity after which it is renewed
    #[arg(long, env = "TESSERA_CA_RENEW_THRESHOLD", default_value_t = DEFAULT_RENEW_THRESHOLD)]
    pub ca_renew_threshold: f64,

    /// Directory holding tls.crt and tls.key of a CA shared by all clusters
    #[arg(long, env = "TESSERA_CA_DIR")]
    pub ca_dir: Option<PathBuf>,

    /// Deadline for each Secret API call
    #[arg(
        long,
        env = "TESSERA_OPERATION_TIMEOUT",
        value_parser = humantime::parse_duration,
        default_value = "10s"
    )]
    pub operation_timeout: Duration,
}

/// Errors in operator configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Validity or renewal threshold out of range
    #[error("invalid CA rotation settings: {0}")]
    Rotation(#[source] PkiError),

    /// The shared CA directory could not be loaded
    #[error("failed to load shared CA from {path}: {source}")]
    SharedCa {
        /// Directory that was read
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: PkiError,
    },

    /// A zero deadline would fail every call
    #[error("operation timeout must be greater than zero")]
    ZeroTimeout,
}

/// Validated operator configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Validity and renewal of self-signed CAs
    pub rotation: RotationParams,
    /// CA shared by every managed cluster, if configured
    pub shared_ca: Option<Arc<CertificateAuthority>>,
    /// Deadline for each Secret API call
    pub operation_timeout: Duration,
}

impl OperatorConfig {
    /// Validate the command line and load the shared CA
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let rotation =
            RotationParams::with_renew_threshold(cli.ca_cert_validity, cli.ca_renew_threshold)
                .map_err(ConfigError::Rotation)?;

        if cli.operation_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let shared_ca = match &cli.ca_dir {
            Some(dir) => {
                let ca = CertificateAuthority::from_dir(dir).map_err(|source| {
                    ConfigError::SharedCa {
                        path: dir.clone(),
                        source,
                    }
                })?;
                info!(
                    path = %dir.display(),
                    common_name = %ca.info().common_name,
                    "Loaded shared transport CA"
                );
                Some(Arc::new(ca))
            }
            None => None,
        };

        Ok(Self {
            rotation,
            shared_ca,
            operation_timeout: cli.operation_timeout,
        })
    }
}
