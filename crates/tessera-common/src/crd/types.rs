//! Shared CRD building blocks

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret in the same namespace as the referencing resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Name of the Secret
    #[serde(default)]
    pub secret_name: String,
}

impl SecretRef {
    /// Create a reference to the named secret
    pub fn new(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
        }
    }

    /// The secret name, or `None` when the reference is blank
    ///
    /// A reference with an empty name behaves exactly like no reference.
    pub fn name(&self) -> Option<&str> {
        let name = self.secret_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Which source currently provides the authoritative transport CA
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum CaSource {
    /// A user-supplied CA from the referenced secret
    Custom,
    /// A CA shared by every cluster this operator manages
    Shared,
    /// A self-signed CA generated and rotated by the operator
    SelfSigned,
}

impl fmt::Display for CaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaSource::Custom => write!(f, "Custom"),
            CaSource::Shared => write!(f, "Shared"),
            CaSource::SelfSigned => write!(f, "SelfSigned"),
        }
    }
}
