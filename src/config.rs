use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::QueryError;
use crate::info::ProtocolEntryInfo;
use crate::protocol::TransportKind;

/// Protocol configuration compiled into the library.
pub const EMBEDDED_CONFIG: &str = include_str!("../data/protocols.toml");

/// A protocol configuration file: a list of `[[Protocols]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "Protocols", default)]
    pub protocols: Vec<ProtocolConfig>,
}

/// Static settings for one protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtocolConfig {
    /// Must name a compiled-in protocol implementation
    pub id: String,
    /// Falls back to the implementation's transport when absent
    #[serde(default)]
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub is_master: Option<bool>,
    /// Overrides for the implementation's default metadata
    #[serde(default)]
    pub information: ProtocolEntryInfo,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, QueryError> {
        toml::from_str::<Self>(content)
            .map_err(|e| QueryError::Config(format!("failed to parse TOML: {}", e)))
    }

    /// The configuration shipped with the library.
    pub fn embedded() -> Result<Self, QueryError> {
        Self::from_toml(EMBEDDED_CONFIG)
    }
}
