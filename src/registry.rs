use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::config::{ConfigFile, ProtocolConfig};
use crate::error::QueryError;
use crate::info::ProtocolEntryInfo;
use crate::protocol::{self, Protocol, TransportKind};

/// Metadata keys every protocol must carry.
const REQUIRED_INFO: [&str; 2] = ["Name", "DefaultRequestPort"];

/// A protocol bound to its configuration, ready to be queried.
#[derive(Debug, Clone)]
pub struct ProtocolEntry {
    id: String,
    transport: TransportKind,
    is_master: bool,
    info: ProtocolEntryInfo,
    request: Vec<u8>,
    protocol: Arc<dyn Protocol>,
}

impl ProtocolEntry {
    fn bind(config: &ProtocolConfig) -> Result<Self, QueryError> {
        let protocol = protocol::implementation(&config.id).ok_or_else(|| {
            QueryError::Config(format!("no implementation for protocol {}", config.id))
        })?;

        let transport = config.transport.unwrap_or(protocol.transport());
        if transport != protocol.transport() {
            return Err(QueryError::Config(format!(
                "{} speaks {}, configured for {}",
                config.id,
                protocol.transport(),
                transport
            )));
        }

        let is_master = config.is_master.unwrap_or(protocol.is_master());
        if is_master != protocol.is_master() {
            return Err(QueryError::Config(format!(
                "{} master flag must be {}",
                config.id,
                protocol.is_master()
            )));
        }

        let mut info = protocol.default_info();
        info.extend(config.information.clone());
        for key in REQUIRED_INFO {
            if !info.contains_key(key) {
                return Err(QueryError::Config(format!("{} is missing {}", config.id, key)));
            }
        }

        let request = protocol.build_request(&info)?;

        Ok(ProtocolEntry {
            id: config.id.clone(),
            transport,
            is_master,
            info,
            request,
            protocol,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn is_master(&self) -> bool {
        self.is_master
    }

    pub fn info(&self) -> &ProtocolEntryInfo {
        &self.info
    }

    /// Request bytes, built once when the registry was assembled.
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    pub fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_ref()
    }

    pub fn default_port(&self) -> &str {
        self.info
            .get("DefaultRequestPort")
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Every usable protocol, keyed by id. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, ProtocolEntry>,
}

impl Registry {
    /// Bind each configuration entry to its implementation.
    ///
    /// Fails on the first entry that names an unknown implementation,
    /// contradicts it, repeats an id, or carries a broken request template.
    pub fn build(configs: &[ProtocolConfig]) -> Result<Self, QueryError> {
        let mut entries = BTreeMap::new();
        for config in configs {
            let entry = ProtocolEntry::bind(config)?;
            debug!(
                "registered {} ({}, {} byte request)",
                entry.id(),
                entry.transport(),
                entry.request().len()
            );
            if entries.insert(entry.id.clone(), entry).is_some() {
                return Err(QueryError::Config(format!("protocol {} configured twice", config.id)));
            }
        }
        Ok(Registry { entries })
    }

    pub fn from_config(config: &ConfigFile) -> Result<Self, QueryError> {
        Self::build(&config.protocols)
    }

    /// Registry over the embedded configuration.
    pub fn builtin() -> Result<Self, QueryError> {
        Self::from_config(&ConfigFile::embedded()?)
    }

    pub fn lookup(&self, id: &str) -> Result<&ProtocolEntry, QueryError> {
        self.entries
            .get(id)
            .ok_or_else(|| QueryError::UnknownProtocol(id.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &ProtocolEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Vec<ProtocolConfig> {
        ConfigFile::from_toml(toml).unwrap().protocols
    }

    #[test]
    fn builtin_registry_prebuilds_requests() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.len(), 4);

        let openttds = registry.lookup("openttds").unwrap();
        assert_eq!(openttds.request(), &[0x03, 0x00, 0x00]);
        assert_eq!(openttds.transport(), TransportKind::Udp);
        assert_eq!(openttds.default_port(), "3979");
        assert!(!openttds.is_master());

        let openttdm = registry.lookup("openttdm").unwrap();
        assert_eq!(openttdm.request(), &[0x05, 0x00, 0x06, 0x02, 0x00]);
        assert!(openttdm.is_master());

        let linemaster = registry.lookup("linemaster").unwrap();
        assert_eq!(linemaster.transport(), TransportKind::Tcp);
        assert!(linemaster.request().is_empty());
        assert!(linemaster.is_master());
    }

    #[test]
    fn unknown_protocol_lookup() {
        let registry = Registry::builtin().unwrap();
        let err = registry.lookup("doom").unwrap_err();
        assert!(matches!(err, QueryError::UnknownProtocol(ref id) if id == "doom"));
    }

    #[test]
    fn omitted_settings_come_from_the_implementation() {
        let registry = Registry::build(&config("[[Protocols]]\nId = \"openttds\"\n")).unwrap();
        let entry = registry.lookup("openttds").unwrap();
        assert_eq!(entry.info()["Name"], "OpenTTD Server");
        assert_eq!(entry.request(), &[0x03, 0x00, 0x00]);
    }

    #[test]
    fn configured_information_overrides_defaults() {
        let registry = Registry::build(&config(
            "[[Protocols]]\nId = \"openttds\"\n[Protocols.Information]\nDefaultRequestPort = \"4000\"\nPreludeStarter = 'x'\n",
        ))
        .unwrap();
        let entry = registry.lookup("openttds").unwrap();
        assert_eq!(entry.default_port(), "4000");
        assert_eq!(entry.request(), b"x\x03\x00\x00");
    }

    #[test]
    fn unknown_implementation_is_config_error() {
        let err = Registry::build(&config("[[Protocols]]\nId = \"quake9\"\n")).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn transport_mismatch_is_config_error() {
        let err = Registry::build(&config("[[Protocols]]\nId = \"openttds\"\nTransport = \"tcp\"\n")).unwrap_err();
        assert!(matches!(err, QueryError::Config(ref m) if m.contains("udp")));
    }

    #[test]
    fn master_mismatch_is_config_error() {
        let err = Registry::build(&config("[[Protocols]]\nId = \"openttdm\"\nIsMaster = false\n")).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn duplicate_id_is_config_error() {
        let err = Registry::build(&config("[[Protocols]]\nId = \"source\"\n[[Protocols]]\nId = \"source\"\n")).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn broken_template_fails_at_build_time() {
        let err = Registry::build(&config(
            "[[Protocols]]\nId = \"openttds\"\n[Protocols.Information]\nRequestPreludeTemplate = '{{.Nowhere}}'\n",
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::Template(_)));
    }

    #[test]
    fn empty_configuration_gives_empty_registry() {
        let registry = Registry::build(&[]).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(registry.lookup("openttds"), Err(QueryError::UnknownProtocol(_))));
    }
}
