//! Protocol implementations and the dispatcher that drives them.
//!
//! Each supported game speaks through one [Protocol] implementation. Adding
//! a protocol means writing the implementation and listing it in
//! [implementation]; the registry, transport and dispatcher stay untouched.

use std::fmt;
use std::sync::Arc;

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::info::{ProtocolEntryInfo, QueryResult};
use crate::packet::{build_request, Packet, REQUEST_TEMPLATE_KEY};
use crate::registry::ProtocolEntry;

pub mod linelist;
pub mod openttd;
pub mod source;

/// How a request reaches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One datagram out, one datagram back
    Udp,
    /// Connect, optionally write the request, read one line back
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// A game server query protocol: how to ask, and how to read the answer.
pub trait Protocol: fmt::Debug + Send + Sync {
    /// Identifier used to select the protocol, e.g. `openttds`.
    fn id(&self) -> &'static str;

    fn transport(&self) -> TransportKind;

    /// Does the reply list other servers rather than describe this one?
    fn is_master(&self) -> bool {
        false
    }

    /// Metadata the protocol works with when the configuration says nothing.
    fn default_info(&self) -> ProtocolEntryInfo;

    /// Build the request bytes. By default this expands the
    /// `RequestPreludeTemplate` entry of `info`.
    fn build_request(&self, info: &ProtocolEntryInfo) -> Result<Vec<u8>, QueryError> {
        let template = info.get(REQUEST_TEMPLATE_KEY).ok_or_else(|| {
            QueryError::Template(format!("{} is not set for {}", REQUEST_TEMPLATE_KEY, self.id()))
        })?;
        build_request(template, info)
    }

    /// Decode a raw reply. Binary codecs read through [crate::parse::Cursor]
    /// so that short input fails with [QueryError::MalformedPacket].
    fn decode(&self, data: &[u8], info: &ProtocolEntryInfo) -> Result<QueryResult, QueryError>;
}

/// Every compiled-in protocol.
pub fn all() -> Vec<Arc<dyn Protocol>> {
    vec![
        Arc::new(openttd::OpenTtdServer),
        Arc::new(openttd::OpenTtdMaster),
        Arc::new(source::SourceInfo),
        Arc::new(linelist::LineMaster),
    ]
}

/// Look up the compiled-in implementation for `id`.
pub fn implementation(id: &str) -> Option<Arc<dyn Protocol>> {
    all().into_iter().find(|p| p.id() == id)
}

/// Decode `packet` with the codec bound in `entry`.
///
/// Whatever the codec reports is returned as a typed error; a reply whose
/// shape disagrees with the entry's master flag is treated as malformed.
pub fn handle(packet: &Packet, entry: &ProtocolEntry) -> Result<QueryResult, QueryError> {
    if packet.protocol() != entry.id() {
        return Err(QueryError::UnknownProtocol(format!(
            "packet for {} handed to {}",
            packet.protocol(),
            entry.id()
        )));
    }

    let result = entry
        .protocol()
        .decode(packet.data(), entry.info())
        .map_err(|e| {
            warn!("{}: failed to decode {} byte reply: {}", entry.id(), packet.data().len(), e);
            e
        })?;

    match (&result, entry.is_master()) {
        (QueryResult::Servers(list), true) => {
            trace!("{}: decoded {} servers", entry.id(), list.len());
            Ok(result)
        }
        (QueryResult::ServerInfo(_), false) => Ok(result),
        _ => Err(QueryError::MalformedPacket(format!(
            "{} produced the wrong kind of result",
            entry.id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn ids_are_unique() {
        let protocols = all();
        for (i, p) in protocols.iter().enumerate() {
            assert!(protocols[i + 1..].iter().all(|q| q.id() != p.id()), "{} listed twice", p.id());
        }
    }

    #[test]
    fn finds_implementations_by_id() {
        assert!(implementation("openttds").is_some());
        assert!(implementation("openttdm").unwrap().is_master());
        assert_eq!(implementation("linemaster").unwrap().transport(), TransportKind::Tcp);
        assert!(implementation("quake9").is_none());
    }

    #[test]
    fn handle_turns_short_replies_into_malformed_packet() {
        let registry = Registry::builtin().unwrap();
        let entry = registry.lookup("openttds").unwrap();
        for data in [vec![], vec![0x03], vec![0x03, 0x00, 0x01, 0x04, 0x05]] {
            let err = handle(&Packet::new("openttds", data), entry).unwrap_err();
            assert!(matches!(err, QueryError::MalformedPacket(_)));
        }
    }

    #[test]
    fn handle_rejects_packets_for_another_protocol() {
        let registry = Registry::builtin().unwrap();
        let entry = registry.lookup("openttds").unwrap();
        let err = handle(&Packet::new("source", vec![0; 8]), entry).unwrap_err();
        assert!(matches!(err, QueryError::UnknownProtocol(_)));
    }

    #[test]
    fn transport_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            kind: TransportKind,
        }
        let holder: Holder = toml::from_str("kind = \"tcp\"").unwrap();
        assert_eq!(holder.kind, TransportKind::Tcp);
        assert_eq!(TransportKind::Udp.to_string(), "udp");
    }
}
