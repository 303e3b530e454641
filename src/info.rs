use std::collections::BTreeMap;

use serde::Serialize;

/// Protocol metadata, e.g. `Name`, `DefaultRequestPort` and the request template pieces.
pub type ProtocolEntryInfo = BTreeMap<String, String>;

/// One player as reported by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    pub name: String,
    pub score: i64,
    /// Milliseconds, when the protocol reports it
    pub ping: i64,
}

/// Normalized information about a single server, whatever protocol produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerEntry {
    /// Server name
    pub name: String,
    /// Client slots
    pub max_clients: i64,
    /// Connected clients
    pub num_clients: i64,
    /// Is a password required to join?
    pub need_pass: bool,
    /// Current map
    pub terrain: String,
    /// Protocol-specific extras, keyed by lower-kebab-case names
    pub rules: BTreeMap<String, String>,
    /// Individual players; empty when the protocol does not enumerate them
    pub players: Vec<PlayerEntry>,
}

/// What a single query yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResult {
    /// A single server's information
    ServerInfo(ServerEntry),
    /// Addresses (`host:port`) listed by a master server
    Servers(Vec<String>),
}

impl QueryResult {
    pub fn server_info(&self) -> Option<&ServerEntry> {
        match self {
            QueryResult::ServerInfo(entry) => Some(entry),
            QueryResult::Servers(_) => None,
        }
    }

    pub fn servers(&self) -> Option<&[String]> {
        match self {
            QueryResult::ServerInfo(_) => None,
            QueryResult::Servers(list) => Some(list),
        }
    }
}
