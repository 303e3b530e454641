//! OpenTTD UDP queries: server info (`openttds`) and the master server list (`openttdm`).

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use log::trace;

use crate::error::QueryError;
use crate::info::{ProtocolEntryInfo, QueryResult, ServerEntry};
use crate::parse::{hex, Cursor};
use crate::protocol::{Protocol, TransportKind};

/// Size + packet type preceding every OpenTTD UDP payload.
const HEADER_LEN: usize = 3;
const NEWGRF_ID_LEN: usize = 4;
const NEWGRF_MD5_LEN: usize = 16;

fn info(pairs: &[(&str, &str)]) -> ProtocolEntryInfo {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `PACKET_UDP_CLIENT_FIND_SERVER` against a game server.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTtdServer;

impl Protocol for OpenTtdServer {
    fn id(&self) -> &'static str {
        "openttds"
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn default_info(&self) -> ProtocolEntryInfo {
        info(&[
            ("Name", "OpenTTD Server"),
            ("PreludeStarter", ""),
            ("PreludeFinisher", r"\x00\x00"),
            ("RequestPreludeTemplate", r"{{.PreludeStarter}}\x03{{.PreludeFinisher}}"),
            ("DefaultRequestPort", "3979"),
        ])
    }

    fn decode(&self, data: &[u8], _info: &ProtocolEntryInfo) -> Result<QueryResult, QueryError> {
        decode_server_info(data).map(QueryResult::ServerInfo)
    }
}

/// Parse a `PACKET_UDP_SERVER_RESPONSE` into a [ServerEntry].
///
/// The layout grows with the embedded protocol version:
/// - v4 adds the active NewGRF list
/// - v3 adds game dates and drops the reserved words after the client counts
/// - v2 adds company and spectator limits
pub fn decode_server_info(data: &[u8]) -> Result<ServerEntry, QueryError> {
    let mut cursor = Cursor::new(data);
    cursor.skip(HEADER_LEN)?;

    let protocol_version = cursor.get_u8()?;
    trace!("openttd server info, protocol version {}", protocol_version);

    let mut active_newgrfs_num = 0;
    let mut active_newgrfs = Vec::new();
    if protocol_version >= 4 {
        active_newgrfs_num = cursor.get_u8()?;
        for _ in 0..active_newgrfs_num {
            let id = hex(cursor.take(NEWGRF_ID_LEN)?);
            let md5 = hex(cursor.take(NEWGRF_MD5_LEN)?);
            active_newgrfs.push(format!("ID:{}/MD5:{}", id, md5));
        }
    }

    let mut time_current = 0;
    let mut time_start = 0;
    if protocol_version >= 3 {
        time_current = cursor.get_u32_be()?;
        time_start = cursor.get_u32_be()?;
    }

    let mut max_companies = None;
    let mut current_companies = None;
    let mut max_spectators = None;
    if protocol_version >= 2 {
        max_companies = Some(cursor.get_u8()?);
        current_companies = Some(cursor.get_u8()?);
        max_spectators = Some(cursor.get_u8()?);
    }

    let server_name = cursor.get_string()?;
    let server_version = cursor.get_string()?;

    let language_id = cursor.get_u8()?;
    let need_pass = cursor.get_u8()? != 0;
    let max_clients = cursor.get_u8()?;
    let current_clients = cursor.get_u8()?;
    let current_spectators = cursor.get_u8()?;

    if protocol_version < 3 {
        cursor.skip(2)?;
        cursor.skip(2)?;
    }

    let map_name = cursor.get_string()?;
    let map_width = cursor.get_u16_be()?;
    let map_height = cursor.get_u16_be()?;
    let map_set = cursor.get_u8()?;
    let dedicated = cursor.get_u8()?;

    let mut rules = BTreeMap::new();
    let mut rule = |key: &str, value: String| {
        rules.insert(key.to_string(), value);
    };
    rule("protocol-version", protocol_version.to_string());
    rule("active-newgrfs-num", active_newgrfs_num.to_string());
    rule("active-newgrfs", active_newgrfs.join("; "));
    rule("time-current", time_current.to_string());
    rule("time-start", time_start.to_string());
    if let Some(n) = max_companies {
        rule("max-companies", n.to_string());
    }
    if let Some(n) = current_companies {
        rule("current-companies", n.to_string());
    }
    if let Some(n) = max_spectators {
        rule("max-spectators", n.to_string());
    }
    rule("server-name", server_name.clone());
    rule("server-version", server_version);
    rule("language-id", language_id.to_string());
    rule("need-pass", need_pass.to_string());
    rule("max-clients", max_clients.to_string());
    rule("current-clients", current_clients.to_string());
    rule("current-spectators", current_spectators.to_string());
    rule("map-name", map_name.clone());
    rule("map-width", map_width.to_string());
    rule("map-height", map_height.to_string());
    rule("map-set", map_set.to_string());
    rule("dedicated", dedicated.to_string());

    Ok(ServerEntry {
        name: server_name,
        max_clients: max_clients.into(),
        num_clients: current_clients.into(),
        need_pass,
        terrain: map_name,
        rules,
        players: Vec::new(),
    })
}

/// `PACKET_UDP_CLIENT_GET_LIST` against the master server.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTtdMaster;

impl Protocol for OpenTtdMaster {
    fn id(&self) -> &'static str {
        "openttdm"
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn is_master(&self) -> bool {
        true
    }

    fn default_info(&self) -> ProtocolEntryInfo {
        info(&[
            ("Name", "OpenTTD Master"),
            ("PreludeStarter", ""),
            // master list version 2, IPv4 addresses
            ("PreludeFinisher", r"\x02\x00"),
            ("RequestPreludeTemplate", r"{{.PreludeStarter}}\x05\x00\x06{{.PreludeFinisher}}"),
            ("DefaultRequestPort", "3978"),
        ])
    }

    fn decode(&self, data: &[u8], _info: &ProtocolEntryInfo) -> Result<QueryResult, QueryError> {
        decode_server_list(data).map(QueryResult::Servers)
    }
}

/// Parse a `PACKET_UDP_MASTER_RESPONSE_LIST` into `host:port` strings.
pub fn decode_server_list(data: &[u8]) -> Result<Vec<String>, QueryError> {
    let mut cursor = Cursor::new(data);
    cursor.skip(HEADER_LEN)?;

    let list_type = cursor.get_u8()?;
    let count = cursor.get_u16_le()?;

    let mut servers = Vec::with_capacity(count.into());
    for _ in 0..count {
        let ip = match list_type {
            1 => {
                let b = cursor.take(4)?;
                IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            2 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(cursor.take(16)?);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            n => {
                return Err(QueryError::MalformedPacket(format!(
                    "unknown server list type {}",
                    n
                )))
            }
        };
        let port = cursor.get_u16_le()?;
        servers.push(SocketAddr::new(ip, port).to_string());
    }

    Ok(servers)
}
