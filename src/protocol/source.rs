//! [Source A2S_INFO Query Protocol](https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO)

use std::collections::BTreeMap;

use crate::error::QueryError;
use crate::info::{ProtocolEntryInfo, QueryResult, ServerEntry};
use crate::parse::Cursor;
use crate::protocol::{Protocol, TransportKind};

/// `-1`: the whole reply fits in one datagram.
const SINGLE_HEADER: i32 = -1;
/// `-2`: the reply is split across datagrams.
const SPLIT_HEADER: i32 = -2;

/// S2C_CHALLENGE ('A')
const CHALLENGE_TYPE: u8 = 0x41;
/// A2S_INFO response ('I')
const RESPONSE_TYPE: u8 = 0x49;

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceInfo;

impl Protocol for SourceInfo {
    fn id(&self) -> &'static str {
        "source"
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn default_info(&self) -> ProtocolEntryInfo {
        [
            ("Name", "Source Engine Server"),
            ("PreludeStarter", r"\xFF\xFF\xFF\xFF"),
            ("PreludeFinisher", r"\x00"),
            ("RequestPreludeTemplate", "{{.PreludeStarter}}TSource Engine Query{{.PreludeFinisher}}"),
            ("DefaultRequestPort", "27015"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn decode(&self, data: &[u8], _info: &ProtocolEntryInfo) -> Result<QueryResult, QueryError> {
        decode_info(data).map(QueryResult::ServerInfo)
    }
}

/// Parse an A2S_INFO reply into a [ServerEntry].
///
/// Split replies and challenges are rejected: both would need a second
/// round trip to complete.
pub fn decode_info(data: &[u8]) -> Result<ServerEntry, QueryError> {
    let mut cursor = Cursor::new(data);

    match cursor.get_i32_le()? {
        SINGLE_HEADER => {}
        SPLIT_HEADER => {
            return Err(QueryError::MalformedPacket(
                "split responses are not supported".to_string(),
            ))
        }
        n => return Err(QueryError::MalformedPacket(format!("unknown packet header {}", n))),
    }

    match cursor.get_u8()? {
        RESPONSE_TYPE => {}
        CHALLENGE_TYPE => {
            return Err(QueryError::MalformedPacket(
                "server answered with a challenge".to_string(),
            ))
        }
        n => return Err(QueryError::MalformedPacket(format!("unknown packet type {:#04x}", n))),
    }

    let protocol = cursor.get_u8()?;
    let hostname = cursor.get_string()?;
    let map = cursor.get_string()?;
    let folder = cursor.get_string()?;
    let game = cursor.get_string()?;
    let game_id = cursor.get_u16_le()?;
    let players = cursor.get_u8()?;
    let maxplayers = cursor.get_u8()?;
    let bots = cursor.get_u8()?;
    // d: dedicated, l: listen, p: SourceTV relay
    let server_type = char::from(cursor.get_u8()?);
    // l: linux, w: windows, m/o: mac
    let server_env = char::from(cursor.get_u8()?);
    let password_protected = cursor.get_u8()? == 1;
    let vac_enabled = cursor.get_u8()? == 1;
    let version = cursor.get_string()?;

    let mut rules = BTreeMap::new();
    rules.insert("protocol-version".to_string(), protocol.to_string());
    rules.insert("server-name".to_string(), hostname.clone());
    rules.insert("map-name".to_string(), map.clone());
    rules.insert("folder".to_string(), folder);
    rules.insert("game".to_string(), game);
    rules.insert("game-id".to_string(), game_id.to_string());
    rules.insert("bots".to_string(), bots.to_string());
    rules.insert("server-type".to_string(), server_type.to_string());
    rules.insert("server-env".to_string(), server_env.to_string());
    rules.insert("need-pass".to_string(), password_protected.to_string());
    rules.insert("vac".to_string(), vac_enabled.to_string());
    rules.insert("server-version".to_string(), version);

    Ok(ServerEntry {
        name: hostname,
        max_clients: maxplayers.into(),
        num_clients: players.into(),
        need_pass: password_protected,
        terrain: map,
        rules,
        players: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::build_request;

    fn reply() -> Vec<u8> {
        let mut p = vec![0xff, 0xff, 0xff, 0xff, RESPONSE_TYPE, 17];
        p.extend_from_slice(b"Uncletopia | New York City 4\0");
        p.extend_from_slice(b"pl_upward\0");
        p.extend_from_slice(b"tf\0");
        p.extend_from_slice(b"Team Fortress\0");
        p.extend_from_slice(&440u16.to_le_bytes());
        p.extend_from_slice(&[23, 24, 0, b'd', b'l', 0, 1]);
        p.extend_from_slice(b"8622567\0");
        p
    }

    #[test]
    fn request_matches_a2s_info() {
        let info = SourceInfo.default_info();
        let bytes = SourceInfo.build_request(&info).unwrap();
        assert_eq!(bytes, build_request(r"\xFF\xFF\xFF\xFFTSource Engine Query\x00", &info).unwrap());
        assert_eq!(bytes.len(), 25);
    }

    #[test]
    fn decodes_info_reply() {
        let entry = decode_info(&reply()).unwrap();
        assert_eq!(entry.name, "Uncletopia | New York City 4");
        assert_eq!(entry.terrain, "pl_upward");
        assert_eq!(entry.num_clients, 23);
        assert_eq!(entry.max_clients, 24);
        assert!(!entry.need_pass);
        assert_eq!(entry.rules["game-id"], "440");
        assert_eq!(entry.rules["server-type"], "d");
        assert_eq!(entry.rules["server-env"], "l");
        assert_eq!(entry.rules["vac"], "true");
        assert_eq!(entry.rules["server-version"], "8622567");
    }

    #[test]
    fn challenge_is_malformed() {
        let p = [0xff, 0xff, 0xff, 0xff, CHALLENGE_TYPE, 1, 2, 3, 4];
        let err = decode_info(&p).unwrap_err();
        assert!(matches!(err, QueryError::MalformedPacket(ref m) if m.contains("challenge")));
    }

    #[test]
    fn split_header_is_malformed() {
        let p = [0xfe, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        assert!(matches!(decode_info(&p), Err(QueryError::MalformedPacket(_))));
    }

    #[test]
    fn truncated_reply_is_malformed() {
        let full = reply();
        for len in 0..full.len() {
            assert!(matches!(
                decode_info(&full[..len]),
                Err(QueryError::MalformedPacket(_))
            ));
        }
    }
}
