//! Plain-text master list over TCP (`linemaster`).
//!
//! The master writes one line as soon as the connection is accepted; nothing
//! is sent to it. Entries are `host:port`, separated by whitespace, commas
//! or semicolons.

use crate::error::QueryError;
use crate::info::{ProtocolEntryInfo, QueryResult};
use crate::protocol::{Protocol, TransportKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct LineMaster;

impl Protocol for LineMaster {
    fn id(&self) -> &'static str {
        "linemaster"
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn is_master(&self) -> bool {
        true
    }

    fn default_info(&self) -> ProtocolEntryInfo {
        [
            ("Name", "Line-delimited Master"),
            ("PreludeStarter", ""),
            ("PreludeFinisher", ""),
            ("RequestPreludeTemplate", "{{.PreludeStarter}}{{.PreludeFinisher}}"),
            ("DefaultRequestPort", "28900"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn decode(&self, data: &[u8], _info: &ProtocolEntryInfo) -> Result<QueryResult, QueryError> {
        decode_line(data).map(QueryResult::Servers)
    }
}

/// Split one master line into `host:port` entries.
///
/// Every entry must carry a host and a numeric port; one bad entry rejects
/// the whole line.
pub fn decode_line(data: &[u8]) -> Result<Vec<String>, QueryError> {
    let line = String::from_utf8_lossy(data);

    line.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(entry.to_string())
            }
            _ => Err(QueryError::MalformedPacket(format!(
                "bad server entry {:?}",
                entry
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_separator() {
        let servers = decode_line(b"10.0.0.1:3979 10.0.0.2:3980,[::1]:27015;host.example:1\r\n").unwrap();
        assert_eq!(
            servers,
            vec!["10.0.0.1:3979", "10.0.0.2:3980", "[::1]:27015", "host.example:1"]
        );
    }

    #[test]
    fn blank_line_is_an_empty_list() {
        assert!(decode_line(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn entry_without_port_is_malformed() {
        for line in [&b"10.0.0.1:3979 10.0.0.2\n"[..], b":3979\n", b"10.0.0.1:port\n", b"10.0.0.1:70000\n"] {
            assert!(
                matches!(decode_line(line), Err(QueryError::MalformedPacket(_))),
                "{:?}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn sends_nothing() {
        let info = LineMaster.default_info();
        assert!(LineMaster.build_request(&info).unwrap().is_empty());
    }
}
