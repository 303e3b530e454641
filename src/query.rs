use std::io;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use url::Url;

use crate::error::QueryError;
use crate::info::QueryResult;
use crate::packet::Packet;
use crate::protocol::{handle, TransportKind};
use crate::registry::Registry;

/// Deadline applied to each network step when the caller gives none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest UDP payload; master lists can fill a whole datagram.
const MAX_DATAGRAM: usize = 65_535;

/// Normalize a user-supplied host into `host:port`.
///
/// The host is read as a URL, so an optional `scheme://` prefix, userinfo
/// and any path are dropped. `default_port` is appended when the host carries
/// no port of its own. IPv6 hosts keep their brackets.
///
/// ```
/// use rgamequery::query::resolve_host;
///
/// assert_eq!(resolve_host("udp://10.0.0.1", "3979").unwrap(), "10.0.0.1:3979");
/// assert_eq!(resolve_host("[::1]:4000", "3979").unwrap(), "[::1]:4000");
/// ```
pub fn resolve_host(host: &str, default_port: &str) -> Result<String, QueryError> {
    let invalid = |reason: String| {
        QueryError::UnreachableHost(io::Error::new(io::ErrorKind::InvalidInput, reason))
    };

    let url = if host.contains("://") {
        Url::parse(host)
    } else {
        Url::parse(&format!("placeholder://{}", host))
    }
    .map_err(|e| invalid(format!("invalid host {:?}: {}", host, e)))?;

    let name = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid(format!("no host in {:?}", host)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", name, port),
        None if default_port.is_empty() => name.to_string(),
        None => format!("{}:{}", name, default_port),
    })
}

/// Perform one request/response round trip against `addr`.
///
/// UDP sends `request` as a single datagram and reads a single datagram
/// back. TCP writes `request` (when non-empty) and reads one line. Each
/// network step is bounded by `timeout_dur`.
pub async fn exchange(
    kind: TransportKind,
    addr: &str,
    request: &[u8],
    timeout_dur: Duration,
) -> Result<Vec<u8>, QueryError> {
    let response = match kind {
        TransportKind::Udp => exchange_udp(addr, request, timeout_dur).await?,
        TransportKind::Tcp => exchange_tcp(addr, request, timeout_dur).await?,
    };

    // padding or a bare line ending means the server had nothing to say
    let filler: &[u8] = match kind {
        TransportKind::Udp => &[0],
        TransportKind::Tcp => &[0, b'\r', b'\n'],
    };
    if response.iter().all(|b| filler.contains(b)) {
        return Err(QueryError::EmptyResponse);
    }

    debug!("{} {}: received {} bytes", kind, addr, response.len());
    Ok(response)
}

async fn exchange_udp(addr: &str, request: &[u8], timeout_dur: Duration) -> Result<Vec<u8>, QueryError> {
    let sock: UdpSocket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(QueryError::FailedPortBind)?;

    timeout(timeout_dur, sock.connect(addr))
        .await?
        .map_err(QueryError::UnreachableHost)?;

    timeout(timeout_dur, sock.send(request))
        .await?
        .map_err(QueryError::SendError)?;
    debug!("udp {}: sent {} bytes", addr, request.len());

    let mut resp_buf = vec![0u8; MAX_DATAGRAM];
    let len = timeout(timeout_dur, sock.recv(&mut resp_buf))
        .await?
        .map_err(QueryError::ReceiveError)?;
    resp_buf.truncate(len);

    Ok(resp_buf)
}

async fn exchange_tcp(addr: &str, request: &[u8], timeout_dur: Duration) -> Result<Vec<u8>, QueryError> {
    let mut stream = timeout(timeout_dur, TcpStream::connect(addr))
        .await?
        .map_err(QueryError::UnreachableHost)?;

    if !request.is_empty() {
        timeout(timeout_dur, stream.write_all(request))
            .await?
            .map_err(QueryError::SendError)?;
        debug!("tcp {}: sent {} bytes", addr, request.len());
    }

    let mut line = Vec::new();
    let mut reader = BufReader::new(stream);
    timeout(timeout_dur, reader.read_until(b'\n', &mut line))
        .await?
        .map_err(QueryError::ReceiveError)?;

    Ok(line)
}

/// Query `host` with the protocol registered as `protocol_id`.
///
/// If `timeout_dur` is `None`, [DEFAULT_TIMEOUT] is used.
///
/// Example usage:
/// ```no_run
/// # async fn run() -> Result<(), rgamequery::error::QueryError> {
/// use rgamequery::query::query;
/// use rgamequery::registry::Registry;
///
/// let registry = Registry::builtin()?;
/// let result = query(&registry, "openttds", "203.0.113.7", None).await?;
/// println!("{:?}", result.server_info().map(|s| &s.name));
/// # Ok(())
/// # }
/// ```
pub async fn query(
    registry: &Registry,
    protocol_id: &str,
    host: &str,
    timeout_dur: Option<Duration>,
) -> Result<QueryResult, QueryError> {
    let timeout_dur: Duration = timeout_dur.unwrap_or(DEFAULT_TIMEOUT);
    let entry = registry.lookup(protocol_id)?;

    let addr = resolve_host(host, entry.default_port())?;
    debug!("querying {} as {}", addr, entry.id());

    let response = exchange(entry.transport(), &addr, entry.request(), timeout_dur).await?;
    handle(&Packet::new(entry.id(), response), entry)
}
