//! Blocking gopher transport.
//!
//! One [`Transport::fetch`] call is one protocol exchange: resolve,
//! connect, send the selector, read until the peer closes. Gopher has no
//! length framing -- EOF is end-of-message. There is no retry here;
//! retry policy (mirror failover) belongs to the navigation engine.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use burrow_types::{BurrowError, ClientOptions, Item, Result};

use crate::tls::TlsConnector;

/// Blocking transport for gopher requests.
pub struct Transport {
    prefer_ipv6: bool,
    connect_timeout: Duration,
    read_timeout: Duration,
    tls: TlsConnector,
}

impl Transport {
    /// Build a transport from client options.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            prefer_ipv6: options.ipv6,
            connect_timeout: Duration::from_secs(options.connect_timeout),
            read_timeout: Duration::from_secs(options.read_timeout),
            tls: TlsConnector::new(),
        }
    }

    /// Apply updated options (timeouts, address preference).
    pub fn reconfigure(&mut self, options: &ClientOptions) {
        self.prefer_ipv6 = options.ipv6;
        self.connect_timeout = Duration::from_secs(options.connect_timeout);
        self.read_timeout = Duration::from_secs(options.read_timeout);
    }

    /// Fetch `item`, optionally with a search query, returning the raw
    /// response bytes. Blocking, single attempt.
    pub fn fetch(&self, item: &Item, query: Option<&str>) -> Result<Vec<u8>> {
        let Some(host) = &item.host else {
            return Err(BurrowError::Url(format!(
                "cannot fetch local item {} over the network",
                item.path,
            )));
        };
        let peer = format!("{host}:{}", item.port);

        let stream = self.connect(host, item.port, &peer)?;

        let mut request = item.path.clone();
        if let Some(q) = query {
            request.push('\t');
            request.push_str(q);
        }
        request.push_str("\r\n");

        log::debug!("sending selector {:?} to {peer} (tls={})", item.path, item.tls);

        if item.tls {
            let mut stream = self.tls.connect(stream, host)?;
            stream
                .write_all(request.as_bytes())
                .map_err(|e| classify_io(e, &peer, true))?;
            read_to_eof(&mut stream, &peer, true)
        } else {
            let mut stream = stream;
            stream
                .write_all(request.as_bytes())
                .map_err(|e| classify_io(e, &peer, false))?;
            read_to_eof(&mut stream, &peer, false)
        }
    }

    /// Resolve and connect, trying each candidate address in order.
    fn connect(&self, host: &str, port: u16, peer: &str) -> Result<TcpStream> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| BurrowError::Dns(format!("{peer}: {e}")))?;
        let candidates = order_candidates(addrs.collect(), self.prefer_ipv6);
        if candidates.is_empty() {
            return Err(BurrowError::Dns(format!("no usable addresses for {peer}")));
        }

        // Last-error-wins when every candidate fails: earlier errors are
        // dropped, matching the reference client.
        let mut last_err = None;
        for addr in candidates {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_write_timeout(Some(self.read_timeout))?;
                    return Ok(stream);
                },
                Err(e) => {
                    log::debug!("connect to {addr} failed: {e}");
                    last_err = Some(classify_io(e, &addr.to_string(), false));
                },
            }
        }
        // candidates was non-empty, so at least one error was recorded.
        Err(last_err.unwrap_or_else(|| BurrowError::Dns(format!("no addresses for {peer}"))))
    }
}

/// Order resolved addresses per the IPv6 preference: IPv6 first when
/// enabled, IPv4-only otherwise.
fn order_candidates(addrs: Vec<SocketAddr>, prefer_ipv6: bool) -> Vec<SocketAddr> {
    if prefer_ipv6 {
        let (v6, v4): (Vec<_>, Vec<_>) = addrs.into_iter().partition(SocketAddr::is_ipv6);
        v6.into_iter().chain(v4).collect()
    } else {
        addrs.into_iter().filter(SocketAddr::is_ipv4).collect()
    }
}

/// Read the entire response until the peer closes the connection.
///
/// A missing TLS close_notify surfaces as `UnexpectedEof`; gopher servers
/// routinely just drop the socket, so that is treated as a clean EOF.
fn read_to_eof(stream: &mut impl Read, peer: &str, tls: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(classify_io(e, peer, tls)),
        }
    }
    Ok(buf)
}

/// Map an I/O error onto the transport error taxonomy.
fn classify_io(e: io::Error, peer: &str, tls: bool) -> BurrowError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => BurrowError::ConnectionRefused(peer.to_string()),
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => {
            BurrowError::ConnectionReset(peer.to_string())
        },
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            BurrowError::Timeout(peer.to_string())
        },
        _ if tls => BurrowError::Tls(format!("{peer}: {e}")),
        _ => BurrowError::Io(e),
    }
}
