use std::{
    fmt,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    time::Duration,
};

use crossbeam_channel::{bounded, RecvTimeoutError};

/// Remote address that metrics are sent to.
///
/// The port is kept as a string, exactly as configured, and is only parsed when connecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteAddr {
    server: String,
    port: String,
}

impl RemoteAddr {
    /// Creates a new `RemoteAddr`.
    pub fn new<S, P>(server: S, port: P) -> Self
    where
        S: Into<String>,
        P: Into<String>,
    {
        Self { server: server.into(), port: port.into() }
    }

    /// Returns the server name or IP address.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Returns the port.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Resolves this address into one or more socket addresses.
    ///
    /// # Errors
    ///
    /// If the port is not a valid port number, or the server name cannot be resolved, an error is returned.
    pub fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        let port = self.parse_port()?;
        let addrs = (self.host(), port).to_socket_addrs()?.collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' did not resolve to any address", self.server),
            ));
        }

        Ok(addrs)
    }

    /// Resolves this address, giving up once `timeout` has elapsed.
    ///
    /// IP literals are resolved in place. Names are looked up on a helper thread so that a stalled resolver cannot hold
    /// the caller past `timeout`; a lookup that is abandoned keeps running in the background until the resolver
    /// returns. A zero timeout waits for as long as the resolver takes.
    ///
    /// # Errors
    ///
    /// If the port is not a valid port number, the server name cannot be resolved, or resolution does not finish
    /// within `timeout`, an error is returned.
    pub fn resolve_timeout(&self, timeout: Duration) -> io::Result<Vec<SocketAddr>> {
        if timeout.is_zero() || self.host().parse::<IpAddr>().is_ok() {
            return self.resolve();
        }

        // Malformed ports fail without spawning anything.
        self.parse_port()?;

        let remote = self.clone();
        run_with_timeout(timeout, move || remote.resolve())
    }

    fn parse_port(&self) -> io::Result<u16> {
        self.port.trim().parse::<u16>().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port '{}': {}", self.port, e))
        })
    }

    // Bracketed IPv6 literals are accepted, since that's how they're usually written next to a port.
    fn host(&self) -> &str {
        self.server.trim_start_matches('[').trim_end_matches(']')
    }
}

/// Runs `f` on a helper thread and waits at most `timeout` for its result.
pub(crate) fn run_with_timeout<T, F>(timeout: Duration, f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    // The slot lets the helper finish without blocking after the caller has stopped waiting.
    let (tx, rx) = bounded(1);
    std::thread::Builder::new().name("metrics-handler-resolver".to_string()).spawn(move || {
        let _ = tx.send(f());
    })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            Err(io::Error::new(io::ErrorKind::TimedOut, format!("timed out after {timeout:?}")))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(io::Error::new(io::ErrorKind::Other, "resolver thread exited without a result"))
        }
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.port)
    }
}

/// A way of reaching the remote server.
///
/// A connection is opened for every batch and dropped once the batch has been written, so implementations should not
/// expect connections to be long-lived.
pub trait Transport {
    /// Connection type produced by this transport.
    type Connection: io::Write;

    /// Returns the transport ID, such as `udp`.
    fn id(&self) -> &'static str;

    /// Opens a connection to `remote`, bounded by `timeout`.
    ///
    /// The timeout covers name resolution as well as the connection itself.
    ///
    /// # Errors
    ///
    /// If the remote address cannot be resolved or connected to, an error is returned.
    fn connect(&self, remote: &RemoteAddr, timeout: Duration) -> io::Result<Self::Connection>;
}

/// UDP transport.
///
/// Every line is sent as its own datagram. There is no delivery confirmation.
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpTransport;

impl Transport for UdpTransport {
    type Connection = UdpConnection;

    fn id(&self) -> &'static str {
        "udp"
    }

    fn connect(&self, remote: &RemoteAddr, timeout: Duration) -> io::Result<Self::Connection> {
        let mut last_error = None;
        for addr in remote.resolve_timeout(timeout)? {
            match connect_udp(addr, timeout) {
                Ok(socket) => return Ok(UdpConnection { socket }),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses to connect to")))
    }
}

fn connect_udp(addr: SocketAddr, timeout: Duration) -> io::Result<UdpSocket> {
    let socket = match addr {
        SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
    };
    socket.connect(addr)?;

    // A zero timeout is rejected by the socket, and means "no timeout" to us.
    let timeout = (!timeout.is_zero()).then_some(timeout);
    socket.set_write_timeout(timeout)?;
    Ok(socket)
}

/// A connected UDP socket.
#[derive(Debug)]
pub struct UdpConnection {
    socket: UdpSocket,
}

impl io::Write for UdpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
