use crate::clock::SharedClock;
use crate::config::SharedConfig;
use crate::dns::handlers::Handler;
use crate::txt_store::DynTxtStore;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;

/// Largest UDP payload read from the socket.
const MAX_UDP_MESSAGE: usize = 4096;

/// A bound DNS server, serving UDP and TCP on the configured listen address.
pub struct Server {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    handler: Handler,
    tcp_timeout: Duration,
}

/// Bind the UDP socket and TCP listener for `config.listen_addr`.
///
/// # Errors
///
/// Returns an error if the zone or TSIG key in `config` are invalid, or if either socket can't be
/// bound.
pub async fn new(
    config: SharedConfig,
    txt_store: DynTxtStore,
    clock: SharedClock,
) -> anyhow::Result<Server> {
    let handler = Handler::new(config.zone()?, config.tsig_key()?, txt_store, clock);
    let udp = UdpSocket::bind(config.listen_addr).await?;
    let tcp = TcpListener::bind(config.listen_addr).await?;
    Ok(Server {
        udp: Arc::new(udp),
        tcp,
        handler,
        tcp_timeout: config.dns_tcp_timeout,
    })
}

impl Server {
    /// # Errors
    ///
    /// Returns an error if the local address of the UDP socket can't be read.
    pub fn udp_local_addr(&self) -> io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// # Errors
    ///
    /// Returns an error if the local address of the TCP listener can't be read.
    pub fn tcp_local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Serve both transports until one of them fails.
    ///
    /// # Errors
    ///
    /// Per-message and per-connection errors are logged and never returned; this only completes
    /// if a listener task panics.
    pub async fn block_until_done(self) -> anyhow::Result<()> {
        let udp = tokio::spawn(serve_udp(self.udp, self.handler.clone()));
        let tcp = tokio::spawn(serve_tcp(self.tcp, self.handler, self.tcp_timeout));
        tokio::select! {
            res = udp => res?,
            res = tcp => res?,
        }
    }
}

async fn serve_udp(socket: Arc<UdpSocket>, handler: Handler) -> anyhow::Result<()> {
    let mut buf = vec![0u8; MAX_UDP_MESSAGE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                tracing::error!("UDP receive error: {err}");
                continue;
            }
        };
        let request = buf[..len].to_vec();
        let socket = socket.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let Some(response) = handler.handle(&request) else {
                return;
            };
            if let Err(err) = socket.send_to(&response, peer).await {
                tracing::error!("UDP send to {peer} failed: {err}");
            }
        });
    }
}

async fn serve_tcp(
    listener: TcpListener,
    handler: Handler,
    idle_timeout: Duration,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::error!("TCP accept error: {err}");
                continue;
            }
        };
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_tcp_connection(stream, &handler, idle_timeout).await {
                tracing::debug!("TCP connection from {peer} closed: {err}");
            }
        });
    }
}

/// Serve length prefixed messages until the peer closes the connection or stays idle for
/// `idle_timeout`.
async fn serve_tcp_connection(
    mut stream: TcpStream,
    handler: &Handler,
    idle_timeout: Duration,
) -> io::Result<()> {
    loop {
        let len = match timeout(idle_timeout, stream.read_u16()).await {
            Err(_) => return Ok(()),
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(res) => res?,
        };
        let mut request = vec![0u8; usize::from(len)];
        timeout(idle_timeout, stream.read_exact(&mut request)).await??;

        let Some(response) = handler.handle(&request) else {
            continue;
        };
        let Ok(response_len) = u16::try_from(response.len()) else {
            tracing::error!("dropping oversized TCP response of {} bytes", response.len());
            continue;
        };
        stream.write_u16(response_len).await?;
        stream.write_all(&response).await?;
    }
}
