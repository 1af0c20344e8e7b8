use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time;
use tracing::debug;

use crate::config::ScanConfig;
use crate::payloads;
use crate::services::ServiceNameResolver;
use crate::types::{PortResult, PortState, ProbeTask, Protocol};

/// A single-port prober driven by the scan coordinator.
///
/// `addr` is the target, resolved once by the coordinator before dispatch.
/// `None` means the port is closed or did not answer affirmatively. Expected
/// network failures must map to `None`; panicking is reserved for genuine faults
/// and is reported by the coordinator as a task error.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self, addr: IpAddr, task: ProbeTask) -> Option<PortResult>;
}

/// Network prober: TCP connect and UDP send/receive against a real host.
#[derive(Debug, Clone, Default)]
pub struct PortProbe {
    config: ScanConfig,
    resolver: ServiceNameResolver,
}

impl PortProbe {
    pub fn new(config: ScanConfig, resolver: ServiceNameResolver) -> Self {
        Self { config, resolver }
    }

    /// Full TCP connect. Any failure (refused, timeout, unreachable) is closed.
    pub async fn probe_tcp(&self, addr: IpAddr, port: u16) -> Option<PortResult> {
        match time::timeout(
            self.config.tcp_connect_timeout,
            TcpStream::connect(SocketAddr::new(addr, port)),
        )
        .await
        {
            Ok(Ok(stream)) => {
                drop(stream);
                Some(self.open_result(port, Protocol::Tcp, PortState::Open))
            }
            Ok(Err(e)) => {
                debug!(port, "tcp connect failed: {e}");
                None
            }
            Err(_) => {
                debug!(port, "tcp connect timed out");
                None
            }
        }
    }

    /// UDP probe. A reply means open, silence means open|filtered, an ICMP
    /// port-unreachable (or any other I/O error) means closed.
    pub async fn probe_udp(&self, addr: IpAddr, port: u16) -> Option<PortResult> {
        match self.udp_exchange(SocketAddr::new(addr, port)).await {
            Ok(state) => Some(self.open_result(port, Protocol::Udp, state)),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(port, "udp port unreachable");
                None
            }
            Err(e) => {
                debug!(port, "udp probe failed: {e}");
                None
            }
        }
    }

    async fn udp_exchange(&self, remote: SocketAddr) -> io::Result<PortState> {
        let port = remote.port();
        let local = match remote.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };

        // A connected socket is what lets the kernel report ICMP port-unreachable
        // back to us as ConnectionRefused.
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        socket.send(payloads::build_payload(port)).await?;

        let mut buf = [0u8; 1024];
        match time::timeout(self.config.udp_receive_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                debug!(port, bytes = n, "udp reply received");
                Ok(PortState::Open)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(PortState::OpenFiltered),
        }
    }

    fn open_result(&self, port: u16, protocol: Protocol, state: PortState) -> PortResult {
        PortResult {
            port,
            protocol,
            service: self.resolver.resolve(port),
            state,
        }
    }
}

#[async_trait]
impl Probe for PortProbe {
    async fn probe(&self, addr: IpAddr, task: ProbeTask) -> Option<PortResult> {
        match task.protocol {
            Protocol::Tcp => self.probe_tcp(addr, task.port).await,
            Protocol::Udp => self.probe_udp(addr, task.port).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn fast_probe() -> PortProbe {
        PortProbe::new(
            ScanConfig {
                resolve_timeout: Duration::from_secs(1),
                tcp_connect_timeout: Duration::from_millis(500),
                udp_receive_timeout: Duration::from_millis(200),
                shutdown_grace: Duration::from_secs(5),
            },
            ServiceNameResolver::builtin(),
        )
    }

    #[tokio::test]
    async fn tcp_listener_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let res = fast_probe().probe_tcp(LOOPBACK, port).await.unwrap();
        assert_eq!(res.port, port);
        assert_eq!(res.protocol, Protocol::Tcp);
        assert_eq!(res.state, PortState::Open);
    }

    #[tokio::test]
    async fn tcp_closed_port_has_no_result() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(fast_probe().probe_tcp(LOOPBACK, port).await.is_none());
    }

    #[tokio::test]
    async fn probe_dispatches_on_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = fast_probe();
        let tcp = probe
            .probe(LOOPBACK, ProbeTask { port, protocol: Protocol::Tcp })
            .await;
        assert_eq!(tcp.map(|r| r.protocol), Some(Protocol::Tcp));
    }

    #[tokio::test]
    async fn udp_reply_is_open() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            if let Ok((n, from)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(&buf[..n.max(1)], from).await;
            }
        });
        let res = fast_probe().probe_udp(LOOPBACK, port).await.unwrap();
        assert_eq!(res.state, PortState::Open);
        assert_eq!(res.protocol, Protocol::Udp);
    }

    #[tokio::test]
    async fn udp_silence_is_open_filtered() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let res = fast_probe().probe_udp(LOOPBACK, port).await.unwrap();
        assert_eq!(res.state, PortState::OpenFiltered);
        drop(silent);
    }

    #[tokio::test]
    async fn udp_unreachable_has_no_result() {
        let port = {
            let s = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            s.local_addr().unwrap().port()
        };
        assert!(fast_probe().probe_udp(LOOPBACK, port).await.is_none());
    }
}
