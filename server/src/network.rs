//! UDP transport: the equipment receiver and the station's transmitter.
//!
//! The receiver is a producer only. It decodes each datagram and enqueues
//! the event for the match service; it never sees match state. Datagrams
//! that do not decode are dropped.

use crate::service::MatchCommand;
use log::{debug, error, info, warn};
use shared::{Event, DEFAULT_HOST, DEFAULT_RX_PORT, DEFAULT_TX_PORT, RECV_BUFFER_SIZE};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub host: String,
    pub rx_port: u16,
    pub tx_port: u16,
    pub buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            rx_port: DEFAULT_RX_PORT,
            tx_port: DEFAULT_TX_PORT,
            buffer_size: RECV_BUFFER_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn rx_addr(&self) -> Result<SocketAddr, NetworkError> {
        resolve(&self.host, self.rx_port)
    }

    pub fn tx_addr(&self) -> Result<SocketAddr, NetworkError> {
        resolve(&self.host, self.tx_port)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, NetworkError> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| NetworkError::Address(format!("{}:{}", host, port)))
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("invalid address {0}")]
    Address(String),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("send failed: {0}")]
    Send(#[from] io::Error),
}

/// Receiving half: one bound socket and a blocking-receive task.
pub struct NetworkReceiver {
    socket: UdpSocket,
    buffer_size: usize,
}

impl NetworkReceiver {
    /// Binds the receive socket with `SO_REUSEADDR`. Must run inside a Tokio runtime.
    pub fn bind(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let addr = config.rx_addr()?;
        let socket =
            bind_reusable(addr).map_err(|source| NetworkError::Bind { addr, source })?;
        let local = socket
            .local_addr()
            .map_err(|source| NetworkError::Bind { addr, source })?;
        info!("Listening for equipment on {}", local);

        Ok(Self {
            socket,
            buffer_size: config.buffer_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the receive loop. It exits when `stop` flips or the match
    /// channel closes.
    pub fn spawn(
        self,
        commands: mpsc::Sender<MatchCommand>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer = vec![0u8; self.buffer_size];

            loop {
                if *stop.borrow() {
                    break;
                }

                tokio::select! {
                    result = self.socket.recv_from(&mut buffer) => match result {
                        Ok((len, addr)) => match shared::decode(&buffer[..len]) {
                            Ok(event) => {
                                debug!("{} from {}", event, addr);
                                if commands.send(MatchCommand::Network(event)).await.is_err() {
                                    debug!("Match channel closed");
                                    break;
                                }
                            }
                            Err(e) => debug!("Dropped datagram from {}: {}", addr, e),
                        },
                        Err(e) => {
                            error!("Error receiving datagram: {}", e);
                            sleep(Duration::from_millis(10)).await;
                        }
                    },

                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Network receiver stopped");
        })
    }
}

fn bind_reusable(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Sends control messages from the station to the equipment.
pub struct Transmitter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Transmitter {
    pub async fn bind(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let target = config.tx_addr()?;
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: local,
                source,
            })?;

        info!("Transmitting to {}", target);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Sends the event as many times as the protocol asks for.
    pub async fn send(&self, event: &Event) -> Result<(), NetworkError> {
        let payload = shared::encode(event);
        for _ in 0..event.transmissions() {
            self.socket.send_to(&payload, self.target).await?;
        }
        debug!("Sent {} x{} to {}", event, event.transmissions(), self.target);
        Ok(())
    }

    /// Like [`send`](Self::send), but a failure is only logged.
    pub async fn announce(&self, event: &Event) {
        if let Err(e) = self.send(event).await {
            warn!("Failed to announce {}: {}", event, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn loopback(rx_port: u16, tx_port: u16) -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            rx_port,
            tx_port,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.rx_port, 7501);
        assert_eq!(config.tx_port, 7500);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.rx_addr().unwrap(), "127.0.0.1:7501".parse().unwrap());
    }

    #[test]
    fn test_invalid_host() {
        let config = NetworkConfig {
            host: "not a host name".to_string(),
            ..NetworkConfig::default()
        };
        assert!(matches!(config.rx_addr(), Err(NetworkError::Address(_))));
    }

    #[tokio::test]
    async fn test_receiver_decodes_and_drops() {
        let receiver = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let addr = receiver.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = receiver.spawn(tx, stop_rx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for payload in ["garbage", "202", "", "1:2", "53"] {
            sender.send_to(payload.as_bytes(), addr).await.unwrap();
        }

        let mut events = Vec::new();
        for _ in 0..3 {
            match timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(MatchCommand::Network(event))) => events.push(event),
                other => panic!("unexpected {:?}", other.map(|c| c.is_some())),
            }
        }
        assert_eq!(
            events,
            [
                Event::GameStart,
                Event::Hit {
                    shooter_id: 1,
                    target_id: 2
                },
                Event::BaseHit {
                    team: shared::Team::Red
                },
            ]
        );

        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_receiver_exits_when_channel_closes() {
        let receiver = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let addr = receiver.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let task = receiver.spawn(tx, stop_rx);
        drop(rx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"202", addr).await.unwrap();

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transmitter_repeats_end() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transmitter = Transmitter::bind(&loopback(0, port)).await.unwrap();

        transmitter.send(&Event::GameEnd).await.unwrap();
        transmitter.send(&Event::GameStart).await.unwrap();

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        for _ in 0..4 {
            let (len, _) = timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            received.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }
        assert_eq!(received, ["221", "221", "221", "202"]);
    }

    // Linux refuses a second bind unless both sockets set SO_REUSEADDR
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = first.local_addr().unwrap().port();

        match NetworkReceiver::bind(&loopback(port, port)) {
            Err(NetworkError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
            Err(other) => panic!("expected a bind error, got {}", other),
            Ok(_) => panic!("bound a port that is already taken"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_receivers_share_port() {
        let first = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = NetworkReceiver::bind(&loopback(port, port)).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
    }
}
