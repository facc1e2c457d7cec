//! UDP transport: one bound socket, one fixed peer, receive from any sender.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use crate::message::{Message, MAX_MESSAGE_LEN};
use crate::transport::{Transport, TransportError};

pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    /// Loopback address of our own socket, target of the wake datagram.
    wake_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind `local` and address every send to `peer`. `receive_timeout` bounds each blocking
    /// receive so the stage can re-check the run flag even if a wake datagram is lost.
    pub fn bind(
        local: SocketAddr,
        peer: SocketAddr,
        receive_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        Self::from_socket(UdpSocket::bind(local)?, peer, receive_timeout)
    }

    /// Wrap an already bound socket.
    pub fn from_socket(
        socket: UdpSocket,
        peer: SocketAddr,
        receive_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        socket.set_read_timeout(receive_timeout)?;
        let bound = socket.local_addr()?;
        let wake_ip = match bound.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        tracing::debug!(%bound, %peer, "udp transport bound");
        Ok(Self {
            socket,
            peer,
            wake_addr: SocketAddr::new(wake_ip, bound.port()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send_datagram(&self, msg: &Message) -> Result<(), TransportError> {
        self.socket
            .send_to(msg.as_bytes(), self.peer)
            .map(|_| ())
            .map_err(TransportError::Send)
    }

    fn receive_datagram(&self) -> Result<Option<Message>, TransportError> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        match self.socket.recv_from(&mut buf) {
            // Empty datagrams carry nothing; our own wake is one of them.
            Ok((0, _)) => Ok(None),
            Ok((n, from)) => {
                tracing::trace!(%from, len = n, "datagram received");
                Ok(Message::new(&buf[..n]).ok())
            }
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(TransportError::Receive(e)),
        }
    }

    fn wake(&self) {
        if let Err(e) = self.socket.send_to(&[], self.wake_addr) {
            tracing::debug!(error = %e, "wake datagram not sent");
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            // Windows reports ICMP port-unreachable from an earlier send here.
            | io::ErrorKind::ConnectionReset
    )
}
