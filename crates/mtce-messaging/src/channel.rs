//! Per-network UDP channel to the on-host agent fleet (spec §4.2: "three
//! datagram channels to each host's on-host agent: management,
//! cluster-host, pxeboot").
//!
//! All socket calls are `tracing`-instrumented and propagate `Result`
//! rather than panicking on I/O failure.

use crate::message::Message;
use mtce_common::MtceError;
use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Which of the three provisioned networks a channel carries traffic on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Management,
    ClusterHost,
    Pxeboot,
}

/// A bound UDP socket for one network, wrapped to send/receive `Message`s.
pub struct NetworkChannel {
    network: Network,
    socket: UdpSocket,
}

impl NetworkChannel {
    /// Bind a UDP socket on `local_addr` for `network`. Uses `socket2` to
    /// set `SO_REUSEADDR` before binding, since the core and its on-host
    /// peers may restart independently while traffic is still in flight.
    pub async fn bind(network: Network, local_addr: SocketAddr) -> Result<Self, MtceError> {
        let domain = match local_addr.ip() {
            IpAddr::V4(_) => Domain::IPV4,
            IpAddr::V6(_) => Domain::IPV6,
        };
        let sock = Socket::new(domain, Type::DGRAM, None)
            .map_err(|e| MtceError::SocketCreate(e.to_string()))?;
        sock.set_reuse_address(true)
            .map_err(|e| MtceError::SocketOption(e.to_string()))?;
        sock.set_nonblocking(true)
            .map_err(|e| MtceError::SocketOption(e.to_string()))?;
        sock.bind(&local_addr.into())
            .map_err(|e| MtceError::SocketBind(e.to_string()))?;
        let socket = UdpSocket::from_std(sock.into())
            .map_err(|e| MtceError::SocketCreate(e.to_string()))?;
        debug!(?network, %local_addr, "bound network channel");
        Ok(Self { network, socket })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Send `msg` to `peer`. Unused buffer padding is never added to the
    /// wire form — `Message::encode` already writes only declared lengths.
    pub async fn send(&self, msg: &Message, peer: SocketAddr) -> Result<(), MtceError> {
        let bytes = msg.encode()?;
        self.socket
            .send_to(&bytes, peer)
            .await
            .map_err(|e| MtceError::SocketSendto(e.to_string()))?;
        Ok(())
    }

    /// Receive the next datagram and decode it. Malformed datagrams are
    /// logged and skipped rather than torn down the channel, since this
    /// socket serves every host on the network.
    pub async fn recv(&self) -> Result<(Message, SocketAddr), MtceError> {
        let mut buf = vec![0u8; crate::message::MAX_BUF_LEN + 256];
        loop {
            let (len, peer) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| MtceError::SocketOption(e.to_string()))?;
            match Message::decode(&buf[..len]) {
                Ok(msg) => return Ok((msg, peer)),
                Err(e) => warn!(%peer, error = %e, "dropping malformed datagram"),
            }
        }
    }
}
