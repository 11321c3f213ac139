//! # Transport Layer
//!
//! UDP bridge between sockets and a [`GameServer`](crate::server::GameServer).
//!
//! ## Design
//!
//! - Non-blocking UDP socket, one datagram per message
//! - A peer is "connected" from its first datagram until it stays silent
//!   for `client_timeout`
//! - The bridge only talks to the server through its [`TransportHandle`],
//!   so it can run on its own thread
//! - `Connected` and `Disconnected` are never dropped: when the event queue
//!   is full they wait in the bridge and are retried on every pump. `Data`
//!   is dropped instead, including while such events wait
//!
//! Delivery guarantees are not implemented here: reliable and sequenced
//! messages both go out as plain datagrams.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crossbeam_channel::{TryRecvError, TrySendError};

use crate::server::{ConnectionId, NetworkCommand, NetworkEvent, TransportHandle};
use crate::MAX_PACKET_SIZE;

/// Non-blocking UDP socket with packet statistics.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    stats: TransportStats,
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors, oversized packets included.
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
}

impl UdpTransport {
    /// Binds a non-blocking socket to `addr`.
    ///
    /// # Errors
    ///
    /// Any socket error from binding or configuring the socket.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            stats: TransportStats::default(),
        })
    }

    /// Returns the local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends one datagram.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::InvalidInput`] if `data` exceeds
    /// [`MAX_PACKET_SIZE`], otherwise any socket error.
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if data.len() > MAX_PACKET_SIZE {
            self.stats.send_errors += 1;
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} byte packet exceeds {MAX_PACKET_SIZE}", data.len()),
            ));
        }

        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    /// Receives one datagram, or `None` if nothing is waiting.
    pub fn recv(&mut self) -> Option<(&[u8], SocketAddr)> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((len, addr)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += len as u64;
                Some((&self.recv_buffer[..len], addr))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                self.stats.recv_errors += 1;
                tracing::debug!("recv_from failed: {}", e);
                None
            }
        }
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

struct Peer {
    id: ConnectionId,
    last_seen: Instant,
}

/// Pumps datagrams into [`NetworkEvent`]s and [`NetworkCommand`]s into
/// datagrams.
pub struct TransportBridge {
    transport: UdpTransport,
    handle: TransportHandle,
    peers: HashMap<SocketAddr, Peer>,
    addresses: HashMap<ConnectionId, SocketAddr>,
    /// Connection events the server has not accepted yet, oldest first.
    pending: VecDeque<NetworkEvent>,
    next_connection_id: u32,
    client_timeout: Duration,
}

impl TransportBridge {
    /// Creates a bridge feeding `handle`.
    #[must_use]
    pub fn new(transport: UdpTransport, handle: TransportHandle, client_timeout: Duration) -> Self {
        Self {
            transport,
            handle,
            peers: HashMap::new(),
            addresses: HashMap::new(),
            pending: VecDeque::new(),
            next_connection_id: 0,
            client_timeout,
        }
    }

    /// The underlying socket.
    #[must_use]
    pub const fn transport(&self) -> &UdpTransport {
        &self.transport
    }

    /// Number of peers considered connected.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Connection events waiting for room in the event queue.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Runs one retry, receive, timeout and send pass.
    ///
    /// Returns false once the server asked for shutdown or dropped its side
    /// of the channels.
    pub fn pump(&mut self) -> bool {
        let now = Instant::now();
        self.retry_pending();
        self.receive(now);
        self.expire(now);
        self.flush()
    }

    /// Pumps until shutdown, sleeping `idle` between passes.
    pub fn run(mut self, idle: Duration) {
        tracing::info!("Transport listening on {}", self.transport.local_addr());
        while self.pump() {
            std::thread::sleep(idle);
        }
        tracing::info!("Transport stopped");
    }

    fn receive(&mut self, now: Instant) {
        loop {
            let (payload, addr) = match self.transport.recv() {
                Some((data, addr)) => (data.to_vec(), addr),
                None => break,
            };

            let connection = match self.peers.get_mut(&addr) {
                Some(peer) => {
                    peer.last_seen = now;
                    peer.id
                }
                None => {
                    let id = ConnectionId(self.next_connection_id);
                    self.next_connection_id = self.next_connection_id.wrapping_add(1);
                    self.peers.insert(addr, Peer { id, last_seen: now });
                    self.addresses.insert(id, addr);
                    tracing::info!("New peer {} as {}", addr, id);
                    self.emit(NetworkEvent::Connected(id));
                    id
                }
            };

            self.emit(NetworkEvent::Data {
                connection,
                payload,
            });
        }
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.client_timeout;
        let expired: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(_, peer)| now.duration_since(peer.last_seen) > timeout)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in expired {
            if let Some(peer) = self.peers.remove(&addr) {
                self.addresses.remove(&peer.id);
                tracing::info!("Peer {} ({}) timed out", addr, peer.id);
                self.emit(NetworkEvent::Disconnected(peer.id));
            }
        }
    }

    fn flush(&mut self) -> bool {
        loop {
            match self.handle.commands.try_recv() {
                Ok(NetworkCommand::Send {
                    connection,
                    delivery,
                    payload,
                }) => {
                    let Some(addr) = self.addresses.get(&connection).copied() else {
                        tracing::trace!("Send to gone {} dropped", connection);
                        continue;
                    };
                    if let Err(e) = self.transport.send_to(&payload, addr) {
                        tracing::warn!("{:?} send to {} failed: {}", delivery, addr, e);
                    }
                }
                Ok(NetworkCommand::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    fn retry_pending(&mut self) {
        while let Some(event) = self.pending.pop_front() {
            match self.handle.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.pending.push_front(event);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.pending.clear();
                    return;
                }
            }
        }
    }

    fn emit(&mut self, event: NetworkEvent) {
        let is_data = matches!(event, NetworkEvent::Data { .. });
        if !self.pending.is_empty() {
            if is_data {
                tracing::trace!("Connection events pending, data dropped");
            } else {
                self.pending.push_back(event);
            }
            return;
        }

        match self.handle.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) if !is_data => {
                tracing::debug!("Event queue full, {:?} deferred", event);
                self.pending.push_back(event);
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Event queue full, data dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("Server gone, event dropped");
            }
        }
    }
}
