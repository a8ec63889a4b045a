// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast transport
//!
//! Lets a publisher and a subscriber running as separate processes exchange
//! shapes on one host or LAN. This is not RTPS: every message is a single JSON
//! datagram sent to a multicast group on the domain's user-traffic port.
//!
//! # Port mapping
//!
//! ```text
//! port = PORT_BASE + DOMAIN_ID_GAIN * domain_id + USER_MULTICAST_OFFSET
//!      = 7400 + 250 * domain_id + 1
//! ```
//!
//! # Liveliness
//!
//! Writers have no heartbeat; a data or dispose message renews the writer's
//! lease, so the publish period must stay below the lease (checked by
//! [`ShapesConfig::validate`](crate::config::ShapesConfig::validate)). A reader
//! declares a writer lost when it unregisters (sent on drop) or when its lease
//! expires, and reports `NOT_ALIVE_NO_WRITERS` for the instances it leaves
//! orphaned.

use crate::error::TransportError;
use crate::lifecycle::{InstanceTracker, WriterId, WriterRegistry};
use crate::model::{InstanceHandle, Sample, SampleState, ShapeRecord, Topic};
use crate::transport::{validate_domain_id, ShapeReader, ShapeTransport, ShapeWriter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

/// RTPS port base.
pub const PORT_BASE: u16 = 7400;

/// Port gap between two domains.
pub const DOMAIN_ID_GAIN: u16 = 250;

/// Offset of the user-traffic multicast port within a domain.
pub const USER_MULTICAST_OFFSET: u16 = 1;

/// Default multicast group.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Default writer lease.
pub const DEFAULT_LEASE_MS: u64 = 5_000;

const MAX_DATAGRAM: usize = 65_507;

/// User-traffic multicast port for `domain_id`.
pub fn user_multicast_port(domain_id: u32) -> Result<u16, TransportError> {
    let domain_id = validate_domain_id(domain_id)? as u16;
    Ok(PORT_BASE + DOMAIN_ID_GAIN * domain_id + USER_MULTICAST_OFFSET)
}

/// UDP transport settings (the `[udp]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Multicast group both sides join.
    pub multicast_group: Ipv4Addr,

    /// Override for the domain-derived port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Local interface for sending and joining (0.0.0.0 = let the OS pick).
    pub interface: Ipv4Addr,

    /// Multicast TTL (1 = stay on the local subnet).
    pub ttl: u32,

    /// A silent writer is declared lost after this many milliseconds.
    pub lease_ms: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_GROUP,
            port: None,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            lease_ms: DEFAULT_LEASE_MS,
        }
    }
}

impl UdpConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

/// One datagram on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    Data {
        topic: String,
        writer: u64,
        record: ShapeRecord,
    },
    Dispose {
        topic: String,
        writer: u64,
        key: String,
    },
    Unregister {
        topic: String,
        writer: u64,
    },
}

impl WireMessage {
    pub fn topic(&self) -> &str {
        match self {
            Self::Data { topic, .. }
            | Self::Dispose { topic, .. }
            | Self::Unregister { topic, .. } => topic,
        }
    }

    pub fn writer(&self) -> WriterId {
        match self {
            Self::Data { writer, .. }
            | Self::Dispose { writer, .. }
            | Self::Unregister { writer, .. } => WriterId(*writer),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a datagram; malformed input is logged and skipped.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(len = bytes.len(), error = %e, "dropping undecodable datagram");
                None
            }
        }
    }
}

/// Multicast transport for one domain.
pub struct UdpTransport {
    domain_id: u32,
    group: SocketAddrV4,
    config: UdpConfig,
}

impl UdpTransport {
    pub fn new(domain_id: u32, config: UdpConfig) -> Result<Self, TransportError> {
        let port = match config.port {
            Some(port) => {
                validate_domain_id(domain_id)?;
                port
            }
            None => user_multicast_port(domain_id)?,
        };
        let group = SocketAddrV4::new(config.multicast_group, port);
        tracing::info!(domain_id, %group, "UDP transport ready");
        Ok(Self {
            domain_id,
            group,
            config,
        })
    }

    /// Multicast destination used by writers and joined by readers.
    pub fn group_addr(&self) -> SocketAddrV4 {
        self.group
    }

    fn send_socket(&self) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_ttl_v4(self.config.ttl)?;
        socket.set_multicast_loop_v4(true)?;
        if !self.config.interface.is_unspecified() {
            socket.set_multicast_if_v4(&self.config.interface)?;
        }
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind_addr.into())?;
        Ok(socket.into())
    }

    fn recv_socket(&self) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        // Several subscribers on one host share the port.
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;

        let bind_addr =
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.group.port()));
        socket.bind(&bind_addr.into())?;
        socket.join_multicast_v4(self.group.ip(), &self.config.interface)?;
        tracing::debug!(
            group = %self.group,
            iface = %self.config.interface,
            "joined multicast group"
        );
        Ok(socket.into())
    }
}

impl ShapeTransport for UdpTransport {
    fn domain_id(&self) -> u32 {
        self.domain_id
    }

    fn create_writer(&self, topic: &Topic) -> Result<Box<dyn ShapeWriter>, TransportError> {
        let socket = self.send_socket()?;
        let id = WriterId(fastrand::u64(1..));
        tracing::debug!(topic = %topic.name, writer = %id, "UDP writer created");
        Ok(Box::new(UdpWriter {
            socket,
            dest: self.group,
            topic: topic.clone(),
            id,
            registered: Mutex::new(WriterRegistry::default()),
        }))
    }

    fn create_reader(&self, topic: &Topic) -> Result<Box<dyn ShapeReader>, TransportError> {
        let socket = self.recv_socket()?;
        tracing::debug!(topic = %topic.name, "UDP reader created");
        Ok(Box::new(UdpReader {
            socket,
            topic: topic.clone(),
            state: Mutex::new(ReaderState::new(&topic.name, self.config.lease())),
        }))
    }
}

/// Writer sending JSON datagrams to the group.
pub struct UdpWriter {
    socket: UdpSocket,
    dest: SocketAddrV4,
    topic: Topic,
    id: WriterId,
    registered: Mutex<WriterRegistry>,
}

impl UdpWriter {
    fn send(&self, msg: &WireMessage) -> Result<(), TransportError> {
        let bytes = msg.encode()?;
        self.socket.send_to(&bytes, self.dest)?;
        Ok(())
    }
}

impl ShapeWriter for UdpWriter {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn register_instance(&self, record: &ShapeRecord) -> Result<InstanceHandle, TransportError> {
        Ok(self.registered.lock().register(record.key()))
    }

    fn write(&self, record: &ShapeRecord) -> Result<(), TransportError> {
        self.registered.lock().register(record.key());
        self.send(&WireMessage::Data {
            topic: self.topic.name.clone(),
            writer: self.id.0,
            record: record.clone(),
        })
    }

    fn dispose_instance(&self, handle: InstanceHandle) -> Result<(), TransportError> {
        let key = self
            .registered
            .lock()
            .key_of(handle)
            .ok_or(TransportError::UnknownInstance(handle))?;
        self.send(&WireMessage::Dispose {
            topic: self.topic.name.clone(),
            writer: self.id.0,
            key,
        })
    }
}

impl Drop for UdpWriter {
    fn drop(&mut self) {
        let msg = WireMessage::Unregister {
            topic: self.topic.name.clone(),
            writer: self.id.0,
        };
        if let Err(e) = self.send(&msg) {
            tracing::debug!(writer = %self.id, error = %e, "unregister not sent");
        }
    }
}

/// Reader-side bookkeeping, independent of the socket.
#[derive(Debug)]
pub(crate) struct ReaderState {
    topic: String,
    lease: Duration,
    entries: VecDeque<Sample>,
    tracker: InstanceTracker,
    leases: HashMap<WriterId, Instant>,
}

impl ReaderState {
    pub(crate) fn new(topic: &str, lease: Duration) -> Self {
        Self {
            topic: topic.to_string(),
            lease,
            entries: VecDeque::new(),
            tracker: InstanceTracker::new(),
            leases: HashMap::new(),
        }
    }

    /// Apply one message received at `now`.
    pub(crate) fn handle_message(&mut self, msg: WireMessage, now: Instant) {
        if msg.topic() != self.topic {
            tracing::trace!(topic = msg.topic(), "ignoring other topic");
            return;
        }
        let writer = msg.writer();
        match msg {
            WireMessage::Data { record, .. } => {
                self.leases.insert(writer, now);
                let handle = self.tracker.on_data(record.key(), writer);
                self.entries.push_back(Sample::data(record, handle));
            }
            WireMessage::Dispose { key, .. } => {
                self.leases.insert(writer, now);
                if let Some((handle, state)) = self.tracker.on_dispose(&key, writer) {
                    self.entries.push_back(Sample::lifecycle(handle, state));
                }
            }
            WireMessage::Unregister { .. } => {
                self.leases.remove(&writer);
                self.writer_lost(writer);
            }
        }
    }

    /// Drop writers whose lease ran out by `now`.
    pub(crate) fn expire(&mut self, now: Instant) {
        let lease = self.lease;
        let mut expired: Vec<WriterId> = self
            .leases
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > lease)
            .map(|(writer, _)| *writer)
            .collect();
        expired.sort();
        for writer in expired {
            self.leases.remove(&writer);
            tracing::warn!(%writer, "writer lease expired");
            self.writer_lost(writer);
        }
    }

    fn writer_lost(&mut self, writer: WriterId) {
        for (handle, state) in self.tracker.on_writer_lost(writer) {
            self.entries.push_back(Sample::lifecycle(handle, state));
        }
    }
}

/// Reader receiving from the group.
pub struct UdpReader {
    socket: UdpSocket,
    topic: Topic,
    state: Mutex<ReaderState>,
}

impl UdpReader {
    fn receive(&self, bytes: &[u8]) {
        if let Some(msg) = WireMessage::decode(bytes) {
            self.state.lock().handle_message(msg, Instant::now());
        }
    }

    /// Pull every datagram already queued on the socket, then run lease expiry.
    fn drain_socket(&self) -> Result<(), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        self.socket.set_nonblocking(true)?;
        let result = loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => self.receive(&buf[..len]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.socket.set_nonblocking(false)?;
        result?;
        self.state.lock().expire(Instant::now());
        Ok(())
    }
}

impl ShapeReader for UdpReader {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn take(&self) -> Result<Vec<Sample>, TransportError> {
        self.drain_socket()?;
        Ok(self.state.lock().entries.drain(..).collect())
    }

    fn read(&self) -> Result<Vec<Sample>, TransportError> {
        self.drain_socket()?;
        let mut state = self.state.lock();
        let mut samples = Vec::with_capacity(state.entries.len());
        for entry in state.entries.iter_mut() {
            samples.push(entry.clone());
            entry.info.sample_state = SampleState::Read;
        }
        Ok(samples)
    }

    fn key_value(&self, handle: InstanceHandle) -> Result<String, TransportError> {
        self.state
            .lock()
            .tracker
            .key_value(handle)
            .map(str::to_string)
            .ok_or(TransportError::UnknownInstance(handle))
    }

    fn wait_for_data(&self, timeout: Duration) -> Result<bool, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            self.drain_socket()?;
            if !self.state.lock().entries.is_empty() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            // A zero read timeout is rejected by the OS.
            let remaining = (deadline - now).max(Duration::from_millis(1));
            self.socket.set_read_timeout(Some(remaining))?;
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => self.receive(&buf[..len]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}
