// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction
//!
//! The publisher and subscriber sessions never talk to a concrete middleware.
//! They drive the object-safe traits below, which any pub/sub transport can
//! implement:
//!
//! - [`InMemoryTransport`](crate::memory::InMemoryTransport) -- process-local
//!   bus, used by tests and demos
//! - [`UdpTransport`](crate::udp::UdpTransport) -- minimal multicast transport
//!   so separate processes can exchange shapes
//!
//! ```ignore
//! impl ShapeTransport for MyMiddleware {
//!     fn create_writer(&self, topic: &Topic) -> Result<Box<dyn ShapeWriter>, TransportError> {
//!         // Create real DataWriter...
//!     }
//!     // ...
//! }
//! ```

use crate::error::TransportError;
use crate::model::{InstanceHandle, Sample, ShapeRecord, Topic};
use std::time::Duration;

/// Writing side of a shape topic.
///
/// Dropping a writer unregisters it: instances it alone kept alive and did not
/// dispose become `NOT_ALIVE_NO_WRITERS` on matched readers.
pub trait ShapeWriter: Send {
    /// Topic this writer publishes on.
    fn topic(&self) -> &Topic;

    /// Declare the instance identified by `record`'s key as owned by this writer.
    fn register_instance(&self, record: &ShapeRecord) -> Result<InstanceHandle, TransportError>;

    /// Publish a new revision of an instance.
    fn write(&self, record: &ShapeRecord) -> Result<(), TransportError>;

    /// Retire a registered instance.
    fn dispose_instance(&self, handle: InstanceHandle) -> Result<(), TransportError>;
}

/// Reading side of a shape topic.
pub trait ShapeReader: Send {
    /// Topic this reader is subscribed to.
    fn topic(&self) -> &Topic;

    /// Remove and return every buffered entry, data and lifecycle alike.
    fn take(&self) -> Result<Vec<Sample>, TransportError>;

    /// Return every buffered entry without removing it; entries are marked `Read`.
    fn read(&self) -> Result<Vec<Sample>, TransportError>;

    /// Resolve the key of an instance handle delivered by this reader.
    fn key_value(&self, handle: InstanceHandle) -> Result<String, TransportError>;

    /// Block until entries are buffered or `timeout` elapses.
    ///
    /// Returns `true` when entries are available.
    fn wait_for_data(&self, timeout: Duration) -> Result<bool, TransportError>;
}

/// Factory for readers and writers within one domain.
pub trait ShapeTransport: Send + Sync {
    fn domain_id(&self) -> u32;

    fn create_writer(&self, topic: &Topic) -> Result<Box<dyn ShapeWriter>, TransportError>;

    fn create_reader(&self, topic: &Topic) -> Result<Box<dyn ShapeReader>, TransportError>;
}

/// Reject domain ids the RTPS port formula cannot map.
pub fn validate_domain_id(domain_id: u32) -> Result<u32, TransportError> {
    if domain_id > crate::error::MAX_DOMAIN_ID {
        return Err(TransportError::InvalidDomainId(domain_id));
    }
    Ok(domain_id)
}
