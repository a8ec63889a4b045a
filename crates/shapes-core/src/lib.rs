// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shapes publish/subscribe sessions
//!
//! The session core behind the `shapes-publisher` and `shapes-subscriber`
//! tools: a typed pub/sub session over an abstract transport, with per-key
//! instance lifecycle tracking.
//!
//! # Features
//!
//! - **Publisher Session**: moves one shape along a sine sweep, writes it once
//!   per period and disposes it on exit
//! - **Subscriber Session**: waits with a bounded timeout, drains every
//!   available sample and dispatches data and lifecycle events to a display
//! - **Instance Lifecycle**: `ALIVE` / `NOT_ALIVE_DISPOSED` /
//!   `NOT_ALIVE_NO_WRITERS` per color key
//! - **Transports**: in-memory bus for tests, UDP multicast between processes
//!
//! # Quick Start
//!
//! ```bash
//! # Terminal 1
//! shapes-subscriber --domain 0
//!
//! # Terminal 2
//! shapes-publisher --domain 0 --color RED --sample-count 20
//! ```
//!
//! # Embedding
//!
//! ```no_run
//! use shapes_core::{
//!     InMemoryTransport, PublisherConfig, PublisherSession, ShapeTransport, ShutdownToken, Topic,
//! };
//!
//! let transport = InMemoryTransport::new(0)?;
//! let writer = transport.create_writer(&Topic::default())?;
//! let config = PublisherConfig {
//!     color: "RED".into(),
//!     sample_count: Some(3),
//!     ..PublisherConfig::default()
//! };
//! let report = PublisherSession::new(writer, config, ShutdownToken::new()).run()?;
//! assert_eq!(report.samples_written, 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod motion;
pub mod publisher;
pub mod shutdown;
pub mod subscriber;
pub mod transport;
pub mod udp;

pub use config::{PublisherSection, ShapesConfig, SubscriberSection};
pub use display::{DisplaySink, RecordingSink, RollingLog, ShapeColor, TerminalSink};
pub use error::{ConfigError, SessionError, TransportError};
pub use lifecycle::{InstanceTracker, WriterId};
pub use memory::{InMemoryReader, InMemoryTransport, InMemoryWriter};
pub use model::{
    InstanceHandle, InstanceState, Sample, SampleInfo, SampleState, ShapeFillKind, ShapeRecord,
    Topic,
};
pub use motion::{Bounds, ShapeMotion};
pub use publisher::{PublisherConfig, PublisherReport, PublisherSession};
pub use shutdown::{ShutdownToken, StopReason};
pub use subscriber::{classify, SampleEvent, SubscriberConfig, SubscriberReport, SubscriberSession};
pub use transport::{ShapeReader, ShapeTransport, ShapeWriter};
pub use udp::{UdpConfig, UdpTransport};
