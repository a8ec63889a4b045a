// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shape data model shared by publishers and subscribers.
//!
//! `ShapeRecord` is keyed by `color`: every record carrying the same color is a
//! revision of the same logical instance. Instance and sample states follow the
//! DDS naming (`ALIVE`, `NOT_ALIVE_DISPOSED`, ...) so log lines read the same as
//! on any other shapes demo.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default topic name used by the shapes demo.
pub const DEFAULT_TOPIC: &str = "Square";

/// Type name registered for [`ShapeRecord`].
pub const SHAPE_TYPE_NAME: &str = "ShapeTypeExtended";

/// Fill pattern hint for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeFillKind {
    #[default]
    Solid,
    Transparent,
    HorizontalHatch,
    VerticalHatch,
}

impl fmt::Display for ShapeFillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Solid => "SOLID_FILL",
            Self::Transparent => "TRANSPARENT_FILL",
            Self::HorizontalHatch => "HORIZONTAL_HATCH_FILL",
            Self::VerticalHatch => "VERTICAL_HATCH_FILL",
        };
        f.write_str(name)
    }
}

/// One revision of a shape instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// Instance key.
    pub color: String,
    pub x: i32,
    pub y: i32,
    pub shape_size: i32,
    pub fill_kind: ShapeFillKind,
    /// Rotation in degrees. Carried through, never animated.
    #[serde(default)]
    pub angle: f32,
}

impl ShapeRecord {
    /// Create a record at the origin with the given color and size.
    pub fn new(color: impl Into<String>, shape_size: i32) -> Self {
        Self {
            color: color.into(),
            x: 0,
            y: 0,
            shape_size,
            fill_kind: ShapeFillKind::Solid,
            angle: 0.0,
        }
    }

    /// Key value identifying the instance this record belongs to.
    pub fn key(&self) -> &str {
        &self.color
    }
}

impl fmt::Display for ShapeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x: {}, y: {}, size: {}, fill: {}, angle: {}",
            self.x, self.y, self.shape_size, self.fill_kind, self.angle
        )
    }
}

/// Lifecycle state of an instance as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Alive,
    /// Explicitly retired by its writer.
    NotAliveDisposed,
    /// Every writer of the instance went away without disposing it.
    NotAliveNoWriters,
}

impl InstanceState {
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alive => "ALIVE",
            Self::NotAliveDisposed => "NOT_ALIVE_DISPOSED",
            Self::NotAliveNoWriters => "NOT_ALIVE_NO_WRITERS",
        };
        f.write_str(name)
    }
}

/// Sample state per DDS (NOT_READ vs READ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleState {
    /// Sample has not been accessed yet.
    NotRead,
    /// Sample has been accessed via `read()`.
    Read,
}

impl fmt::Display for SampleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRead => f.write_str("NOT_READ"),
            Self::Read => f.write_str("READ"),
        }
    }
}

/// Endpoint-local instance identifier.
///
/// Handles are assigned by the reader (or writer) that first sees a key and are
/// only meaningful to that endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct InstanceHandle(pub u64);

impl InstanceHandle {
    /// The nil handle, never assigned to an instance.
    pub const NIL: InstanceHandle = InstanceHandle(0);

    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata accompanying every entry returned by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// `false` for metadata-only entries announcing a lifecycle transition.
    pub valid_data: bool,
    pub instance_state: InstanceState,
    pub sample_state: SampleState,
    pub instance_handle: InstanceHandle,
}

/// A data sample or a metadata-only lifecycle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub data: Option<ShapeRecord>,
    pub info: SampleInfo,
}

impl Sample {
    /// Build a valid data sample for an alive instance.
    pub fn data(record: ShapeRecord, handle: InstanceHandle) -> Self {
        Self {
            data: Some(record),
            info: SampleInfo {
                valid_data: true,
                instance_state: InstanceState::Alive,
                sample_state: SampleState::NotRead,
                instance_handle: handle,
            },
        }
    }

    /// Build a metadata-only entry announcing `state` for `handle`.
    pub fn lifecycle(handle: InstanceHandle, state: InstanceState) -> Self {
        Self {
            data: None,
            info: SampleInfo {
                valid_data: false,
                instance_state: state,
                sample_state: SampleState::NotRead,
                instance_handle: handle,
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.info.valid_data && self.data.is_some()
    }
}

/// Named, typed topic both sessions bind to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub name: String,
    pub type_name: String,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: SHAPE_TYPE_NAME.to_string(),
        }
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC)
    }
}
