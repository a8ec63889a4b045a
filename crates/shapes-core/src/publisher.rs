// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher session
//!
//! Owns one shape instance, moves it along a sine sweep and writes it once per
//! period until the sample count is reached or shutdown is requested, then
//! disposes the instance so readers see `NOT_ALIVE_DISPOSED` rather than
//! `NOT_ALIVE_NO_WRITERS`.

use crate::error::SessionError;
use crate::model::ShapeRecord;
use crate::motion::{Bounds, ShapeMotion};
use crate::shutdown::{ShutdownToken, StopReason};
use crate::transport::ShapeWriter;
use std::time::Duration;

/// Default shape size in pixels.
pub const DEFAULT_SHAPE_SIZE: i32 = 30;

/// Default pause between two writes.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Publisher session settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Topic name the writer is created on.
    pub topic: String,
    /// Instance key.
    pub color: String,
    /// Stop after this many writes (`None` = until shutdown).
    pub sample_count: Option<u64>,
    pub period: Duration,
    pub shape_size: i32,
    pub bounds: Bounds,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: crate::model::DEFAULT_TOPIC.to_string(),
            color: "BLUE".to_string(),
            sample_count: None,
            period: DEFAULT_PERIOD,
            shape_size: DEFAULT_SHAPE_SIZE,
            bounds: Bounds::default(),
        }
    }
}

/// Outcome of a completed publisher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherReport {
    pub samples_written: u64,
    pub stop_reason: StopReason,
    /// Position of the last write, `None` if nothing was written.
    pub last_position: Option<(i32, i32)>,
}

/// Timed write loop over a single instance.
pub struct PublisherSession {
    writer: Box<dyn ShapeWriter>,
    config: PublisherConfig,
    shutdown: ShutdownToken,
    motion: ShapeMotion,
}

impl PublisherSession {
    pub fn new(
        writer: Box<dyn ShapeWriter>,
        config: PublisherConfig,
        shutdown: ShutdownToken,
    ) -> Self {
        let motion = ShapeMotion::new(config.bounds, config.shape_size);
        Self {
            writer,
            config,
            shutdown,
            motion,
        }
    }

    fn budget_reached(&self, written: u64) -> bool {
        self.config.sample_count.is_some_and(|limit| written >= limit)
    }

    /// Run to completion.
    ///
    /// A transport error aborts immediately without disposing; the writer is
    /// dropped and readers see the instance lose its writer instead.
    pub fn run(mut self) -> Result<PublisherReport, SessionError> {
        let mut record = ShapeRecord::new(self.config.color.as_str(), self.config.shape_size);
        let handle = self.writer.register_instance(&record)?;
        let shape = self.writer.topic().name.to_lowercase();

        tracing::info!(
            topic = %self.writer.topic().name,
            color = %self.config.color,
            sample_count = ?self.config.sample_count,
            "Publisher started"
        );

        let mut written = 0u64;
        let mut last_position = None;
        let stop_reason = loop {
            if self.shutdown.is_triggered() {
                break StopReason::ShutdownRequested;
            }
            if self.budget_reached(written) {
                break StopReason::BudgetReached;
            }

            let (x, y) = self.motion.advance();
            record.x = x;
            record.y = y;

            tracing::info!(
                color = %record.color,
                x,
                y,
                count = written,
                "Writing a {} {} at ({},{}), count: {}",
                record.color,
                shape,
                x,
                y,
                written
            );
            self.writer.write(&record)?;
            written += 1;
            last_position = Some((x, y));

            if self.budget_reached(written) {
                break StopReason::BudgetReached;
            }
            if self.shutdown.sleep(self.config.period) {
                break StopReason::ShutdownRequested;
            }
        };

        self.writer.dispose_instance(handle)?;
        tracing::info!(
            color = %record.color,
            samples_written = written,
            reason = %stop_reason,
            "Publisher stopped, instance disposed"
        );

        Ok(PublisherReport {
            samples_written: written,
            stop_reason,
            last_position,
        })
    }
}
