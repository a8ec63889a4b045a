// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deterministic position generator for the publisher.
//!
//! `x` sweeps one pixel per tick across the drawing area and wraps to just
//! left of it; `y` follows a sine wave centred vertically.

use serde::{Deserialize, Serialize};

/// Sine amplitude in pixels.
pub const AMPLITUDE: f32 = 100.0;

/// Sine frequency in radians per pixel.
pub const FREQUENCY: f32 = 0.0475;

/// Drawing area the shape moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            left: 15,
            top: 15,
            right: 248,
            bottom: 278,
        }
    }
}

impl Bounds {
    /// Vertical centre line of the sine wave.
    pub fn mid_height(&self) -> i32 {
        (self.bottom - self.top) / 2
    }

    /// `x` after a wrap, and before the first tick.
    pub fn wrap_x(&self, shape_size: i32) -> i32 {
        self.left.saturating_sub(shape_size)
    }

    fn y_at(&self, x: i32) -> i32 {
        (self.mid_height() as f32 + AMPLITUDE * (FREQUENCY * x as f32).sin()) as i32
    }
}

/// Stateful horizontal sine sweep.
#[derive(Debug, Clone)]
pub struct ShapeMotion {
    bounds: Bounds,
    shape_size: i32,
    x: i32,
}

impl ShapeMotion {
    pub fn new(bounds: Bounds, shape_size: i32) -> Self {
        Self {
            bounds,
            shape_size,
            x: bounds.wrap_x(shape_size),
        }
    }

    /// Move one tick and return the new position.
    pub fn advance(&mut self) -> (i32, i32) {
        self.x += 1;
        if self.x > self.bounds.right {
            self.x = self.bounds.wrap_x(self.shape_size);
        }
        (self.x, self.bounds.y_at(self.x))
    }

    /// Position emitted at `tick` (0 = first emission) without mutating state.
    pub fn position_at(&self, tick: u64) -> (i32, i32) {
        let start = self.bounds.wrap_x(self.shape_size);
        // One full lap visits every x in [start, right] once; a wrap point
        // right of the bounds pins x there.
        let lap = u64::try_from(i64::from(self.bounds.right) - i64::from(start) + 1)
            .unwrap_or(1)
            .max(1);
        let x = start.saturating_add(((tick + 1) % lap) as i32);
        (x, self.bounds.y_at(x))
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}
