// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Display sinks for the subscriber.
//!
//! The session never draws anything itself; it calls into a [`DisplaySink`].
//! Two sinks ship with the crate:
//!
//! - [`TerminalSink`] -- fixed row per color plus a rolling log, drawn with
//!   ANSI cursor addressing
//! - [`RecordingSink`] -- headless, keeps every call for assertions

use crate::model::ShapeRecord;
use colored::{Color, Colorize};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};

/// Lines kept by the rolling log.
pub const DEFAULT_LOG_DEPTH: usize = 5;

/// First screen row of the rolling log.
pub const LOG_ROW: u16 = 20;

/// Screen column where the record text starts.
pub const DATA_COLUMN: u16 = 10;

/// Rendering target for received shapes and lifecycle messages.
pub trait DisplaySink {
    /// Draw `record` on its color's row, replacing what was there.
    fn render_data(&mut self, record: &ShapeRecord) -> io::Result<()>;

    /// Append a line to the rolling log.
    fn log_line(&mut self, line: &str) -> io::Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn render_data(&mut self, record: &ShapeRecord) -> io::Result<()> {
        (**self).render_data(record)
    }

    fn log_line(&mut self, line: &str) -> io::Result<()> {
        (**self).log_line(line)
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn render_data(&mut self, record: &ShapeRecord) -> io::Result<()> {
        (**self).render_data(record)
    }

    fn log_line(&mut self, line: &str) -> io::Result<()> {
        (**self).log_line(line)
    }
}

/// Fixed-depth FIFO of log lines.
#[derive(Debug, Clone)]
pub struct RollingLog {
    depth: usize,
    lines: VecDeque<String>,
}

impl RollingLog {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            lines: VecDeque::with_capacity(depth),
        }
    }

    /// Append `line`, evicting the oldest when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.depth {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for RollingLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DEPTH)
    }
}

/// Colors the display knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeColor {
    Purple,
    Blue,
    Red,
    Green,
    Yellow,
    Cyan,
    Magenta,
    Orange,
}

impl ShapeColor {
    /// Palette in screen order.
    pub const ALL: [ShapeColor; 8] = [
        Self::Purple,
        Self::Blue,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Cyan,
        Self::Magenta,
        Self::Orange,
    ];

    /// Match a record's color key (exact, upper case).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|color| color.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Purple => "PURPLE",
            Self::Blue => "BLUE",
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Cyan => "CYAN",
            Self::Magenta => "MAGENTA",
            Self::Orange => "ORANGE",
        }
    }

    /// Screen row reserved for this color.
    pub fn row(self) -> u16 {
        let index = Self::ALL
            .iter()
            .position(|color| *color == self)
            .unwrap_or_default();
        index as u16 + 1
    }

    /// Labels drawn in bold.
    pub fn is_bold(self) -> bool {
        matches!(self, Self::Yellow | Self::Orange)
    }

    fn terminal_color(self) -> Color {
        match self {
            Self::Purple => Color::TrueColor {
                r: 128,
                g: 0,
                b: 128,
            },
            Self::Blue => Color::Blue,
            Self::Red => Color::Red,
            Self::Green => Color::Green,
            Self::Yellow => Color::Yellow,
            Self::Cyan => Color::Cyan,
            Self::Magenta => Color::Magenta,
            Self::Orange => Color::TrueColor {
                r: 255,
                g: 165,
                b: 0,
            },
        }
    }
}

impl fmt::Display for ShapeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Headless sink recording every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Every rendered record, in call order.
    pub rendered: Vec<ShapeRecord>,
    /// Every logged line, in call order (unbounded).
    pub logged: Vec<String>,
    /// What a screen would currently show in the log area.
    pub log: RollingLog,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_depth(depth: usize) -> Self {
        Self {
            log: RollingLog::new(depth),
            ..Self::default()
        }
    }

    /// Last record rendered for `color`, if any.
    pub fn last_for(&self, color: &str) -> Option<&ShapeRecord> {
        self.rendered.iter().rev().find(|record| record.color == color)
    }
}

impl DisplaySink for RecordingSink {
    fn render_data(&mut self, record: &ShapeRecord) -> io::Result<()> {
        self.rendered.push(record.clone());
        Ok(())
    }

    fn log_line(&mut self, line: &str) -> io::Result<()> {
        self.logged.push(line.to_string());
        self.log.push(line);
        Ok(())
    }
}

/// Cursor-addressed terminal display.
pub struct TerminalSink<W: Write> {
    out: W,
    log: RollingLog,
}

impl<W: Write> TerminalSink<W> {
    /// Take over `out`: clear the screen and hide the cursor.
    pub fn new(out: W, log_depth: usize) -> io::Result<Self> {
        let mut sink = Self {
            out,
            log: RollingLog::new(log_depth),
        };
        write!(sink.out, "\x1b[2J\x1b[H\x1b[?25l")?;
        sink.out.flush()?;
        Ok(sink)
    }

    fn move_to(&mut self, row: u16, column: u16) -> io::Result<()> {
        // ANSI positions are 1-based.
        write!(self.out, "\x1b[{};{}H", row + 1, column + 1)
    }

    fn redraw_log(&mut self) -> io::Result<()> {
        let lines: Vec<String> = self.log.lines().map(str::to_string).collect();
        for (offset, line) in lines.iter().enumerate() {
            self.move_to(LOG_ROW + offset as u16, 0)?;
            write!(self.out, "{line}\x1b[K")?;
        }
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn render_data(&mut self, record: &ShapeRecord) -> io::Result<()> {
        let Some(color) = ShapeColor::from_name(&record.color) else {
            tracing::trace!(color = %record.color, "no screen row for color");
            return Ok(());
        };

        let mut label = color.name().color(color.terminal_color());
        if color.is_bold() {
            label = label.bold();
        }

        self.move_to(color.row(), 0)?;
        write!(self.out, "{label}")?;
        self.move_to(color.row(), DATA_COLUMN)?;
        write!(self.out, "{record}\x1b[K")?;
        self.out.flush()
    }

    fn log_line(&mut self, line: &str) -> io::Result<()> {
        self.log.push(line);
        self.redraw_log()
    }
}

impl<W: Write> Drop for TerminalSink<W> {
    fn drop(&mut self) {
        let below = LOG_ROW + self.log.depth() as u16;
        let _ = self
            .move_to(below, 0)
            .and_then(|()| write!(self.out, "\x1b[?25h"))
            .and_then(|()| self.out.flush());
    }
}
