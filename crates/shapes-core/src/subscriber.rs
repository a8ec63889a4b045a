// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber session
//!
//! Waits for data with a bounded timeout, drains everything the reader holds
//! on each wake-up and dispatches every entry to a [`DisplaySink`]: valid
//! samples are rendered, metadata-only entries become log lines.

use crate::display::DisplaySink;
use crate::error::SessionError;
use crate::model::{InstanceState, Sample, SampleState, ShapeRecord};
use crate::shutdown::{ShutdownToken, StopReason};
use crate::transport::ShapeReader;
use std::fmt;
use std::time::Duration;

/// Default bound on a single wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Subscriber session settings.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Topic name the reader is created on.
    pub topic: String,
    /// Stop once this many valid samples were displayed (`None` = until shutdown).
    pub sample_count: Option<u64>,
    pub wait_timeout: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            topic: crate::model::DEFAULT_TOPIC.to_string(),
            sample_count: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// What a drained entry means for the display.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// New revision of an instance.
    Data(ShapeRecord),
    /// First report that every writer of `key` is gone.
    DroppedFromBus { key: String },
    /// Any other lifecycle transition.
    StateChanged { key: String, state: InstanceState },
}

impl fmt::Display for SampleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(record) => write!(f, "{} {}", record.color, record),
            Self::DroppedFromBus { key } => {
                write!(f, "Instance with key {key} has dropped from the databus")
            }
            Self::StateChanged { key, state } => {
                write!(f, "Instance with key {key} changed to {state}")
            }
        }
    }
}

/// Classify one drained entry.
///
/// `key` is the resolved instance key; it is only consulted for metadata-only
/// entries.
pub fn classify(sample: &Sample, key: &str) -> SampleEvent {
    if let (true, Some(record)) = (sample.info.valid_data, &sample.data) {
        return SampleEvent::Data(record.clone());
    }

    let key = key.to_string();
    match (sample.info.instance_state, sample.info.sample_state) {
        (InstanceState::NotAliveNoWriters, SampleState::NotRead) => {
            SampleEvent::DroppedFromBus { key }
        }
        (state, _) => SampleEvent::StateChanged { key, state },
    }
}

/// Outcome of a completed subscriber run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberReport {
    /// Valid data samples displayed.
    pub samples_read: u64,
    /// Metadata-only entries logged.
    pub lifecycle_events: u64,
    pub stop_reason: StopReason,
}

/// Wait/drain/dispatch loop over one reader.
pub struct SubscriberSession<S: DisplaySink> {
    reader: Box<dyn ShapeReader>,
    sink: S,
    config: SubscriberConfig,
    shutdown: ShutdownToken,
    samples_read: u64,
    lifecycle_events: u64,
}

impl<S: DisplaySink> SubscriberSession<S> {
    pub fn new(
        reader: Box<dyn ShapeReader>,
        sink: S,
        config: SubscriberConfig,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            reader,
            sink,
            config,
            shutdown,
            samples_read: 0,
            lifecycle_events: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Valid samples displayed so far.
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Drain the reader once and dispatch every entry.
    ///
    /// Returns the number of valid data samples in the batch.
    pub fn process_available(&mut self) -> Result<u64, SessionError> {
        let samples = self.reader.take()?;
        let mut count = 0;

        for sample in &samples {
            let key = if sample.is_valid() {
                None
            } else {
                Some(self.reader.key_value(sample.info.instance_handle)?)
            };

            match classify(sample, key.as_deref().unwrap_or_default()) {
                SampleEvent::Data(record) => {
                    count += 1;
                    self.sink.render_data(&record).map_err(SessionError::Display)?;
                }
                event => {
                    tracing::debug!(
                        %event,
                        handle = %sample.info.instance_handle,
                        "lifecycle entry"
                    );
                    self.lifecycle_events += 1;
                    self.sink
                        .log_line(&event.to_string())
                        .map_err(SessionError::Display)?;
                }
            }
        }

        self.samples_read += count;
        Ok(count)
    }

    fn budget_reached(&self) -> bool {
        self.config
            .sample_count
            .is_some_and(|limit| self.samples_read >= limit)
    }

    /// Run until the sample count is reached or shutdown is requested.
    pub fn run(&mut self) -> Result<SubscriberReport, SessionError> {
        tracing::info!(
            topic = %self.reader.topic().name,
            sample_count = ?self.config.sample_count,
            "Subscriber started"
        );

        let stop_reason = loop {
            if self.shutdown.is_triggered() {
                break StopReason::ShutdownRequested;
            }
            if self.budget_reached() {
                break StopReason::BudgetReached;
            }

            if self.reader.wait_for_data(self.config.wait_timeout)? {
                let count = self.process_available()?;
                tracing::trace!(count, total = self.samples_read, "batch dispatched");
            }
        };

        tracing::info!(
            samples_read = self.samples_read,
            lifecycle_events = self.lifecycle_events,
            reason = %stop_reason,
            "Subscriber stopped"
        );

        Ok(SubscriberReport {
            samples_read: self.samples_read,
            lifecycle_events: self.lifecycle_events,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingSink;
    use crate::error::TransportError;
    use crate::model::{InstanceHandle, Topic};
    use parking_lot::Mutex;

    /// Reader failing at a chosen call.
    #[derive(Default)]
    struct FailingReader {
        topic: Topic,
        pending: Mutex<Vec<Sample>>,
        fail_wait: bool,
        fail_take: bool,
        fail_key_value: bool,
    }

    impl ShapeReader for FailingReader {
        fn topic(&self) -> &Topic {
            &self.topic
        }

        fn take(&self) -> Result<Vec<Sample>, TransportError> {
            if self.fail_take {
                return Err(TransportError::Closed);
            }
            Ok(std::mem::take(&mut *self.pending.lock()))
        }

        fn read(&self) -> Result<Vec<Sample>, TransportError> {
            Ok(self.pending.lock().clone())
        }

        fn key_value(&self, handle: InstanceHandle) -> Result<String, TransportError> {
            if self.fail_key_value {
                return Err(TransportError::Closed);
            }
            Ok(format!("KEY{}", handle.0))
        }

        fn wait_for_data(&self, _timeout: Duration) -> Result<bool, TransportError> {
            if self.fail_wait {
                return Err(TransportError::Closed);
            }
            Ok(true)
        }
    }

    fn session_over(reader: FailingReader) -> SubscriberSession<RecordingSink> {
        SubscriberSession::new(
            Box::new(reader),
            RecordingSink::new(),
            SubscriberConfig::default(),
            ShutdownToken::new(),
        )
    }

    fn lifecycle(state: InstanceState, sample_state: SampleState) -> Sample {
        let mut sample = Sample::lifecycle(InstanceHandle(4), state);
        sample.info.sample_state = sample_state;
        sample
    }

    #[test]
    fn test_classify_data() {
        let record = ShapeRecord::new("RED", 30);
        let sample = Sample::data(record.clone(), InstanceHandle(1));
        assert_eq!(classify(&sample, ""), SampleEvent::Data(record));
    }

    #[test]
    fn test_classify_first_no_writers_is_dropped() {
        let sample = lifecycle(InstanceState::NotAliveNoWriters, SampleState::NotRead);
        let event = classify(&sample, "GREEN");
        assert_eq!(event, SampleEvent::DroppedFromBus { key: "GREEN".into() });
        assert_eq!(
            event.to_string(),
            "Instance with key GREEN has dropped from the databus"
        );
    }

    #[test]
    fn test_classify_other_transitions_are_state_changes() {
        let read_again = lifecycle(InstanceState::NotAliveNoWriters, SampleState::Read);
        assert_eq!(
            classify(&read_again, "GREEN").to_string(),
            "Instance with key GREEN changed to NOT_ALIVE_NO_WRITERS"
        );

        let disposed = lifecycle(InstanceState::NotAliveDisposed, SampleState::NotRead);
        assert_eq!(
            classify(&disposed, "RED"),
            SampleEvent::StateChanged {
                key: "RED".into(),
                state: InstanceState::NotAliveDisposed
            }
        );
        assert_eq!(
            classify(&disposed, "RED").to_string(),
            "Instance with key RED changed to NOT_ALIVE_DISPOSED"
        );
    }

    #[test]
    fn test_invalid_flag_wins_over_payload() {
        let mut sample = Sample::data(ShapeRecord::new("RED", 30), InstanceHandle(2));
        sample.info.valid_data = false;
        sample.info.instance_state = InstanceState::NotAliveDisposed;
        assert!(matches!(
            classify(&sample, "RED"),
            SampleEvent::StateChanged { .. }
        ));
    }

    #[test]
    fn test_session_sink_accessors() {
        let transport = crate::memory::InMemoryTransport::new(0).unwrap();
        let reader = transport.reader(&crate::model::Topic::default());
        let mut session = SubscriberSession::new(
            Box::new(reader),
            RecordingSink::new(),
            SubscriberConfig::default(),
            ShutdownToken::new(),
        );
        assert_eq!(session.process_available().unwrap(), 0);
        assert_eq!(session.samples_read(), 0);
        assert!(session.sink().rendered.is_empty());
        assert!(session.into_sink().logged.is_empty());
    }

    #[test]
    fn test_wait_error_ends_run() {
        let mut session = session_over(FailingReader {
            fail_wait: true,
            ..FailingReader::default()
        });

        let err = session.run().unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert!(session.sink().rendered.is_empty());
        assert!(session.sink().logged.is_empty());
    }

    #[test]
    fn test_take_error_ends_run() {
        let reader = FailingReader {
            fail_take: true,
            ..FailingReader::default()
        };
        reader
            .pending
            .lock()
            .push(Sample::data(ShapeRecord::new("RED", 30), InstanceHandle(1)));
        let mut session = session_over(reader);

        let err = session.run().unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert_eq!(session.samples_read(), 0);
        assert!(session.sink().rendered.is_empty());
        assert!(session.sink().logged.is_empty());
    }

    #[test]
    fn test_key_value_error_on_lifecycle_entry() {
        let reader = FailingReader {
            fail_key_value: true,
            ..FailingReader::default()
        };
        reader
            .pending
            .lock()
            .push(Sample::lifecycle(InstanceHandle(3), InstanceState::NotAliveDisposed));
        let mut session = session_over(reader);

        let err = session.process_available().unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert!(session.sink().logged.is_empty());

        // Data entries never need the key.
        let reader = FailingReader {
            fail_key_value: true,
            ..FailingReader::default()
        };
        reader
            .pending
            .lock()
            .push(Sample::data(ShapeRecord::new("BLUE", 30), InstanceHandle(1)));
        let mut session = session_over(reader);
        assert_eq!(session.process_available().unwrap(), 1);
        assert_eq!(session.sink().rendered.len(), 1);
    }
}
