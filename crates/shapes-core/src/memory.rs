// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory transport
//!
//! A process-local bus implementing the transport traits. Every reader gets
//! its own queue and [`InstanceTracker`]; writers fan samples out to all
//! readers of the same topic. Durability is volatile: readers only see what is
//! written after they were created.

use crate::error::TransportError;
use crate::lifecycle::{InstanceTracker, WriterId, WriterRegistry};
use crate::model::{InstanceHandle, Sample, SampleState, ShapeRecord, Topic};
use crate::transport::{validate_domain_id, ShapeReader, ShapeTransport, ShapeWriter};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Process-local transport. Clones share the same bus.
#[derive(Clone)]
pub struct InMemoryTransport {
    bus: Arc<Bus>,
}

struct Bus {
    domain_id: u32,
    state: Mutex<BusState>,
}

#[derive(Default)]
struct BusState {
    next_writer: u64,
    readers: Vec<Weak<ReaderQueue>>,
    fail_next_write: bool,
}

struct ReaderQueue {
    topic: Topic,
    inner: Mutex<ReaderInner>,
    available: Condvar,
}

#[derive(Default)]
struct ReaderInner {
    entries: VecDeque<Sample>,
    tracker: InstanceTracker,
}

impl Bus {
    /// Live readers matching `topic`. Dropped readers are pruned on the way.
    fn matched_readers(&self, topic: &Topic) -> Vec<Arc<ReaderQueue>> {
        let mut state = self.state.lock();
        state.readers.retain(|weak| weak.strong_count() > 0);
        state
            .readers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|queue| queue.topic.name == topic.name)
            .collect()
    }
}

impl InMemoryTransport {
    /// Create a bus for `domain_id`.
    pub fn new(domain_id: u32) -> Result<Self, TransportError> {
        let domain_id = validate_domain_id(domain_id)?;
        Ok(Self {
            bus: Arc::new(Bus {
                domain_id,
                state: Mutex::new(BusState::default()),
            }),
        })
    }

    /// Make the next `write` on any writer of this bus fail with
    /// [`TransportError::Closed`].
    pub fn fail_next_write(&self) {
        self.bus.state.lock().fail_next_write = true;
    }

    /// Number of live readers on `topic`.
    pub fn reader_count(&self, topic: &Topic) -> usize {
        self.bus.matched_readers(topic).len()
    }

    /// Concrete writer, for callers that want the typed handle.
    pub fn writer(&self, topic: &Topic) -> InMemoryWriter {
        let id = {
            let mut state = self.bus.state.lock();
            state.next_writer += 1;
            WriterId(state.next_writer)
        };
        tracing::debug!(topic = %topic.name, writer = %id, "in-memory writer created");
        InMemoryWriter {
            bus: Arc::clone(&self.bus),
            topic: topic.clone(),
            id,
            registered: Mutex::new(WriterRegistry::default()),
        }
    }

    /// Concrete reader, for callers that want the typed handle.
    pub fn reader(&self, topic: &Topic) -> InMemoryReader {
        let queue = Arc::new(ReaderQueue {
            topic: topic.clone(),
            inner: Mutex::new(ReaderInner::default()),
            available: Condvar::new(),
        });
        self.bus.state.lock().readers.push(Arc::downgrade(&queue));
        tracing::debug!(topic = %topic.name, "in-memory reader created");
        InMemoryReader { queue }
    }
}

impl ShapeTransport for InMemoryTransport {
    fn domain_id(&self) -> u32 {
        self.bus.domain_id
    }

    fn create_writer(&self, topic: &Topic) -> Result<Box<dyn ShapeWriter>, TransportError> {
        Ok(Box::new(self.writer(topic)))
    }

    fn create_reader(&self, topic: &Topic) -> Result<Box<dyn ShapeReader>, TransportError> {
        Ok(Box::new(self.reader(topic)))
    }
}

/// Writer on an [`InMemoryTransport`].
pub struct InMemoryWriter {
    bus: Arc<Bus>,
    topic: Topic,
    id: WriterId,
    registered: Mutex<WriterRegistry>,
}

impl InMemoryWriter {
    pub fn id(&self) -> WriterId {
        self.id
    }
}

impl ShapeWriter for InMemoryWriter {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn register_instance(&self, record: &ShapeRecord) -> Result<InstanceHandle, TransportError> {
        Ok(self.registered.lock().register(record.key()))
    }

    fn write(&self, record: &ShapeRecord) -> Result<(), TransportError> {
        {
            let mut state = self.bus.state.lock();
            if state.fail_next_write {
                state.fail_next_write = false;
                return Err(TransportError::Closed);
            }
        }
        self.registered.lock().register(record.key());

        for queue in self.bus.matched_readers(&self.topic) {
            let mut inner = queue.inner.lock();
            let handle = inner.tracker.on_data(record.key(), self.id);
            inner.entries.push_back(Sample::data(record.clone(), handle));
            queue.available.notify_all();
        }
        Ok(())
    }

    fn dispose_instance(&self, handle: InstanceHandle) -> Result<(), TransportError> {
        let key = self
            .registered
            .lock()
            .key_of(handle)
            .ok_or(TransportError::UnknownInstance(handle))?;

        for queue in self.bus.matched_readers(&self.topic) {
            let mut inner = queue.inner.lock();
            if let Some((reader_handle, state)) = inner.tracker.on_dispose(&key, self.id) {
                inner.entries.push_back(Sample::lifecycle(reader_handle, state));
                queue.available.notify_all();
            }
        }
        tracing::debug!(key = %key, writer = %self.id, "instance disposed");
        Ok(())
    }
}

impl Drop for InMemoryWriter {
    fn drop(&mut self) {
        for queue in self.bus.matched_readers(&self.topic) {
            let mut inner = queue.inner.lock();
            let lost = inner.tracker.on_writer_lost(self.id);
            if lost.is_empty() {
                continue;
            }
            for (handle, state) in lost {
                inner.entries.push_back(Sample::lifecycle(handle, state));
            }
            queue.available.notify_all();
        }
    }
}

/// Reader on an [`InMemoryTransport`].
pub struct InMemoryReader {
    queue: Arc<ReaderQueue>,
}

impl InMemoryReader {
    /// Number of entries currently buffered.
    pub fn pending(&self) -> usize {
        self.queue.inner.lock().entries.len()
    }
}

impl ShapeReader for InMemoryReader {
    fn topic(&self) -> &Topic {
        &self.queue.topic
    }

    fn take(&self) -> Result<Vec<Sample>, TransportError> {
        let mut inner = self.queue.inner.lock();
        Ok(inner.entries.drain(..).collect())
    }

    fn read(&self) -> Result<Vec<Sample>, TransportError> {
        let mut inner = self.queue.inner.lock();
        let mut samples = Vec::with_capacity(inner.entries.len());
        for entry in inner.entries.iter_mut() {
            samples.push(entry.clone());
            entry.info.sample_state = SampleState::Read;
        }
        Ok(samples)
    }

    fn key_value(&self, handle: InstanceHandle) -> Result<String, TransportError> {
        self.queue
            .inner
            .lock()
            .tracker
            .key_value(handle)
            .map(str::to_string)
            .ok_or(TransportError::UnknownInstance(handle))
    }

    fn wait_for_data(&self, timeout: Duration) -> Result<bool, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.queue.inner.lock();
        while inner.entries.is_empty() {
            if self
                .queue
                .available
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                break;
            }
        }
        Ok(!inner.entries.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceState;

    fn record(color: &str, x: i32) -> ShapeRecord {
        let mut record = ShapeRecord::new(color, 30);
        record.x = x;
        record
    }

    #[test]
    fn test_write_reaches_every_reader_on_topic() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let r1 = transport.reader(&topic);
        let r2 = transport.reader(&topic);
        let other = transport.reader(&Topic::new("Circle"));
        let writer = transport.writer(&topic);

        writer.write(&record("RED", 1)).unwrap();

        assert_eq!(r1.take().unwrap().len(), 1);
        assert_eq!(r2.take().unwrap().len(), 1);
        assert!(other.take().unwrap().is_empty());
    }

    #[test]
    fn test_take_drains_everything() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        let writer = transport.writer(&topic);

        for x in 0..4 {
            writer.write(&record("RED", x)).unwrap();
        }

        assert_eq!(reader.take().unwrap().len(), 4);
        assert_eq!(reader.pending(), 0);
        assert!(reader.take().unwrap().is_empty());
    }

    #[test]
    fn test_read_marks_samples_read() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        let writer = transport.writer(&topic);
        writer.write(&record("RED", 1)).unwrap();

        let first = reader.read().unwrap();
        assert_eq!(first[0].info.sample_state, SampleState::NotRead);

        let taken = reader.take().unwrap();
        assert_eq!(taken[0].info.sample_state, SampleState::Read);
    }

    #[test]
    fn test_dispose_produces_lifecycle_entry() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        let writer = transport.writer(&topic);

        let handle = writer.register_instance(&record("RED", 0)).unwrap();
        writer.write(&record("RED", 1)).unwrap();
        writer.dispose_instance(handle).unwrap();

        let samples = reader.take().unwrap();
        assert_eq!(samples.len(), 2);
        let meta = &samples[1];
        assert!(!meta.is_valid());
        assert_eq!(meta.info.instance_state, InstanceState::NotAliveDisposed);
        assert_eq!(reader.key_value(meta.info.instance_handle).unwrap(), "RED");
    }

    #[test]
    fn test_dispose_unknown_handle_fails() {
        let transport = InMemoryTransport::new(0).unwrap();
        let writer = transport.writer(&Topic::default());
        assert!(matches!(
            writer.dispose_instance(InstanceHandle(99)),
            Err(TransportError::UnknownInstance(InstanceHandle(99)))
        ));
    }

    #[test]
    fn test_writer_drop_reports_no_writers() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        {
            let writer = transport.writer(&topic);
            writer.write(&record("GREEN", 1)).unwrap();
        }

        let samples = reader.take().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(
            samples[1].info.instance_state,
            InstanceState::NotAliveNoWriters
        );
    }

    #[test]
    fn test_late_reader_misses_earlier_samples() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let writer = transport.writer(&topic);
        writer.write(&record("RED", 1)).unwrap();

        let reader = transport.reader(&topic);
        assert!(!reader.wait_for_data(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_wait_wakes_on_write_from_other_thread() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        let writer = transport.writer(&topic);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.write(&record("RED", 1)).unwrap();
        });

        assert!(reader.wait_for_data(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
    }

    #[test]
    fn test_fail_next_write() {
        let transport = InMemoryTransport::new(0).unwrap();
        let writer = transport.writer(&Topic::default());
        transport.fail_next_write();

        assert!(matches!(
            writer.write(&record("RED", 1)),
            Err(TransportError::Closed)
        ));
        assert!(writer.write(&record("RED", 1)).is_ok());
    }

    #[test]
    fn test_dropped_readers_are_pruned() {
        let transport = InMemoryTransport::new(0).unwrap();
        let topic = Topic::default();
        let reader = transport.reader(&topic);
        assert_eq!(transport.reader_count(&topic), 1);
        drop(reader);
        assert_eq!(transport.reader_count(&topic), 0);
    }

    #[test]
    fn test_invalid_domain() {
        assert!(InMemoryTransport::new(233).is_err());
    }
}
