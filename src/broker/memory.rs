//! In-process broker
//!
//! Every topic is an append-only log. Each (group, topic) pair owns one
//! committed offset shared by all streams of that group, so a message is
//! delivered once per group and a restarted consumer resumes where the
//! previous one stopped.
//!
//! Appends drop the entries every known group has already committed, so the
//! log only holds what some group still has to read. A group seen for the
//! first time starts at the earliest retained entry. A group that never
//! consumes pins the log from its offset onward. `MemoryBroker::with_history`
//! turns compaction off for callers that want to inspect everything sent.

use super::{Broker, BrokerError, BrokerResult, ConsumerSession, MessageStream, ProducerSession};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Retained entries, `base` being the absolute offset of the first one
#[derive(Default)]
struct LogState {
    base: usize,
    entries: VecDeque<Bytes>,
}

impl LogState {
    fn end(&self) -> usize {
        self.base + self.entries.len()
    }
}

/// One topic's log, its group offsets and its change notifier
struct TopicLog {
    state: RwLock<LogState>,
    groups: Mutex<HashMap<String, Arc<AtomicUsize>>>,
    appended: watch::Sender<usize>,
    keep_history: bool,
}

impl TopicLog {
    fn new(keep_history: bool) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            state: RwLock::new(LogState::default()),
            groups: Mutex::new(HashMap::new()),
            appended,
            keep_history,
        }
    }

    fn append(&self, payload: Bytes) {
        let end = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.entries.push_back(payload);
            if !self.keep_history {
                let floor = self
                    .groups
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .map(|offset| offset.load(Ordering::SeqCst))
                    .min();
                if let Some(floor) = floor {
                    while state.base < floor && state.entries.pop_front().is_some() {
                        state.base += 1;
                    }
                }
            }
            state.end()
        };
        self.appended.send_replace(end);
    }

    /// Committed offset of a group, created at the earliest retained entry
    fn group(&self, group_id: &str) -> Arc<AtomicUsize> {
        // Lock order is state then groups, same as `append`
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(state.base)))
            .clone()
    }
}

#[derive(Default)]
struct Shared {
    topics: Mutex<HashMap<String, Arc<TopicLog>>>,
    unavailable: AtomicBool,
    keep_history: bool,
}

impl Shared {
    fn topic(&self, topic: &str) -> Arc<TopicLog> {
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicLog::new(self.keep_history)))
            .clone()
    }

    fn check_available(&self) -> BrokerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("memory broker offline".to_string()));
        }
        Ok(())
    }
}

/// Broker that keeps every topic in memory
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker whose topics never drop consumed entries
    pub fn with_history() -> Self {
        Self {
            shared: Arc::new(Shared {
                keep_history: true,
                ..Shared::default()
            }),
        }
    }

    /// Appends a payload to a topic without opening a session
    pub fn publish(&self, topic: &str, payload: Bytes) {
        self.shared.topic(topic).append(payload);
    }

    /// Returns the payloads a topic still retains, in order
    pub fn messages(&self, topic: &str) -> Vec<Bytes> {
        self.shared
            .topic(topic)
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .cloned()
            .collect()
    }

    /// Toggles whether new sessions and sends succeed
    pub fn set_available(&self, available: bool) {
        self.shared.unavailable.store(!available, Ordering::SeqCst);
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect_producer(&self) -> BrokerResult<Arc<dyn ProducerSession>> {
        self.shared.check_available()?;
        Ok(Arc::new(MemoryProducer {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn connect_consumer(&self, group_id: &str) -> BrokerResult<Box<dyn ConsumerSession>> {
        self.shared.check_available()?;
        Ok(Box::new(MemoryConsumer {
            shared: self.shared.clone(),
            group_id: group_id.to_string(),
            shutdown: CancellationToken::new(),
        }))
    }
}

struct MemoryProducer {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

#[async_trait]
impl ProducerSession for MemoryProducer {
    async fn send(&self, topic: &str, payload: Bytes) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        self.shared.check_available()?;
        self.shared.topic(topic).append(payload);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MemoryConsumer {
    shared: Arc<Shared>,
    group_id: String,
    shutdown: CancellationToken,
}

#[async_trait]
impl ConsumerSession for MemoryConsumer {
    async fn create_streams(
        &self,
        topic: &str,
        count: usize,
    ) -> BrokerResult<Vec<Box<dyn MessageStream>>> {
        if self.shutdown.is_cancelled() {
            return Err(BrokerError::Closed);
        }
        self.shared.check_available()?;

        let log = self.shared.topic(topic);
        let offset = log.group(&self.group_id);

        Ok((0..count)
            .map(|_| {
                Box::new(MemoryStream {
                    changes: log.appended.subscribe(),
                    log: log.clone(),
                    offset: offset.clone(),
                    shutdown: self.shutdown.child_token(),
                }) as Box<dyn MessageStream>
            })
            .collect())
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct MemoryStream {
    log: Arc<TopicLog>,
    offset: Arc<AtomicUsize>,
    changes: watch::Receiver<usize>,
    shutdown: CancellationToken,
}

impl MemoryStream {
    /// Claims the message at the group's offset, if one is available
    fn claim(&self) -> Option<Bytes> {
        let state = self.log.state.read().unwrap_or_else(|e| e.into_inner());
        loop {
            let current = self.offset.load(Ordering::SeqCst);
            if current >= state.end() {
                return None;
            }
            if self
                .offset
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return state.entries.get(current - state.base).cloned();
            }
        }
    }
}

#[async_trait]
impl MessageStream for MemoryStream {
    async fn next_message(&mut self) -> Option<Bytes> {
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }

            // Mark the current length seen before looking, so an append
            // racing with the claim still wakes us
            self.changes.borrow_and_update();
            if let Some(payload) = self.claim() {
                return Some(payload);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}
