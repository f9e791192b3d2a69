//! Event Publisher Adapters
//!
//! `EventPublisher` backends: structured log lines, and a bounded in-memory
//! journal for inspection.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::events::DomainEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Writes each event as one structured log line.
///
/// Missing domains and unready agents are operator-relevant and always go
/// out at `warn`; everything else at `info` or `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher {
    verbose: bool,
}

impl LoggingEventPublisher {
    /// Routine events at `debug`
    pub fn new() -> Self {
        Self::default()
    }

    /// Routine events at `info`
    pub fn verbose() -> Self {
        Self { verbose: true }
    }

    fn emit(&self, event: &DomainEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let event_type = event.event_type();
        let org_id = event.org_id();
        let agent = event.agent().unwrap_or("-");

        match event {
            DomainEvent::DomainDataMissing { .. } | DomainEvent::AgentNotReady { .. } => {
                warn!(org_id = %org_id, agent, event_type, event = %json, "platform data event");
            }
            _ if self.verbose => {
                info!(org_id = %org_id, agent, event_type, event = %json, "platform data event");
            }
            _ => {
                debug!(org_id = %org_id, agent, event_type, event = %json, "platform data event");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.emit(&event)
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        events.iter().try_for_each(|event| self.emit(event))
    }
}

/// Bounded journal of the most recent events; the oldest are evicted first.
#[derive(Debug)]
pub struct InMemoryEventCollector {
    capacity: usize,
    events: Mutex<VecDeque<DomainEvent>>,
}

impl Default for InMemoryEventCollector {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl InMemoryEventCollector {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY))),
        }
    }

    fn push(&self, events: impl IntoIterator<Item = DomainEvent>) {
        let mut journal = self.events.lock();
        for event in events {
            if journal.len() == self.capacity {
                journal.pop_front();
            }
            journal.push_back(event);
        }
    }

    /// Retained events, oldest first
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.push([event]);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        self.push(events);
        Ok(())
    }
}
