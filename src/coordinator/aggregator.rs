//! Thread-safe event accumulator for one run
//!
//! Tracks the ready and complete sets independently: an agent can complete
//! without its ready event ever arriving (log stream hiccups), and the two
//! gates must not mask each other.

use crate::types::{Event, EventType};
use std::collections::HashSet;
use std::sync::RwLock;

pub struct Aggregator {
    inner: RwLock<AggregatorState>,
}

struct AggregatorState {
    events: Vec<Event>,
    expected: HashSet<String>,
    ready: HashSet<String>,
    complete: HashSet<String>,
}

impl Aggregator {
    pub fn new(expected_agents: &[String]) -> Self {
        Self {
            inner: RwLock::new(AggregatorState {
                events: Vec::new(),
                expected: expected_agents.iter().cloned().collect(),
                ready: HashSet::new(),
                complete: HashSet::new(),
            }),
        }
    }

    pub fn add_event(&self, event: Event) {
        let mut state = self.inner.write().expect("aggregator lock poisoned");

        let key = event.agent_key().to_string();
        match event.event_type {
            EventType::Ready => {
                state.ready.insert(key);
            }
            EventType::Complete => {
                state.complete.insert(key);
            }
            _ => {}
        }

        state.events.push(event);
    }

    pub fn all_ready(&self) -> bool {
        let state = self.inner.read().expect("aggregator lock poisoned");
        !state.expected.is_empty() && state.expected.iter().all(|a| state.ready.contains(a))
    }

    pub fn all_complete(&self) -> bool {
        let state = self.inner.read().expect("aggregator lock poisoned");
        !state.expected.is_empty() && state.expected.iter().all(|a| state.complete.contains(a))
    }

    /// Snapshot of the full event log in arrival order
    pub fn events(&self) -> Vec<Event> {
        self.inner
            .read()
            .expect("aggregator lock poisoned")
            .events
            .clone()
    }

    pub fn result_events(&self) -> Vec<Event> {
        self.events_of_type(EventType::TestResult)
    }

    pub fn error_events(&self) -> Vec<Event> {
        self.events_of_type(EventType::Error)
    }

    fn events_of_type(&self, event_type: EventType) -> Vec<Event> {
        self.inner
            .read()
            .expect("aggregator lock poisoned")
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.inner.read().expect("aggregator lock poisoned").ready.len()
    }

    pub fn complete_count(&self) -> usize {
        self.inner
            .read()
            .expect("aggregator lock poisoned")
            .complete
            .len()
    }

    pub fn expected_count(&self) -> usize {
        self.inner
            .read()
            .expect("aggregator lock poisoned")
            .expected
            .len()
    }
}
