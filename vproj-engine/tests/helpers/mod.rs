//! Test Helper Utilities
//!
//! In-memory doubles for the remote services. Every double records the calls
//! it receives so tests can assert on call counts and arguments.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vproj_common::{LogBroadcaster, LogEntry};
use vproj_engine::models::{GlobalAttributeSchema, Ratings};
use vproj_engine::services::{
    AttributeService, DomainStream, DomainStreamSource, ImageService, RemoteServices,
    ServiceError, StreamChunk, StreamError,
};

/// Ordered log of stream and service events shared between doubles
///
/// Streams record `chunk:<index>` as each chunk is handed out and `end` on
/// `Done`. The attribute double records `schema` and `rate:<member>`.
#[derive(Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of `event`, panicking if it never happened
    pub fn position(&self, event: &str) -> usize {
        let events = self.events();
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{} missing from {:?}", event, events))
    }
}

/// One scripted stream event
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(String),
    Fail(String),
}

/// Replays a fixed script of chunks, then `Done`
pub struct ScriptedStreamSource {
    steps: Vec<Step>,
    open_error: Option<String>,
    timeline: Timeline,
    pub opened: Mutex<Vec<(String, String)>>,
}

impl ScriptedStreamSource {
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::steps(chunks.iter().map(|c| Step::Chunk(c.to_string())).collect())
    }

    pub fn steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            open_error: None,
            timeline: Timeline::default(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing(reason: &str) -> Self {
        Self {
            steps: Vec::new(),
            open_error: Some(reason.to_string()),
            timeline: Timeline::default(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }
}

struct ScriptedStream {
    steps: VecDeque<Step>,
    timeline: Timeline,
    served: usize,
}

#[async_trait]
impl DomainStream for ScriptedStream {
    async fn next_chunk(&mut self) -> Result<StreamChunk, StreamError> {
        match self.steps.pop_front() {
            Some(Step::Chunk(text)) => {
                self.timeline.record(format!("chunk:{}", self.served));
                self.served += 1;
                Ok(StreamChunk::Text(text))
            }
            Some(Step::Fail(reason)) => Err(StreamError::Remote(reason)),
            None => {
                self.timeline.record("end");
                Ok(StreamChunk::Done)
            }
        }
    }
}

#[async_trait]
impl DomainStreamSource for ScriptedStreamSource {
    async fn open(&self, domain: &str, model: &str) -> Result<Box<dyn DomainStream>, StreamError> {
        self.opened
            .lock()
            .unwrap()
            .push((domain.to_string(), model.to_string()));
        if let Some(reason) = &self.open_error {
            return Err(StreamError::Connect(reason.clone()));
        }
        Ok(Box::new(ScriptedStream {
            steps: self.steps.iter().cloned().collect(),
            timeline: self.timeline.clone(),
            served: 0,
        }))
    }
}

/// Schema and rating double
///
/// Ratings are derived from the member text so every member gets distinct,
/// repeatable numbers.
pub struct MockAttributeService {
    schema_error: Option<String>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    timeline: Timeline,
    pub schema_calls: Mutex<Vec<(String, Vec<String>)>>,
    pub rate_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockAttributeService {
    pub fn new() -> Self {
        Self {
            schema_error: None,
            failing: HashSet::new(),
            delay: None,
            timeline: Timeline::default(),
            schema_calls: Mutex::new(Vec::new()),
            rate_calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_schema(mut self, reason: &str) -> Self {
        self.schema_error = Some(reason.to_string());
        self
    }

    pub fn failing_member(mut self, member: &str) -> Self {
        self.failing.insert(member.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn rate_count(&self, member: &str) -> usize {
        self.rate_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == member)
            .count()
    }
}

pub fn ratings_for(member: &str) -> Ratings {
    let bytes = member.as_bytes();
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    let first = bytes.first().copied().unwrap_or(0) as u32;
    let last = bytes.last().copied().unwrap_or(0) as u32;

    json!({
        "warmth": sum % 11,
        "brightness": first % 7 + (bytes.len() as u32 % 4),
        "popularity": last % 10,
        "label": member,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn test_schema() -> Value {
    json!({
        "warmth": "0-10",
        "brightness": "0-10",
        "popularity": "0-10",
    })
}

#[async_trait]
impl AttributeService for MockAttributeService {
    async fn fetch_global_schema(
        &self,
        domain: &str,
        sample_members: &[String],
    ) -> Result<GlobalAttributeSchema, ServiceError> {
        self.timeline.record("schema");
        self.schema_calls
            .lock()
            .unwrap()
            .push((domain.to_string(), sample_members.to_vec()));
        match &self.schema_error {
            Some(reason) => Err(ServiceError::Status {
                status: 503,
                body: reason.clone(),
            }),
            None => Ok(GlobalAttributeSchema(test_schema())),
        }
    }

    async fn rate_member(
        &self,
        member: &str,
        _schema: &GlobalAttributeSchema,
    ) -> Result<Ratings, ServiceError> {
        self.timeline.record(format!("rate:{}", member));
        self.rate_calls.lock().unwrap().push(member.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(member) {
            return Err(ServiceError::Network(format!("rating backend refused {}", member)));
        }
        Ok(ratings_for(member))
    }
}

/// Image double: `https://img.test/<member>.png` unless told otherwise
pub struct MockImageService {
    missing: HashSet<String>,
    failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockImageService {
    pub fn new() -> Self {
        Self {
            missing: HashSet::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn missing(mut self, member: &str) -> Self {
        self.missing.insert(member.to_string());
        self
    }

    pub fn failing(mut self, member: &str) -> Self {
        self.failing.insert(member.to_string());
        self
    }
}

pub fn image_url_for(member: &str) -> String {
    format!("https://img.test/{}.png", member)
}

#[async_trait]
impl ImageService for MockImageService {
    async fn fetch_thumbnail(&self, text: &str) -> Result<Option<String>, ServiceError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.failing.contains(text) {
            return Err(ServiceError::Network("image host down".to_string()));
        }
        if self.missing.contains(text) {
            return Ok(None);
        }
        Ok(Some(image_url_for(text)))
    }
}

/// Bundle doubles into the service set the orchestrator expects
pub fn remote_services(
    stream: Arc<ScriptedStreamSource>,
    attributes: Arc<MockAttributeService>,
    images: Arc<MockImageService>,
) -> RemoteServices {
    RemoteServices {
        stream,
        attributes,
        images,
    }
}

/// Broadcaster plus a listener that collects every entry
pub fn collecting_broadcaster() -> (Arc<LogBroadcaster>, Arc<Mutex<Vec<LogEntry>>>) {
    let broadcaster = Arc::new(LogBroadcaster::new(1024));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    broadcaster.subscribe(move |entry| sink.lock().unwrap().push(entry.clone()));
    (broadcaster, seen)
}

/// Count of `member` in a list of names
pub fn occurrences(names: &[String], member: &str) -> usize {
    names.iter().filter(|n| n.as_str() == member).count()
}

pub fn counts(names: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for name in names {
        *map.entry(name.clone()).or_insert(0) += 1;
    }
    map
}
