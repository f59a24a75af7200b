use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use doc_search_session::model::COLLECTIONS_FACET;
use doc_search_session::{
    AlertCandidate, AlertRegistry, AlertToggle, FacetBucket, Facets, Params, Peek, Query,
    SearchOutcome, SearchProvider, SearchResult, SearchSession, SessionInfo, TitleSink,
};
use parking_lot::Mutex;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[macro_export]
macro_rules! assert_logs_contain {
    ($tracing:expr, $needle:expr) => {{
        let out = $tracing.output();
        assert!(
            out.contains($needle),
            "expected logs to contain `{}` but were:\n{}",
            $needle,
            out
        );
    }};
}

#[derive(Clone)]
enum Scripted {
    Respond { delay: Duration, result: SearchResult },
    Fail { message: String },
}

/// Scriptable search provider keyed on the free-text term.
///
/// Unscripted terms resolve immediately to an empty result. Calls are
/// counted so tests can verify how many requests a scenario issued.
pub struct ScriptedProvider {
    plans: Mutex<HashMap<String, Scripted>>,
    peek: Mutex<Result<Peek, String>>,
    search_calls: AtomicUsize,
    peek_calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
            peek: Mutex::new(Ok(Peek::inactive())),
            search_calls: AtomicUsize::new(0),
            peek_calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(self, text: &str, result: SearchResult) -> Self {
        self.respond_after(text, Duration::ZERO, result)
    }

    pub fn respond_after(self, text: &str, delay: Duration, result: SearchResult) -> Self {
        self.plans
            .lock()
            .insert(text.to_string(), Scripted::Respond { delay, result });
        self
    }

    pub fn fail(self, text: &str, message: &str) -> Self {
        self.plans.lock().insert(
            text.to_string(),
            Scripted::Fail {
                message: message.to_string(),
            },
        );
        self
    }

    pub fn with_peek(self, peek: Peek) -> Self {
        *self.peek.lock() = Ok(peek);
        self
    }

    pub fn peek_unavailable(self, message: &str) -> Self {
        *self.peek.lock() = Err(message.to_string());
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn peek_calls(&self) -> usize {
        self.peek_calls.load(Ordering::SeqCst)
    }
}

impl SearchProvider for ScriptedProvider {
    fn search(&self, query: &Query) -> Result<SearchOutcome> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self.plans.lock().get(query.text()).cloned();
        match plan {
            Some(Scripted::Respond { delay, result }) => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                Ok(SearchOutcome::new(query.clone(), result))
            }
            Some(Scripted::Fail { message }) => Err(anyhow::anyhow!(message)),
            None => Ok(SearchOutcome::new(query.clone(), SearchResult::empty())),
        }
    }

    fn peek(&self, _query: &Query) -> Result<Peek> {
        self.peek_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.peek.lock() {
            Ok(peek) => Ok(*peek),
            Err(message) => Err(anyhow::anyhow!(message.clone())),
        }
    }
}

/// Title sink that records every update in order.
#[derive(Default)]
pub struct RecordingTitle {
    entries: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl RecordingTitle {
    pub fn last(&self) -> Option<(String, String)> {
        self.entries.lock().last().cloned()
    }

    pub fn titles(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl TitleSink for RecordingTitle {
    fn set(&self, title: &str, section: &str) {
        self.entries
            .lock()
            .push((title.to_string(), section.to_string()));
    }
}

/// Fixed authentication state.
pub struct StaticSession(pub bool);

impl SessionInfo for StaticSession {
    fn authenticated(&self) -> bool {
        self.0
    }
}

/// Alert registry that rejects every candidate, for eligibility tests.
#[allow(dead_code)]
pub struct RejectingAlerts;

impl AlertRegistry for RejectingAlerts {
    fn check(&self, _candidate: &AlertCandidate) -> bool {
        false
    }

    fn valid(&self, _candidate: &AlertCandidate) -> bool {
        false
    }

    fn toggle(&self, _candidate: &AlertCandidate) -> Result<AlertToggle> {
        anyhow::bail!("alerts are disabled")
    }
}

/// Builds a query from literal name/value pairs.
#[allow(dead_code)]
pub fn query_of(pairs: &[(&str, &str)]) -> Query {
    let mut params = Params::new();
    for (name, value) in pairs {
        params
            .entry((*name).to_string())
            .or_default()
            .push((*value).to_string());
    }
    Query::new(params)
}

/// A hits result carrying the named collection buckets.
#[allow(dead_code)]
pub fn collections_result(buckets: &[(&str, u64)], total: u64) -> SearchResult {
    let mut facets = Facets::new();
    facets.insert(
        COLLECTIONS_FACET.to_string(),
        buckets
            .iter()
            .map(|(value, count)| FacetBucket::new(*value, *count))
            .collect(),
    );
    SearchResult::Hits {
        facets,
        documents: Vec::new(),
        total,
    }
}

/// Polls `cond` until it holds or a generous deadline passes.
#[allow(dead_code)]
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Pumps the session until `cond` holds or a generous deadline passes.
#[allow(dead_code)]
pub async fn pump_until(
    session: &mut SearchSession,
    what: &str,
    mut cond: impl FnMut(&SearchSession) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        session.pump();
        if cond(session) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out pumping for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
