// Test doubles and fixtures: scripted upstream sessions, recording fakes
use crate::finnhub::{FeedDialer, FeedHandler, FeedSink, FeedSource, FinnhubLink};
use crate::registry::{ClientConnection, ClientRegistry};
use crate::router::{SymbolRouter, UpstreamFeed};
use crate::state::AppState;
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickrelay_common::{
    ClientEnvelope, FeedCommand, FeedConfig, FeedTick, MetricsCollector, RelayError, Result,
    Symbol,
};
use tokio::sync::mpsc;

/// One scripted outcome for an upstream dial attempt.
#[derive(Debug)]
pub enum FeedScript {
    /// The dial fails.
    Reject,
    /// A session that delivers `messages`, then ends as `end` says.
    Session {
        messages: Vec<String>,
        end: SessionEnd,
    },
    /// A session the test drives through `FeedProbe::push` and ends with
    /// `FeedProbe::close_pipe`.
    Piped,
}

#[derive(Debug)]
pub enum SessionEnd {
    /// The feed closes the connection after the canned messages.
    Close,
    /// The session stays open until the link is shut down.
    Hold,
}

impl FeedScript {
    pub fn held_session() -> Self {
        FeedScript::Session {
            messages: Vec::new(),
            end: SessionEnd::Hold,
        }
    }

    pub fn closing_session() -> Self {
        FeedScript::Session {
            messages: Vec::new(),
            end: SessionEnd::Close,
        }
    }
}

struct ProbeShared {
    dials: AtomicUsize,
    dial_times: Mutex<Vec<tokio::time::Instant>>,
    sessions: Mutex<Vec<Vec<String>>>,
    pipes: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

/// Test-side view of everything the link did with its scripted dialer.
#[derive(Clone)]
pub struct FeedProbe {
    shared: Arc<ProbeShared>,
}

impl FeedProbe {
    pub fn dial_count(&self) -> usize {
        self.shared.dials.load(Ordering::SeqCst)
    }

    /// When each dial happened, in order.
    pub fn dial_times(&self) -> Vec<tokio::time::Instant> {
        self.shared.dial_times.lock().unwrap().clone()
    }

    /// Frames the link wrote during its n-th session, zero-based.
    pub fn sent_in_session(&self, session: usize) -> Vec<String> {
        self.shared
            .sessions
            .lock()
            .unwrap()
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Delivers a frame through the most recent piped session.
    pub fn push(&self, text: &str) {
        let pipes = self.shared.pipes.lock().unwrap();
        let tx = pipes.last().expect("no piped session dialed yet");
        tx.send(text.to_string())
            .expect("piped session receiver dropped");
    }

    /// Drops the most recent piped session, as if the feed hung up.
    pub fn close_pipe(&self) {
        self.shared.pipes.lock().unwrap().pop();
    }
}

/// `FeedDialer` that plays back a queue of `FeedScript`s.
pub struct ScriptedDialer {
    scripts: Mutex<VecDeque<FeedScript>>,
    shared: Arc<ProbeShared>,
}

impl ScriptedDialer {
    pub fn new(scripts: Vec<FeedScript>) -> (Self, FeedProbe) {
        let shared = Arc::new(ProbeShared {
            dials: AtomicUsize::new(0),
            dial_times: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            pipes: Mutex::new(Vec::new()),
        });
        let dialer = Self {
            scripts: Mutex::new(scripts.into()),
            shared: shared.clone(),
        };
        (dialer, FeedProbe { shared })
    }

    fn open_session(&self) -> usize {
        let mut sessions = self.shared.sessions.lock().unwrap();
        sessions.push(Vec::new());
        sessions.len() - 1
    }
}

#[async_trait]
impl FeedDialer for ScriptedDialer {
    async fn dial(&self, _url: &str) -> Result<(Box<dyn FeedSink>, Box<dyn FeedSource>)> {
        self.shared.dials.fetch_add(1, Ordering::SeqCst);
        self.shared
            .dial_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            None => Err(RelayError::ServiceUnavailable(
                "scripted feed has no sessions left".to_string(),
            )),
            Some(FeedScript::Reject) => Err(RelayError::ServiceUnavailable(
                "scripted feed rejected the dial".to_string(),
            )),
            Some(FeedScript::Session { messages, end }) => {
                let session = self.open_session();
                Ok((
                    Box::new(ScriptedSink {
                        session,
                        shared: self.shared.clone(),
                    }),
                    Box::new(ScriptedSource::Canned {
                        messages: messages.into(),
                        end,
                    }),
                ))
            }
            Some(FeedScript::Piped) => {
                let session = self.open_session();
                let (tx, rx) = mpsc::unbounded_channel();
                self.shared.pipes.lock().unwrap().push(tx);
                Ok((
                    Box::new(ScriptedSink {
                        session,
                        shared: self.shared.clone(),
                    }),
                    Box::new(ScriptedSource::Piped { rx }),
                ))
            }
        }
    }
}

struct ScriptedSink {
    session: usize,
    shared: Arc<ProbeShared>,
}

#[async_trait]
impl FeedSink for ScriptedSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.shared.sessions.lock().unwrap()[self.session].push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

enum ScriptedSource {
    Canned {
        messages: VecDeque<String>,
        end: SessionEnd,
    },
    Piped {
        rx: mpsc::UnboundedReceiver<String>,
    },
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn next_text(&mut self) -> Option<Result<String>> {
        match self {
            ScriptedSource::Canned { messages, end } => match messages.pop_front() {
                Some(text) => Some(Ok(text)),
                None => match end {
                    SessionEnd::Close => None,
                    SessionEnd::Hold => std::future::pending::<Option<Result<String>>>().await,
                },
            },
            ScriptedSource::Piped { rx } => rx.recv().await.map(Ok),
        }
    }
}

/// Records the router's upstream calls instead of touching a socket.
pub struct RecordingFeed {
    connected: AtomicBool,
    failing: AtomicBool,
    calls: Mutex<Vec<FeedCall>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    Subscribe(Vec<Symbol>),
    Unsubscribe(Vec<Symbol>),
}

impl RecordingFeed {
    pub fn connected() -> Arc<Self> {
        let feed = Self::disconnected();
        feed.set_connected(true);
        feed
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_calls(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamFeed for RecordingFeed {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, symbols: &[Symbol]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(FeedCall::Subscribe(symbols.to_vec()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::NotConnected);
        }
        Ok(())
    }

    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(FeedCall::Unsubscribe(symbols.to_vec()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::NotConnected);
        }
        Ok(())
    }
}

/// Records delivered envelopes; optionally fails after a set number of
/// successful sends.
pub struct MockClient {
    received: Mutex<Vec<ClientEnvelope>>,
    fail_after: usize,
    sent: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Self::failing_after(usize::MAX)
    }

    /// Fails every send from the first one.
    pub fn failing() -> Arc<Self> {
        Self::failing_after(0)
    }

    pub fn failing_after(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            received: Mutex::new(Vec::new()),
            fail_after: successes,
            sent: AtomicUsize::new(0),
        })
    }

    pub fn received(&self) -> Vec<ClientEnvelope> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientConnection for MockClient {
    async fn send_json(&self, envelope: &ClientEnvelope) -> Result<()> {
        let already = self.sent.fetch_add(1, Ordering::SeqCst);
        if already >= self.fail_after {
            return Err(RelayError::ServiceUnavailable(
                "scripted client send failure".to_string(),
            ));
        }
        self.received.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Stands in for the router when a test only exercises the link.
pub struct RecordingHandler {
    wanted: Mutex<Vec<Symbol>>,
    ticks: Mutex<Vec<FeedTick>>,
}

impl RecordingHandler {
    pub fn new(wanted: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            wanted: Mutex::new(wanted.iter().map(Symbol::new).collect()),
            ticks: Mutex::new(Vec::new()),
        })
    }

    pub fn ticks(&self) -> Vec<FeedTick> {
        self.ticks.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedHandler for RecordingHandler {
    async fn wanted_symbols(&self) -> Vec<Symbol> {
        self.wanted.lock().unwrap().clone()
    }

    async fn on_trades(&self, ticks: Vec<FeedTick>) {
        self.ticks.lock().unwrap().extend(ticks);
    }
}

/// Feed settings with millisecond backoff so reconnect tests run fast.
pub fn fast_feed_config() -> FeedConfig {
    FeedConfig {
        ws_url: "ws://scripted.test".to_string(),
        token: "test-token".to_string(),
        reconnect_base: Duration::from_millis(10),
        reconnect_max: Duration::from_millis(80),
    }
}

/// A link over a scripted dialer, no handler wired.
pub fn scripted_link(scripts: Vec<FeedScript>) -> (FinnhubLink, FeedProbe) {
    let (dialer, probe) = ScriptedDialer::new(scripts);
    let link = FinnhubLink::with_dialer(
        fast_feed_config(),
        Arc::new(MetricsCollector::new()),
        Box::new(dialer),
    );
    (link, probe)
}

/// Full application state over a scripted feed: registry, router and link
/// wired together, nothing connected yet.
pub fn scripted_app_state(scripts: Vec<FeedScript>) -> (AppState, FeedProbe) {
    let metrics = Arc::new(MetricsCollector::new());
    let (dialer, probe) = ScriptedDialer::new(scripts);
    let feed = FinnhubLink::with_dialer(fast_feed_config(), metrics.clone(), Box::new(dialer));
    let registry = Arc::new(ClientRegistry::new(metrics.clone()));
    let router = Arc::new(SymbolRouter::new(
        Arc::new(feed.clone()),
        registry.clone(),
        metrics.clone(),
    ));
    feed.set_handler(router.clone());
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState {
        router,
        registry,
        feed,
        metrics,
        prometheus,
    };
    (state, probe)
}

pub fn parse_commands(frames: &[String]) -> Vec<FeedCommand> {
    frames
        .iter()
        .map(|frame| serde_json::from_str(frame).expect("frame is not a feed command"))
        .collect()
}

/// Polls `cond` every 10ms for up to 5 seconds, panicking on timeout.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
