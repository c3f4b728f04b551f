// Upstream Finnhub WebSocket link: connect, replay, dispatch, reconnect
use crate::router::UpstreamFeed;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tickrelay_common::{
    FeedCommand, FeedConfig, FeedMessage, FeedTick, MetricsCollector, RelayError, Result, Symbol,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use url::Url;

/// Write half of an upstream connection.
#[async_trait]
pub trait FeedSink: Send + Sync {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an upstream connection. `None` means the peer closed cleanly.
#[async_trait]
pub trait FeedSource: Send {
    async fn next_text(&mut self) -> Option<Result<String>>;
}

/// Opens upstream connections. Production dials a real WebSocket; tests
/// substitute scripted sessions.
#[async_trait]
pub trait FeedDialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<(Box<dyn FeedSink>, Box<dyn FeedSource>)>;
}

/// Consumer of upstream traffic. The router implements this; the link calls
/// `wanted_symbols` on every (re)connect to restore upstream subscriptions.
#[async_trait]
pub trait FeedHandler: Send + Sync {
    async fn wanted_symbols(&self) -> Vec<Symbol>;
    async fn on_trades(&self, ticks: Vec<FeedTick>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            3 => LinkState::Reconnecting,
            _ => LinkState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Reconnecting => "reconnecting",
        }
    }
}

/// Exponential backoff. `next_delay` yields the current delay and doubles it,
/// capped at `max`. A fresh instance per reconnect loop resets the sequence.
struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self { current: base, max }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

struct LinkShared {
    config: FeedConfig,
    dialer: Box<dyn FeedDialer>,
    metrics: Arc<MetricsCollector>,
    state: AtomicU8,
    connected: AtomicBool,
    shutting_down: AtomicBool,
    sink: Mutex<Option<Box<dyn FeedSink>>>,
    handler: OnceLock<Arc<dyn FeedHandler>>,
    // Serializes connect, reconnect and shutdown transitions.
    lifecycle: Mutex<()>,
    session: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap-to-clone handle on the single upstream connection. One session task
/// owns the read loop; when the stream drops it runs the reconnect loop
/// inline, so there is never more than one generation alive.
#[derive(Clone)]
pub struct FinnhubLink {
    shared: Arc<LinkShared>,
}

impl FinnhubLink {
    pub fn new(config: FeedConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self::with_dialer(config, metrics, Box::new(TungsteniteDialer))
    }

    pub fn with_dialer(
        config: FeedConfig,
        metrics: Arc<MetricsCollector>,
        dialer: Box<dyn FeedDialer>,
    ) -> Self {
        Self {
            shared: Arc::new(LinkShared {
                config,
                dialer,
                metrics,
                state: AtomicU8::new(LinkState::Disconnected as u8),
                connected: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                sink: Mutex::new(None),
                handler: OnceLock::new(),
                lifecycle: Mutex::new(()),
                session: Mutex::new(None),
            }),
        }
    }

    /// Registers the traffic consumer. Wired once at startup, after the
    /// router is built.
    pub fn set_handler(&self, handler: Arc<dyn FeedHandler>) {
        if self.shared.handler.set(handler).is_err() {
            warn!("Feed handler already registered, keeping the first one");
        }
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: LinkState) {
        self.shared.state.store(state as u8, Ordering::SeqCst);
        self.shared
            .connected
            .store(state == LinkState::Connected, Ordering::SeqCst);
    }

    fn shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    /// Establishes the upstream connection. An empty token is a
    /// configuration problem and is surfaced instead of retried; transport
    /// failures are returned so the caller can decide to start the
    /// reconnect loop.
    pub async fn connect(&self) -> Result<()> {
        if self.shutting_down() {
            return Err(RelayError::ShutDown);
        }
        if self.shared.config.token.is_empty() {
            return Err(RelayError::ConfigError(
                "upstream API token is empty".to_string(),
            ));
        }
        let _lifecycle = self.shared.lifecycle.lock().await;
        if self.shutting_down() {
            return Err(RelayError::ShutDown);
        }
        if self.is_connected() {
            warn!("Feed connect requested while already connected, ignoring");
            return Ok(());
        }
        self.establish().await
    }

    /// Starts the background reconnect loop unless a session task is already
    /// alive, reading or retrying. Used after a failed initial connect.
    pub async fn begin_reconnect(&self) {
        let mut session = self.shared.session.lock().await;
        // Checked under the session lock: shutdown sets the flag before it
        // takes this lock, so we cannot respawn after it swept the slot.
        if self.shutting_down() {
            return;
        }
        if let Some(handle) = session.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        self.set_state(LinkState::Reconnecting);
        let link = self.clone();
        *session = Some(tokio::spawn(async move { link.reconnect_loop().await }));
    }

    /// Terminal: no reconnect runs after this returns.
    pub async fn shutdown(&self) {
        info!("🛑 Shutting down upstream feed link");
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        let _lifecycle = self.shared.lifecycle.lock().await;
        let handle = { self.shared.session.lock().await.take() };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        {
            let mut sink = self.shared.sink.lock().await;
            if let Some(mut sink) = sink.take() {
                let _ = sink.close().await;
            }
        }
        self.set_state(LinkState::Disconnected);
        self.shared.metrics.record_feed_connection_status(false);
    }

    // Caller must hold the lifecycle lock.
    async fn establish(&self) -> Result<()> {
        self.set_state(LinkState::Connecting);
        info!(
            "🔌 Connecting to upstream feed at {}",
            self.shared.config.ws_url
        );

        let endpoint = self.shared.config.endpoint();
        let (sink, source) = match self.shared.dialer.dial(&endpoint).await {
            Ok(halves) => halves,
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                self.shared.metrics.record_feed_connection_status(false);
                return Err(e);
            }
        };

        {
            let mut guard = self.shared.sink.lock().await;
            *guard = Some(sink);
        }
        self.set_state(LinkState::Connected);
        self.shared.metrics.record_feed_connection_status(true);
        info!("✅ Upstream feed connected");

        self.replay_wanted().await;

        let link = self.clone();
        let handle = tokio::spawn(async move { link.run_session(source).await });
        let mut session = self.shared.session.lock().await;
        *session = Some(handle);
        Ok(())
    }

    /// Re-subscribes every symbol some client still wants. Runs on each
    /// (re)connect so upstream interest survives connection loss.
    async fn replay_wanted(&self) {
        let handler = match self.shared.handler.get() {
            Some(handler) => handler.clone(),
            None => return,
        };
        let symbols = handler.wanted_symbols().await;
        if symbols.is_empty() {
            return;
        }
        info!("📡 Restoring {} upstream symbol subscriptions", symbols.len());
        let commands: Vec<FeedCommand> = symbols
            .into_iter()
            .map(|symbol| FeedCommand::Subscribe { symbol })
            .collect();
        if let Err(e) = self.send_commands(&commands).await {
            warn!("⚠️ Failed to restore upstream subscriptions: {}", e);
        }
    }

    async fn run_session(self, mut source: Box<dyn FeedSource>) {
        loop {
            match source.next_text().await {
                Some(Ok(text)) => self.dispatch(&text).await,
                Some(Err(e)) => {
                    if self.shutting_down() {
                        return;
                    }
                    warn!("⚠️ Upstream feed read error: {}", e);
                    break;
                }
                None => {
                    if self.shutting_down() {
                        return;
                    }
                    warn!("⚠️ Upstream feed closed the connection");
                    break;
                }
            }
        }

        // Connection lost: drop the dead sink and dial again with backoff.
        self.set_state(LinkState::Reconnecting);
        self.shared.metrics.record_feed_connection_status(false);
        {
            let mut sink = self.shared.sink.lock().await;
            *sink = None;
        }
        self.reconnect_loop().await;
    }

    // Boxed return type breaks the establish -> run_session -> reconnect_loop
    // async cycle so the compiler can prove the spawned futures are Send.
    fn reconnect_loop(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(self.reconnect_loop_inner())
    }

    async fn reconnect_loop_inner(&self) {
        let mut backoff = Backoff::new(
            self.shared.config.reconnect_base,
            self.shared.config.reconnect_max,
        );
        loop {
            if self.shutting_down() {
                return;
            }
            let delay = backoff.next_delay();
            info!("⏳ Reconnecting to upstream feed in {:?}", delay);
            tokio::time::sleep(delay).await;

            let _lifecycle = self.shared.lifecycle.lock().await;
            if self.shutting_down() {
                return;
            }
            if self.is_connected() {
                // Someone re-established the link while we slept.
                return;
            }
            self.shared.metrics.record_feed_reconnect_attempt();
            match self.establish().await {
                Ok(()) => return,
                Err(e) => {
                    warn!("⚠️ Reconnect attempt failed: {}", e);
                    self.set_state(LinkState::Reconnecting);
                }
            }
        }
    }

    async fn dispatch(&self, text: &str) {
        let message: FeedMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring unrecognized feed message: {}", e);
                return;
            }
        };
        match message {
            FeedMessage::Trade { data } => {
                self.shared.metrics.record_feed_message("trade");
                if let Some(handler) = self.shared.handler.get() {
                    handler.on_trades(data).await;
                }
            }
            FeedMessage::Ping => {
                self.shared.metrics.record_feed_message("ping");
                debug!("Feed ping received, answering with pong");
                if let Err(e) = self.send_raw(r#"{"type":"pong"}"#).await {
                    warn!("⚠️ Failed to answer feed ping: {}", e);
                }
            }
            FeedMessage::Error { msg } => {
                self.shared.metrics.record_feed_message("error");
                error!("❌ Upstream feed error: {}", msg);
            }
        }
    }

    async fn send_commands(&self, commands: &[FeedCommand]) -> Result<()> {
        let mut guard = self.shared.sink.lock().await;
        let sink = match guard.as_mut() {
            Some(sink) => sink,
            None => return Err(RelayError::NotConnected),
        };
        for command in commands {
            sink.send_text(serde_json::to_string(command)?).await?;
        }
        Ok(())
    }

    async fn send_raw(&self, text: &str) -> Result<()> {
        let mut guard = self.shared.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send_text(text.to_string()).await,
            None => Err(RelayError::NotConnected),
        }
    }
}

#[async_trait]
impl UpstreamFeed for FinnhubLink {
    fn is_connected(&self) -> bool {
        FinnhubLink::is_connected(self)
    }

    async fn subscribe(&self, symbols: &[Symbol]) -> Result<()> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        let commands: Vec<FeedCommand> = symbols
            .iter()
            .map(|symbol| FeedCommand::Subscribe {
                symbol: symbol.clone(),
            })
            .collect();
        self.send_commands(&commands).await
    }

    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<()> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        let commands: Vec<FeedCommand> = symbols
            .iter()
            .map(|symbol| FeedCommand::Unsubscribe {
                symbol: symbol.clone(),
            })
            .collect();
        self.send_commands(&commands).await
    }
}

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Production dialer backed by tokio-tungstenite.
pub struct TungsteniteDialer;

struct WsSink {
    writer: WsWriter,
}

#[async_trait]
impl FeedSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.writer.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.send(Message::Close(None)).await?;
        Ok(())
    }
}

struct WsSource {
    reader: WsReader,
}

#[async_trait]
impl FeedSource for WsSource {
    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) => return None,
                // Pings are answered by the library; other frames carry
                // nothing we route.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }
}

#[async_trait]
impl FeedDialer for TungsteniteDialer {
    async fn dial(&self, url: &str) -> Result<(Box<dyn FeedSink>, Box<dyn FeedSource>)> {
        let url = Url::parse(url)?;
        let (ws_stream, _) = connect_async(url).await?;
        let (writer, reader) = ws_stream.split();
        Ok((Box::new(WsSink { writer }), Box::new(WsSource { reader })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{
        fast_feed_config, parse_commands, scripted_link, wait_for, FeedScript, RecordingHandler,
        SessionEnd,
    };

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn link_state_round_trips_through_u8() {
        for state in [
            LinkState::Disconnected,
            LinkState::Connecting,
            LinkState::Connected,
            LinkState::Reconnecting,
        ] {
            assert_eq!(LinkState::from_u8(state as u8), state);
        }
        assert_eq!(LinkState::Connected.as_str(), "connected");
    }

    #[tokio::test]
    async fn connect_rejects_an_empty_token() {
        let (dialer, probe) = crate::testkit::ScriptedDialer::new(vec![]);
        let mut config = fast_feed_config();
        config.token = String::new();
        let link =
            FinnhubLink::with_dialer(config, Arc::new(MetricsCollector::new()), Box::new(dialer));

        let result = link.connect().await;
        assert!(matches!(result, Err(RelayError::ConfigError(_))));
        assert_eq!(probe.dial_count(), 0);
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_outranks_a_blank_token_on_connect() {
        let (dialer, probe) = crate::testkit::ScriptedDialer::new(vec![]);
        let mut config = fast_feed_config();
        config.token = String::new();
        let link =
            FinnhubLink::with_dialer(config, Arc::new(MetricsCollector::new()), Box::new(dialer));

        link.shutdown().await;

        assert!(matches!(link.connect().await, Err(RelayError::ShutDown)));
        assert_eq!(probe.dial_count(), 0);
    }

    #[tokio::test]
    async fn connect_replays_the_wanted_symbols() {
        let (link, probe) = scripted_link(vec![FeedScript::held_session()]);
        let handler = RecordingHandler::new(&["AAPL", "MSFT"]);
        link.set_handler(handler);

        link.connect().await.unwrap();

        assert_eq!(link.state(), LinkState::Connected);
        let sent = parse_commands(&probe.sent_in_session(0));
        let subscribed: Vec<String> = sent
            .iter()
            .map(|cmd| match cmd {
                FeedCommand::Subscribe { symbol } => symbol.to_string(),
                other => panic!("expected subscribe, got {:?}", other),
            })
            .collect();
        assert_eq!(subscribed, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn duplicate_connect_is_a_noop() {
        let (link, probe) = scripted_link(vec![FeedScript::held_session()]);
        link.set_handler(RecordingHandler::new(&[]));

        link.connect().await.unwrap();
        link.connect().await.unwrap();

        assert_eq!(probe.dial_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_surfaces_and_leaves_the_link_down() {
        let (link, probe) = scripted_link(vec![FeedScript::Reject]);
        link.set_handler(RecordingHandler::new(&[]));

        let result = link.connect().await;
        assert!(result.is_err());
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(!link.is_connected());
        assert_eq!(probe.dial_count(), 1);
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (link, probe) = scripted_link(vec![FeedScript::Session {
            messages: vec![r#"{"type":"ping"}"#.to_string()],
            end: SessionEnd::Hold,
        }]);
        link.set_handler(RecordingHandler::new(&[]));
        link.connect().await.unwrap();

        wait_for("pong reply", || {
            probe
                .sent_in_session(0)
                .iter()
                .any(|frame| frame == r#"{"type":"pong"}"#)
        })
        .await;
    }

    #[tokio::test]
    async fn trades_reach_the_handler() {
        let (link, _probe) = scripted_link(vec![FeedScript::Session {
            messages: vec![
                r#"{"type":"trade","data":[{"s":"AAPL","p":190.5,"t":1700000000000,"v":25}]}"#
                    .to_string(),
            ],
            end: SessionEnd::Hold,
        }]);
        let handler = RecordingHandler::new(&[]);
        link.set_handler(handler.clone());
        link.connect().await.unwrap();

        wait_for("trade dispatch", || !handler.ticks().is_empty()).await;
        let ticks = handler.ticks();
        assert_eq!(ticks[0].symbol, "AAPL");
        assert_eq!(ticks[0].price, Some(190.5));
    }

    #[tokio::test]
    async fn unrecognized_feed_messages_are_ignored() {
        let (link, _probe) = scripted_link(vec![FeedScript::Session {
            messages: vec![
                r#"{"type":"news","headline":"irrelevant"}"#.to_string(),
                "not json at all".to_string(),
                r#"{"type":"error","msg":"slow down"}"#.to_string(),
            ],
            end: SessionEnd::Hold,
        }]);
        let handler = RecordingHandler::new(&[]);
        link.set_handler(handler.clone());
        link.connect().await.unwrap();

        // Give the session a moment to chew through the frames.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handler.ticks().is_empty());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn stream_loss_reconnects_and_replays() {
        let (link, probe) = scripted_link(vec![
            FeedScript::closing_session(),
            FeedScript::held_session(),
        ]);
        let handler = RecordingHandler::new(&["NVDA"]);
        link.set_handler(handler);
        link.connect().await.unwrap();

        wait_for("second dial", || probe.dial_count() == 2).await;
        wait_for("link back up", || link.is_connected()).await;
        wait_for("replayed interest", || {
            !probe.sent_in_session(1).is_empty()
        })
        .await;

        let replayed = parse_commands(&probe.sent_in_session(1));
        assert!(matches!(
            replayed.as_slice(),
            [FeedCommand::Subscribe { symbol }] if symbol.as_str() == "NVDA"
        ));
    }

    #[tokio::test]
    async fn reconnect_keeps_retrying_after_failures() {
        let (link, probe) = scripted_link(vec![
            FeedScript::closing_session(),
            FeedScript::Reject,
            FeedScript::Reject,
            FeedScript::held_session(),
        ]);
        link.set_handler(RecordingHandler::new(&[]));
        link.connect().await.unwrap();

        wait_for("link recovered", || link.is_connected()).await;
        assert_eq!(probe.dial_count(), 4);
    }

    #[tokio::test]
    async fn backoff_grows_across_failures_and_resets_after_success() {
        // The config's base is 10ms with an 80ms cap, so the dial gaps run
        // 10, 20, 40 while the feed keeps rejecting. The drop after the
        // successful fourth dial starts over at the base delay.
        let (link, probe) = scripted_link(vec![
            FeedScript::closing_session(),
            FeedScript::Reject,
            FeedScript::Reject,
            FeedScript::closing_session(),
            FeedScript::held_session(),
        ]);
        link.set_handler(RecordingHandler::new(&[]));
        link.connect().await.unwrap();

        wait_for("five dials", || probe.dial_count() == 5).await;
        wait_for("link settled", || link.is_connected()).await;

        let times = probe.dial_times();
        let gaps: Vec<Duration> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(10), "gaps: {:?}", gaps);
        assert!(gaps[1] >= Duration::from_millis(20), "gaps: {:?}", gaps);
        assert!(gaps[2] >= Duration::from_millis(40), "gaps: {:?}", gaps);
        // Had the delay kept doubling instead of resetting, this gap would
        // be at least 80ms.
        assert!(gaps[3] < Duration::from_millis(40), "gaps: {:?}", gaps);
    }

    #[tokio::test]
    async fn shutdown_stops_the_retry_loop() {
        let (link, probe) = scripted_link(vec![FeedScript::closing_session()]);
        link.set_handler(RecordingHandler::new(&[]));
        link.connect().await.unwrap();

        wait_for("retry loop running", || {
            link.state() == LinkState::Reconnecting
        })
        .await;
        link.shutdown().await;
        let dials = probe.dial_count();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(probe.dial_count(), dials);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(link.connect().await, Err(RelayError::ShutDown)));
    }

    #[tokio::test]
    async fn begin_reconnect_is_idempotent_while_a_session_lives() {
        let (link, probe) = scripted_link(vec![FeedScript::held_session()]);
        link.set_handler(RecordingHandler::new(&[]));
        link.connect().await.unwrap();

        link.begin_reconnect().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.dial_count(), 1);
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn begin_reconnect_dials_when_nothing_is_running() {
        let (link, probe) = scripted_link(vec![FeedScript::held_session()]);
        link.set_handler(RecordingHandler::new(&[]));

        link.begin_reconnect().await;
        wait_for("background connect", || link.is_connected()).await;
        assert_eq!(probe.dial_count(), 1);
    }

    #[tokio::test]
    async fn subscribe_while_down_reports_not_connected() {
        let (link, _probe) = scripted_link(vec![]);
        let result = link.subscribe(&[Symbol::new("AAPL")]).await;
        assert!(matches!(result, Err(RelayError::NotConnected)));
    }
}
