//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{ClientCommand, SessionEvent, SessionRuntime};
use crate::search::{summarize, SearchError, SearchQuery, SearchSummary};
use crate::session::transcript::TranscriptMessage;
use crate::session::{Event, SessionContext, SessionState};
use crate::token::TokenError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Token Source
// ============================================================================

/// Mock token source that returns queued tokens
pub struct MockTokenSource {
    tokens: Mutex<VecDeque<Result<String, TokenError>>>,
    /// Number of fetches made
    pub fetches: Mutex<usize>,
}

#[allow(dead_code)]
impl MockTokenSource {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn queue_token(&self, token: impl Into<String>) {
        self.tokens.lock().unwrap().push_back(Ok(token.into()));
    }

    pub fn queue_error(&self, error: TokenError) {
        self.tokens.lock().unwrap().push_back(Err(error));
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        *self.fetches.lock().unwrap() += 1;
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TokenError::MissingCredentials))
    }
}

// ============================================================================
// Mock Trademark Search
// ============================================================================

/// Mock search with an optional delay (for cancellation testing)
pub struct MockSearch {
    fail_with: Option<String>,
    delay: Duration,
    /// Record of all queries made
    pub queries: Mutex<Vec<(String, SearchQuery)>>,
    /// Notified when a search starts
    pub search_started: Arc<Notify>,
}

#[allow(dead_code)]
impl MockSearch {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
            search_started: Arc::new(Notify::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn recorded_queries(&self) -> Vec<(String, SearchQuery)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrademarkSearch for MockSearch {
    async fn search(
        &self,
        requester: &str,
        query: &SearchQuery,
    ) -> Result<SearchSummary, SearchError> {
        self.queries
            .lock()
            .unwrap()
            .push((requester.to_string(), query.clone()));
        self.search_started.notify_waiters();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.fail_with {
            Some(message) => Err(SearchError::network(message.clone())),
            None => Ok(summarize(&query.term, &[])),
        }
    }
}

// ============================================================================
// In-Memory Transcript Sink
// ============================================================================

/// Records appended transcript batches and finish calls
#[derive(Default)]
pub struct MemorySink {
    pub batches: Mutex<Vec<Vec<TranscriptMessage>>>,
    pub finished: Mutex<Vec<Duration>>,
    fail_finish: Option<String>,
}

#[allow(dead_code)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `finish` always fails (after recording the call)
    pub fn failing_finish(message: impl Into<String>) -> Self {
        Self {
            fail_finish: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<TranscriptMessage> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn finish_count(&self) -> usize {
        self.finished.lock().unwrap().len()
    }
}

#[async_trait]
impl TranscriptSink for MemorySink {
    async fn append(&self, _session_id: &str, lines: &[TranscriptMessage]) -> Result<(), String> {
        self.batches.lock().unwrap().push(lines.to_vec());
        Ok(())
    }

    async fn finish(&self, _session_id: &str, duration: Duration) -> Result<(), String> {
        self.finished.lock().unwrap().push(duration);
        match &self.fail_finish {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestSession {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<SessionEvent>,
    pub state_rx: watch::Receiver<SessionState>,
    pub tokens: Arc<MockTokenSource>,
    pub search: Arc<MockSearch>,
    pub sink: Arc<MemorySink>,
    pub shutdown: CancellationToken,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

pub struct TestSessionBuilder {
    context: SessionContext,
    tokens: MockTokenSource,
    search: MockSearch,
    sink: MemorySink,
    debounce: Duration,
}

#[allow(dead_code)]
impl TestSessionBuilder {
    pub fn new() -> Self {
        Self {
            context: SessionContext::new("test-session")
                .with_reconnect(3, Duration::from_millis(20)),
            tokens: MockTokenSource::new(),
            search: MockSearch::new(),
            sink: MemorySink::new(),
            debounce: Duration::from_millis(30),
        }
    }

    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    pub fn tokens(mut self, tokens: MockTokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn search(mut self, search: MockSearch) -> Self {
        self.search = search;
        self
    }

    pub fn sink(mut self, sink: MemorySink) -> Self {
        self.sink = sink;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn build(self) -> TestSession {
        let tokens = Arc::new(self.tokens);
        let search = Arc::new(self.search);
        let sink = Arc::new(self.sink);

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let shutdown = CancellationToken::new();

        let runtime = SessionRuntime::new(
            self.context,
            tokens.clone(),
            search.clone(),
            sink.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx,
            state_tx,
            shutdown.clone(),
            self.debounce,
        );

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestSession {
            event_tx,
            broadcast_rx,
            state_rx,
            tokens,
            search,
            sink,
            shutdown,
            _runtime_handle: handle,
        }
    }
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::new()
    }

    pub async fn send(&self, event: Event) {
        self.event_tx.send(event).await.expect("Failed to send event");
    }

    /// Connect and report the socket as open
    pub async fn connect(&mut self, token: &str) {
        self.send(Event::Connect {
            token: token.to_string(),
        })
        .await;
        self.send(Event::ConnectionOpened).await;
        assert!(self.wait_for_state("connected", Duration::from_secs(2)).await);
    }

    pub async fn agent_says(&self, text: &str) {
        self.send(Event::AgentMessage {
            text: text.to_string(),
        })
        .await;
    }

    pub async fn user_says(&self, text: &str) {
        self.send(Event::UserMessage {
            text: text.to_string(),
        })
        .await;
    }

    /// Wait for the first broadcast event matching `pred`
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut pred: F) -> Option<SessionEvent>
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(event)) if pred(&event) => return Some(event),
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                _ => continue,
            }
        }
        None
    }

    /// Wait for a specific state type with timeout
    pub async fn wait_for_state(&mut self, expected: &str, timeout: Duration) -> bool {
        self.wait_for(timeout, |e| {
            matches!(e, SessionEvent::StateChange { state }
                if state.get("state").and_then(|v| v.as_str()) == Some(expected))
        })
        .await
        .is_some()
    }

    pub async fn wait_for_command(&mut self, timeout: Duration) -> Option<ClientCommand> {
        match self
            .wait_for(timeout, |e| matches!(e, SessionEvent::Command { .. }))
            .await
        {
            Some(SessionEvent::Command { command }) => Some(command),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SessionManager;
    use crate::session::{Role, SearchPhase};

    const OFFER: &str = "Shall I run a trademark search for \"Nova\"?";

    #[tokio::test]
    async fn test_mock_token_source() {
        let tokens = MockTokenSource::new();
        tokens.queue_token("tok-1");
        assert_eq!(tokens.fetch_token().await.unwrap(), "tok-1");
        assert!(tokens.fetch_token().await.is_err());
        assert_eq!(tokens.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_emits_open_command() {
        let mut rt = TestSession::builder().build();
        rt.send(Event::Connect {
            token: "tok-1".to_string(),
        })
        .await;

        let command = rt.wait_for_command(Duration::from_secs(2)).await;
        assert_eq!(
            command,
            Some(ClientCommand::Open {
                token: "tok-1".to_string()
            })
        );
    }

    /// Offer, confirmation, one search, result fed back as context
    #[tokio::test]
    async fn test_confirmed_offer_runs_search_and_sends_context() {
        let mut rt = TestSession::builder()
            .context(
                SessionContext::new("test-session")
                    .with_case(Some("case-9".to_string()), None),
            )
            .build();
        rt.connect("tok-1").await;

        rt.agent_says(OFFER).await;
        rt.user_says("Yes, please").await;
        rt.user_says("yes").await;

        let command = rt.wait_for_command(Duration::from_secs(2)).await;
        match command {
            Some(ClientCommand::SendContext { text }) => {
                assert!(text.contains("No similar trademarks were found for \"Nova\""));
            }
            other => panic!("Expected SendContext, got {other:?}"),
        }

        let queries = rt.search.recorded_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, "case-9");
        assert_eq!(queries[0].1.term, "Nova");
        assert_eq!(rt.state_rx.borrow().search, SearchPhase::Idle);
    }

    #[tokio::test]
    async fn test_declined_offer_runs_no_search() {
        let mut rt = TestSession::builder().build();
        rt.connect("tok-1").await;

        rt.agent_says(OFFER).await;
        rt.user_says("No, not yet").await;
        rt.user_says("yes").await;

        let search_event = rt
            .wait_for(Duration::from_millis(300), |e| {
                matches!(e, SessionEvent::Search { data } if data["status"] == "started")
            })
            .await;
        assert!(search_event.is_none());
        assert!(rt.search.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_appends_apology() {
        let mut rt = TestSession::builder()
            .search(MockSearch::failing("connection refused"))
            .build();
        rt.connect("tok-1").await;

        rt.agent_says(OFFER).await;
        rt.user_says("ja").await;

        let event = rt
            .wait_for(Duration::from_secs(2), |e| {
                matches!(e, SessionEvent::Transcript { .. })
            })
            .await;
        match event {
            Some(SessionEvent::Transcript { role, text }) => {
                assert_eq!(role, Role::Assistant);
                assert!(text.starts_with("Sorry"));
            }
            other => panic!("Expected apology, got {other:?}"),
        }
        assert_eq!(rt.search.recorded_queries().len(), 1);
    }

    /// Unexpected close: wait, fetch a fresh token, reopen
    #[tokio::test]
    async fn test_reconnect_uses_fresh_token() {
        let tokens = MockTokenSource::new();
        tokens.queue_token("tok-fresh");
        let mut rt = TestSession::builder().tokens(tokens).build();
        rt.connect("tok-1").await;

        rt.send(Event::ConnectionClosed {
            reason: Some("socket dropped".to_string()),
        })
        .await;

        let command = rt
            .wait_for(Duration::from_secs(2), |e| {
                matches!(e, SessionEvent::Command { command: ClientCommand::Open { .. } })
            })
            .await;
        assert!(matches!(
            command,
            Some(SessionEvent::Command { command: ClientCommand::Open { token } }) if token == "tok-fresh"
        ));
        assert_eq!(rt.tokens.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_falls_back_to_last_token() {
        let mut rt = TestSession::builder().build();
        rt.connect("tok-1").await;

        rt.send(Event::ConnectionClosed { reason: None }).await;

        let command = rt
            .wait_for(Duration::from_secs(2), |e| {
                matches!(e, SessionEvent::Command { command: ClientCommand::Open { .. } })
            })
            .await;
        assert!(matches!(
            command,
            Some(SessionEvent::Command { command: ClientCommand::Open { token } }) if token == "tok-1"
        ));
    }

    /// Stop while a search is running: the search is cancelled and the session ends
    #[tokio::test]
    async fn test_stop_cancels_running_search() {
        let search = MockSearch::new().with_delay(Duration::from_secs(5));
        let started = search.search_started.clone();
        let mut rt = TestSession::builder().search(search).build();
        rt.connect("tok-1").await;

        let notified = started.notified();
        rt.agent_says(OFFER).await;
        rt.user_says("sure").await;
        tokio::time::timeout(Duration::from_secs(2), notified)
            .await
            .expect("search should start");

        rt.send(Event::Stop).await;
        assert!(rt
            .wait_for(Duration::from_secs(2), |e| matches!(e, SessionEvent::Ended))
            .await
            .is_some());
        assert_eq!(rt.sink.finish_count(), 1);

        let late = rt
            .wait_for(Duration::from_millis(300), |e| {
                matches!(e, SessionEvent::Command { command: ClientCommand::SendContext { .. } })
            })
            .await;
        assert!(late.is_none());
    }

    /// A burst of messages is flushed once, paired and deduplicated
    #[tokio::test]
    async fn test_transcript_flush_is_debounced() {
        let mut rt = TestSession::builder()
            .debounce(Duration::from_millis(100))
            .build();
        rt.connect("tok-1").await;

        rt.agent_says("Welcome!").await;
        rt.user_says("Hello").await;
        rt.agent_says("How can I help?").await;
        rt.agent_says("Tell me about your brand.").await;

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(rt.sink.batch_count(), 1);
        let lines = rt.sink.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "Hello");
        assert_eq!(lines[2].text, "Tell me about your brand.");
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_lines() {
        let rt = TestSession::builder()
            .debounce(Duration::from_secs(10))
            .build();
        rt.user_says("Hi").await;
        rt.agent_says("Hello").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rt.sink.batch_count(), 0);

        rt.shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rt.sink.lines().len(), 2);
        // Never connected: nothing to finalize
        assert_eq!(rt.sink.finish_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_live_conversation() {
        let mut rt = TestSession::builder()
            .debounce(Duration::from_secs(10))
            .build();
        rt.connect("tok-1").await;
        rt.user_says("Hi").await;
        rt.agent_says("Hello").await;

        rt.shutdown.cancel();
        assert!(rt
            .wait_for(Duration::from_secs(2), |e| matches!(e, SessionEvent::Ended))
            .await
            .is_some());
        assert_eq!(rt.sink.finish_count(), 1);
        assert_eq!(rt.sink.lines().len(), 2);
    }

    /// A sink failure is reported, and the client still sees the disconnect and the end
    #[tokio::test]
    async fn test_failed_finish_still_ends_session() {
        let mut rt = TestSession::builder()
            .sink(MemorySink::failing_finish("consultation not found"))
            .build();
        rt.connect("tok-1").await;

        rt.send(Event::Stop).await;

        let error = rt
            .wait_for(Duration::from_secs(2), |e| matches!(e, SessionEvent::Error { .. }))
            .await;
        assert!(matches!(
            error,
            Some(SessionEvent::Error { message }) if message.contains("consultation not found")
        ));
        assert!(rt.wait_for_state("disconnected", Duration::from_secs(2)).await);
        assert!(rt
            .wait_for(Duration::from_secs(2), |e| matches!(e, SessionEvent::Ended))
            .await
            .is_some());
        assert_eq!(rt.sink.finish_count(), 1);
    }

    #[tokio::test]
    async fn test_ended_session_leaves_manager() {
        let settings = crate::runtime::SessionSettings {
            max_reconnect_attempts: 0,
            ..crate::runtime::SessionSettings::default()
        };
        let sink = Arc::new(MemorySink::new());
        let manager = SessionManager::new(
            Arc::new(MockTokenSource::new()),
            Arc::new(MockSearch::new()),
            sink.clone(),
            settings,
        );

        let handle = manager.start("s-1", None, None).await;
        handle
            .event_tx
            .send(Event::Connect {
                token: "tok-1".to_string(),
            })
            .await
            .unwrap();
        handle.event_tx.send(Event::ConnectionOpened).await.unwrap();
        handle
            .event_tx
            .send(Event::ConnectionClosed { reason: None })
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while manager.active_sessions().await > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(manager.active_sessions().await, 0);
        assert!(handle.event_tx.is_closed());
        assert_eq!(sink.finish_count(), 1);

        // The id can be started again
        manager.start("s-1", None, None).await;
        assert_eq!(manager.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_manager_reuses_and_closes_sessions() {
        let manager = SessionManager::new(
            Arc::new(MockTokenSource::new()),
            Arc::new(MockSearch::new()),
            Arc::new(MemorySink::new()),
            crate::runtime::SessionSettings::default(),
        );

        let first = manager.start("s-1", Some("case-1".to_string()), None).await;
        let second = manager.start("s-1", None, None).await;
        assert_eq!(second.context.case_id.as_deref(), Some("case-1"));
        assert!(first.event_tx.same_channel(&second.event_tx));
        assert_eq!(manager.active_sessions().await, 1);

        let (init, _rx) = manager.subscribe("s-1").await.unwrap();
        assert!(matches!(init, SessionEvent::Init { session_id, .. } if session_id == "s-1"));

        assert!(manager.close("s-1").await);
        assert!(manager.get("s-1").await.is_none());
        assert!(manager.send_event("s-1", Event::Stop).await.is_err());
    }
}
