//! Session runtime executor

use super::traits::{TokenSource, TranscriptSink, TrademarkSearch};
use super::{ClientCommand, SessionEvent};

use crate::search::SearchQuery;
use crate::session::transcript::{Debouncer, TranscriptMessage, TranscriptPairer};
use crate::session::{transition, Effect, Event, Role, SearchOutcome, SessionContext, SessionState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime over any token source, search backend and transcript sink
pub struct SessionRuntime<T, S, K>
where
    T: TokenSource + 'static,
    S: TrademarkSearch + 'static,
    K: TranscriptSink + 'static,
{
    context: SessionContext,
    state: SessionState,
    tokens: Arc<T>,
    search: Arc<S>,
    sink: Arc<K>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    shutdown: CancellationToken,
    /// Token to cancel the running search
    search_cancel_token: Option<CancellationToken>,
    /// Full conversation as reported so far
    messages: Vec<TranscriptMessage>,
    pairer: TranscriptPairer,
    debouncer: Debouncer,
    flush_tx: mpsc::Sender<()>,
    flush_rx: mpsc::Receiver<()>,
    connected_since: Option<Instant>,
    /// Set once the sink has been told the conversation is over
    finished: bool,
}

impl<T, S, K> SessionRuntime<T, S, K>
where
    T: TokenSource + 'static,
    S: TrademarkSearch + 'static,
    K: TranscriptSink + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        tokens: T,
        search: S,
        sink: K,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        state_tx: watch::Sender<SessionState>,
        shutdown: CancellationToken,
        debounce: Duration,
    ) -> Self {
        let (flush_tx, flush_rx) = mpsc::channel(4);
        Self {
            context,
            state: SessionState::default(),
            tokens: Arc::new(tokens),
            search: Arc::new(search),
            sink: Arc::new(sink),
            event_rx,
            event_tx,
            broadcast_tx,
            state_tx,
            shutdown,
            search_cancel_token: None,
            messages: Vec::new(),
            pairer: TranscriptPairer::new(),
            debouncer: Debouncer::new(debounce),
            flush_tx,
            flush_rx,
            connected_since: None,
            finished: false,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event).await {
                        tracing::warn!(error = %e, "Rejected session event");
                        let _ = self.broadcast_tx.send(SessionEvent::Error { message: e });
                    }
                    if self.finished {
                        break;
                    }
                }
                Some(()) = self.flush_rx.recv() => {
                    self.flush_transcript().await;
                }
                else => break,
            }
        }

        self.debouncer.cancel();
        if let Some(token) = self.search_cancel_token.take() {
            token.cancel();
        }
        if !self.finished && self.state.was_connected {
            // Closed from outside while the conversation was live
            self.finish_session().await;
        } else {
            // Don't lose lines still waiting for the debounce timer
            self.flush_transcript().await;
        }
        let _ = self.broadcast_tx.send(SessionEvent::Ended);

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), String> {
        // Transition errors are user-facing (e.g., "already connected")
        let result =
            transition(&self.state, &self.context, event).map_err(|e| e.to_string())?;

        self.state = result.new_state;
        self.state_tx.send_replace(self.state.clone());

        for effect in result.effects {
            self.execute_effect(effect).await;
        }
        Ok(())
    }

    /// Flush the transcript and hand the finished conversation to the sink.
    /// A failing sink is reported to the client; the session still ends.
    async fn finish_session(&mut self) {
        self.debouncer.cancel();
        self.flush_transcript().await;

        let duration = self
            .connected_since
            .take()
            .map_or(Duration::ZERO, |t| t.elapsed());
        if let Err(e) = self.sink.finish(&self.context.session_id, duration).await {
            tracing::error!(session_id = %self.context.session_id, error = %e, "Failed to finalize consultation");
            let _ = self.broadcast_tx.send(SessionEvent::Error {
                message: format!("Failed to save the consultation: {e}"),
            });
        }
        self.finished = true;
    }

    /// Execute an effect
    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenConnection { token } => {
                if self.connected_since.is_none() {
                    self.connected_since = Some(Instant::now());
                }
                self.command(ClientCommand::Open { token });
            }

            Effect::CloseConnection => self.command(ClientCommand::Close),

            Effect::ScheduleReconnect { delay, attempt } => {
                tracing::info!(attempt, delay_ms = delay.as_millis(), "Scheduling reconnect");
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::ReconnectTimer { attempt }).await;
                });
            }

            Effect::RefreshToken { attempt } => {
                let tokens = self.tokens.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let token = match tokens.fetch_token().await {
                        Ok(token) => Some(token),
                        Err(e) => {
                            tracing::warn!(error = %e, attempt, "Token refresh failed, reusing last token");
                            None
                        }
                    };
                    let _ = event_tx.send(Event::TokenRefreshed { attempt, token }).await;
                });
            }

            Effect::RunSearch { brand } => self.spawn_search(brand),

            Effect::CancelSearch => {
                tracing::info!("Cancelling trademark search");
                if let Some(token) = self.search_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::SendContext { text } => self.command(ClientCommand::SendContext { text }),

            Effect::RecordMessage { role, text } => self.record(role, text),

            Effect::AppendTranscript { role, text } => {
                let _ = self.broadcast_tx.send(SessionEvent::Transcript {
                    role,
                    text: text.clone(),
                });
                self.record(role, text);
            }

            // `Ended` goes out when the loop exits, after the remaining effects
            Effect::EndSession => self.finish_session().await,

            Effect::NotifyClient { event_type, data } => match event_type.as_str() {
                "state_change" => {
                    let _ = self.broadcast_tx.send(SessionEvent::StateChange { state: data });
                }
                "search" => {
                    let _ = self.broadcast_tx.send(SessionEvent::Search { data });
                }
                other => tracing::debug!(event_type = %other, "Unhandled client notification"),
            },
        }
    }

    fn command(&self, command: ClientCommand) {
        let _ = self.broadcast_tx.send(SessionEvent::Command { command });
    }

    /// Spawn the search as a background task, superseding any running one
    fn spawn_search(&mut self, brand: String) {
        if let Some(previous) = self.search_cancel_token.take() {
            previous.cancel();
        }
        let cancel_token = CancellationToken::new();
        self.search_cancel_token = Some(cancel_token.clone());

        let search = self.search.clone();
        let event_tx = self.event_tx.clone();
        let requester = self
            .context
            .case_id
            .clone()
            .unwrap_or_else(|| self.context.session_id.clone());
        let query = SearchQuery::new(brand.clone());

        tokio::spawn(async move {
            tracing::info!(brand = %brand, "Running trademark search (background)");

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(brand = %brand, "Trademark search cancelled");
                }

                result = search.search(&requester, &query) => {
                    let outcome = match result {
                        Ok(summary) => SearchOutcome::Found(summary.to_context_text()),
                        Err(e) => SearchOutcome::Failed(e.to_string()),
                    };
                    let _ = event_tx.send(Event::SearchFinished { brand, outcome }).await;
                }
            }
        });
    }

    fn record(&mut self, role: Role, text: String) {
        self.messages.push(TranscriptMessage { role, text });
        let flush_tx = self.flush_tx.clone();
        self.debouncer.trigger(async move {
            let _ = flush_tx.send(()).await;
        });
    }

    async fn flush_transcript(&mut self) {
        let lines = self.pairer.collect(&self.messages);
        if lines.is_empty() {
            return;
        }
        if let Err(e) = self.sink.append(&self.context.session_id, &lines).await {
            tracing::error!(error = %e, "Failed to persist transcript");
            let _ = self.broadcast_tx.send(SessionEvent::Error {
                message: format!("Failed to save transcript: {e}"),
            });
        }
    }
}
