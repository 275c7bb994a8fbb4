//! Server-Sent Events support

use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream; the stream ends after `ended`
pub fn sse_stream(
    init_event: SessionEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(to_axum(&init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx)
        .filter_map(Result::ok) // Skip lagged messages
        .take_while(|event| !matches!(event, SessionEvent::Ended))
        .map(|event| Ok(to_axum(&event)));

    let ended = futures::stream::once(async { Ok(to_axum(&SessionEvent::Ended)) });

    Sse::new(init.chain(broadcasts).chain(ended)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_axum(event: &SessionEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

pub(crate) fn event_payload(event: &SessionEvent) -> (&'static str, Value) {
    match event {
        SessionEvent::Init {
            session_id,
            case_id,
            state,
        } => (
            "init",
            json!({
                "type": "init",
                "session_id": session_id,
                "case_id": case_id,
                "state": state
            }),
        ),
        SessionEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        SessionEvent::Command { command } => (
            "command",
            json!({
                "type": "command",
                "command": command
            }),
        ),
        SessionEvent::Transcript { role, text } => (
            "transcript",
            json!({
                "type": "transcript",
                "role": role,
                "text": text
            }),
        ),
        SessionEvent::Search { data } => (
            "search",
            json!({
                "type": "search",
                "search": data
            }),
        ),
        SessionEvent::Ended => ("ended", json!({ "type": "ended" })),
        SessionEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}
