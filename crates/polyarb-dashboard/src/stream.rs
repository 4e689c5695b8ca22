//! Per-connection event stream.
//!
//! A `StreamHandler` moves through `Connecting -> Streaming -> Closed`:
//! the first frame is the `init` event, then it forwards queued events and
//! writes a keepalive comment whenever the queue stays idle for the
//! keepalive interval. The transport reports a failed write by dropping the
//! handler, which unsubscribes it.

use std::convert::Infallible;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tracing::{debug, warn};

use crate::broadcast::{BroadcastHub, Recv, Subscriber};
use crate::error::DashboardResult;
use crate::state::SharedState;
use crate::types::Event;

/// Default idle interval before a keepalive frame.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// Default number of log lines replayed on connect.
pub const DEFAULT_LOG_REPLAY: usize = 200;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Streaming,
    Closed,
}

/// One unit written to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(Event),
    Keepalive,
}

impl Frame {
    /// Encode as an SSE frame.
    pub fn encode(&self) -> DashboardResult<String> {
        match self {
            Frame::Event(event) => Ok(format!(
                "event: {}\ndata: {}\n\n",
                event.kind().as_str(),
                event.data_json()?
            )),
            Frame::Keepalive => Ok(": keepalive\n\n".to_string()),
        }
    }
}

/// Per-viewer control loop.
pub struct StreamHandler {
    hub: BroadcastHub,
    subscriber: Subscriber,
    init: Option<Event>,
    keepalive: Duration,
    conn_state: ConnState,
}

impl StreamHandler {
    /// Capture the initial state and subscribe.
    pub fn connect(state: &SharedState, log_replay: usize, keepalive: Duration) -> Self {
        let (init, subscriber) = state.open_stream(log_replay);
        Self {
            hub: state.hub().clone(),
            subscriber,
            init: Some(init),
            keepalive,
            conn_state: ConnState::Connecting,
        }
    }

    pub fn conn_state(&self) -> ConnState {
        self.conn_state
    }

    /// Next frame to write, or `None` once closed.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.conn_state {
            ConnState::Closed => None,
            ConnState::Connecting => {
                self.conn_state = ConnState::Streaming;
                self.init.take().map(Frame::Event)
            }
            ConnState::Streaming => match self.subscriber.recv_timeout(self.keepalive).await {
                Recv::Event(event) => Some(Frame::Event(event)),
                Recv::Idle => Some(Frame::Keepalive),
                Recv::Closed => {
                    debug!("Viewer dropped by hub, closing stream");
                    self.close();
                    None
                }
            },
        }
    }

    /// Enter `Closed` and unsubscribe. Idempotent.
    pub fn close(&mut self) {
        if self.conn_state != ConnState::Closed {
            self.conn_state = ConnState::Closed;
            self.hub.unsubscribe(&mut self.subscriber);
        }
    }

    /// Turn the handler into a body stream of encoded frames.
    ///
    /// Frames that fail to encode are skipped; the stream continues.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<String, Infallible>> + Send {
        stream::unfold(self, |mut handler| async move {
            loop {
                let frame = handler.next_frame().await?;
                match frame.encode() {
                    Ok(bytes) => return Some((Ok::<_, Infallible>(bytes), handler)),
                    Err(e) => warn!(error = %e, "Skipping dashboard event that failed to encode"),
                }
            }
        })
    }
}

impl Drop for StreamHandler {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandler")
            .field("conn_state", &self.conn_state)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BotStatus;
    use futures_util::StreamExt;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    const FAST: Duration = Duration::from_millis(20);

    async fn expect_event(handler: &mut StreamHandler) -> Event {
        match handler.next_frame().await {
            Some(Frame::Event(event)) => event,
            other => panic!("expected event frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_init_is_first_frame() {
        let state = SharedState::default();
        state.update([("status", json!("scanning"))]);
        state.append_log("window 1");

        let mut handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        assert_eq!(handler.conn_state(), ConnState::Connecting);

        match expect_event(&mut handler).await {
            Event::Init { state: snapshot, logs } => {
                assert_eq!(snapshot.status(), Some(BotStatus::Scanning));
                assert_eq!(logs, vec!["window 1".to_string()]);
            }
            other => panic!("expected init, got {other:?}"),
        }
        assert_eq!(handler.conn_state(), ConnState::Streaming);
    }

    #[tokio::test]
    async fn test_idle_queue_yields_keepalive() {
        let state = SharedState::default();
        let mut handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        expect_event(&mut handler).await;

        assert_eq!(handler.next_frame().await, Some(Frame::Keepalive));
        assert_eq!(handler.conn_state(), ConnState::Streaming);

        state.append_log("after idle");
        assert_eq!(
            handler.next_frame().await,
            Some(Frame::Event(Event::Log("after idle".to_string())))
        );
    }

    #[tokio::test]
    async fn test_streaming_waits_until_event_published() {
        let state = SharedState::default();
        let mut handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, DEFAULT_KEEPALIVE);

        {
            let mut first = task::spawn(handler.next_frame());
            assert!(matches!(
                first.poll(),
                std::task::Poll::Ready(Some(Frame::Event(Event::Init { .. })))
            ));
        }

        let mut next = task::spawn(handler.next_frame());
        assert_pending!(next.poll());

        state.append_log("wake");
        assert!(next.is_woken());
        assert_ready_eq!(
            next.poll(),
            Some(Frame::Event(Event::Log("wake".to_string())))
        );
    }

    #[tokio::test]
    async fn test_mid_stream_viewer_sees_state_at_connect_time() {
        let state = SharedState::default();
        state.update([("status", json!("scanning"))]);
        state.append_log("window 1");

        let mut viewer_a = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        match expect_event(&mut viewer_a).await {
            Event::Init { state: snapshot, logs } => {
                assert_eq!(snapshot.status(), Some(BotStatus::Scanning));
                assert_eq!(logs, vec!["window 1".to_string()]);
            }
            other => panic!("expected init, got {other:?}"),
        }

        state.update([("status", json!("trading")), ("combined_ask", json!(0.97))]);
        match expect_event(&mut viewer_a).await {
            Event::State(snapshot) => {
                assert_eq!(snapshot.status(), Some(BotStatus::Trading));
                assert_eq!(snapshot.get("combined_ask"), Some(&json!(0.97)));
            }
            other => panic!("expected state, got {other:?}"),
        }

        let mut viewer_b = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        match expect_event(&mut viewer_b).await {
            Event::Init { state: snapshot, .. } => {
                assert_eq!(snapshot.status(), Some(BotStatus::Trading));
            }
            other => panic!("expected init, got {other:?}"),
        }
        assert_eq!(state.hub().subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_evicted_viewer_closes_after_draining() {
        let state = SharedState::new(BroadcastHub::new(2), 500);
        let mut handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        expect_event(&mut handler).await;

        for n in 0..3 {
            state.append_log(format!("burst {n}"));
        }
        assert_eq!(state.hub().subscriber_count(), 0);

        assert_eq!(expect_event(&mut handler).await, Event::Log("burst 0".into()));
        assert_eq!(expect_event(&mut handler).await, Event::Log("burst 1".into()));
        assert_eq!(handler.next_frame().await, None);
        assert_eq!(handler.conn_state(), ConnState::Closed);
        assert_eq!(handler.next_frame().await, None);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let state = SharedState::default();
        let handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        assert_eq!(state.hub().subscriber_count(), 1);

        drop(handler);
        assert_eq!(state.hub().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let state = SharedState::default();
        let mut handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        handler.close();
        handler.close();
        assert_eq!(handler.conn_state(), ConnState::Closed);
        assert_eq!(handler.next_frame().await, None);
        assert_eq!(state.hub().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_body_stream_frames() {
        let state = SharedState::default();
        state.append_log("boot");
        let handler = StreamHandler::connect(&state, DEFAULT_LOG_REPLAY, FAST);
        let mut body = Box::pin(handler.into_body_stream());

        let init = body.next().await.unwrap().unwrap();
        assert!(init.starts_with("event: init\ndata: {\"state\":{\"status\":\"starting\""));
        assert!(init.ends_with(",\"logs\":[\"boot\"]}\n\n"));

        state.append_log("next");
        assert_eq!(
            body.next().await.unwrap().unwrap(),
            "event: log\ndata: \"next\"\n\n"
        );
        assert_eq!(body.next().await.unwrap().unwrap(), ": keepalive\n\n");

        drop(body);
        assert_eq!(state.hub().subscriber_count(), 0);
    }

    #[test]
    fn test_frame_encoding() {
        assert_eq!(Frame::Keepalive.encode().unwrap(), ": keepalive\n\n");

        let state = SharedState::default();
        let frame = Frame::Event(Event::State(std::sync::Arc::new(state.snapshot())));
        let encoded = frame.encode().unwrap();
        assert!(encoded.starts_with("event: state\ndata: {"));
        assert!(encoded.ends_with("}\n\n"));
        assert_eq!(encoded.matches('\n').count(), 3);
    }
}
