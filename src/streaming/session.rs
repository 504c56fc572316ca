use futures::Stream;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::{CouncilError, Result};
use crate::metrics::STREAM_METRICS;
use crate::models::DeliberationEvent;
use crate::streaming::decoder::Utf8Decoder;
use crate::streaming::frame::FrameAssembler;
use crate::streaming::parser::decode_frame;
use crate::transport::TransportReader;

pub type SessionId = Uuid;

/// Lifecycle of a stream session. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// Receives events from a session, in order, one at a time.
///
/// The read loop waits for each call to return before touching the next
/// frame, so handlers must not block for long.
pub trait EventHandler: Send {
    fn on_event(&mut self, event: &DeliberationEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&DeliberationEvent) + Send,
{
    fn on_event(&mut self, event: &DeliberationEvent) {
        self(event)
    }
}

/// Summary of a session that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub conversation_id: String,
    pub state: SessionState,
    pub events: usize,
    pub bytes_received: u64,
}

/// One streaming request turned into an ordered sequence of events.
///
/// Events are pulled with [`next_event`](Self::next_event). Cancelling the
/// token abandons the in-flight read and yields a single
/// [`EventKind::Cancelled`](crate::models::EventKind::Cancelled) event;
/// after any terminal state the stream only returns `None`.
pub struct DeliberationStream {
    session_id: SessionId,
    conversation_id: String,
    transport: TransportReader,
    decoder: Utf8Decoder,
    assembler: FrameAssembler,
    pending: VecDeque<DeliberationEvent>,
    cancel: CancellationToken,
    state: SessionState,
    end_of_stream: bool,
    events: usize,
}

impl DeliberationStream {
    pub fn new(
        conversation_id: impl Into<String>,
        transport: TransportReader,
        cancel: CancellationToken,
        config: &StreamConfig,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            transport,
            decoder: Utf8Decoder::new(),
            assembler: FrameAssembler::new(config.trailing_frame, config.max_frame_bytes),
            pending: VecDeque::new(),
            cancel,
            state: SessionState::Idle,
            end_of_stream: false,
            events: 0,
        }
    }

    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token that cancels this session when fired.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event in frame order, or `None` once the session has ended.
    pub async fn next_event(&mut self) -> Result<Option<DeliberationEvent>> {
        loop {
            if self.state.is_terminal() {
                return Ok(None);
            }

            if self.state == SessionState::Idle {
                self.state = SessionState::Streaming;
                STREAM_METRICS.record_session_started();
                debug!(
                    session_id = %self.session_id,
                    conversation_id = %self.conversation_id,
                    "Stream session started"
                );
            }

            if self.cancel.is_cancelled() {
                return Ok(Some(self.cancel_session()));
            }

            if let Some(event) = self.pending.pop_front() {
                self.events += 1;
                STREAM_METRICS.record_event_dispatched();
                return Ok(Some(event));
            }

            if let Some(frame) = self.assembler.next_frame() {
                self.decode(&frame);
                continue;
            }

            if self.end_of_stream {
                if let Some(frame) = self.assembler.finish() {
                    self.decode(&frame);
                    continue;
                }
                self.complete();
                return Ok(None);
            }

            let pulled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                chunk = self.transport.next_chunk() => Some(chunk),
            };

            let Some(chunk) = pulled else {
                return Ok(Some(self.cancel_session()));
            };

            match chunk {
                Ok(Some(bytes)) => {
                    STREAM_METRICS.record_bytes_received(bytes.len());
                    let text = self.decoder.decode(&bytes);
                    if let Err(e) = self.assembler.push(&text) {
                        return Err(self.fail(e));
                    }
                }
                Ok(None) => {
                    let tail = self.decoder.finish();
                    if let Err(e) = self.assembler.push(&tail) {
                        return Err(self.fail(e));
                    }
                    self.end_of_stream = true;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Drive the session to its end, handing every event to `handler`.
    ///
    /// Transport failures are returned as errors; cancellation is reported
    /// to the handler as a `cancelled` event and yields `Ok`.
    pub async fn dispatch<H>(mut self, handler: &mut H) -> Result<SessionOutcome>
    where
        H: EventHandler + ?Sized,
    {
        while let Some(event) = self.next_event().await? {
            handler.on_event(&event);
        }
        Ok(self.outcome())
    }

    /// Consume the session as a finite, single-pass stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<DeliberationEvent>> + Send {
        futures::stream::unfold(self, |mut session| async move {
            match session.next_event().await {
                Ok(Some(event)) => Some((Ok(event), session)),
                Ok(None) => None,
                Err(e) => Some((Err(e), session)),
            }
        })
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.session_id,
            conversation_id: self.conversation_id.clone(),
            state: self.state,
            events: self.events,
            bytes_received: self.transport.bytes_read(),
        }
    }

    fn decode(&mut self, frame: &str) {
        STREAM_METRICS.record_frame_assembled();
        let decoded = decode_frame(frame);
        if decoded.failures > 0 {
            STREAM_METRICS.record_decode_failures(decoded.failures);
        }
        self.pending.extend(decoded.events);
    }

    fn cancel_session(&mut self) -> DeliberationEvent {
        self.state = SessionState::Cancelled;
        self.pending.clear();
        self.events += 1;
        STREAM_METRICS.record_session_cancelled();
        STREAM_METRICS.record_event_dispatched();
        info!(
            session_id = %self.session_id,
            conversation_id = %self.conversation_id,
            events = self.events,
            "Stream session cancelled"
        );
        DeliberationEvent::cancelled()
    }

    fn complete(&mut self) {
        self.state = SessionState::Completed;
        STREAM_METRICS.record_session_completed();
        info!(
            session_id = %self.session_id,
            conversation_id = %self.conversation_id,
            events = self.events,
            bytes = self.transport.bytes_read(),
            "Stream session completed"
        );
    }

    fn fail(&mut self, error: CouncilError) -> CouncilError {
        self.state = SessionState::Errored;
        self.pending.clear();
        STREAM_METRICS.record_session_failed();
        warn!(
            session_id = %self.session_id,
            conversation_id = %self.conversation_id,
            error = %error,
            "Stream session failed"
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use bytes::Bytes;

    fn stream_of(chunks: Vec<&'static str>) -> DeliberationStream {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, CouncilError>(Bytes::from_static(c.as_bytes()))),
        );
        DeliberationStream::new(
            "conv-1",
            TransportReader::from_stream(body),
            CancellationToken::new(),
            &StreamConfig::default(),
        )
    }

    async fn next_kind(session: &mut DeliberationStream) -> Option<EventKind> {
        session.next_event().await.unwrap().map(DeliberationEvent::into_kind)
    }

    #[tokio::test]
    async fn test_state_transitions_to_completed() {
        let mut session = stream_of(vec!["data: {\"type\":\"complete\"}\n\n"]);
        assert_eq!(session.state(), SessionState::Idle);

        assert_eq!(next_kind(&mut session).await, Some(EventKind::Complete));
        assert_eq!(session.state(), SessionState::Streaming);

        assert!(session.next_event().await.unwrap().is_none());
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_start_yields_single_event() {
        let mut session = stream_of(vec!["data: {\"type\":\"stage1_start\"}\n\n"]);
        session.cancellation_token().cancel();

        assert_eq!(next_kind(&mut session).await, Some(EventKind::Cancelled));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.next_event().await.unwrap().is_none());
        assert_eq!(session.outcome().events, 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_events() {
        let mut session = stream_of(vec![
            "data: {\"type\":\"stage1_start\"}\n\ndata: {\"type\":\"stage2_start\"}\n\n",
        ]);

        assert_eq!(next_kind(&mut session).await, Some(EventKind::Stage1Start));
        session.cancellation_token().cancel();

        assert_eq!(next_kind(&mut session).await, Some(EventKind::Cancelled));
        assert!(session.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_cannot_fake_cancellation() {
        let mut session = stream_of(vec![
            "data: {\"type\":\"cancelled\"}\n\ndata: {\"type\":\"stage1_start\"}\n\n",
        ]);

        assert_eq!(next_kind(&mut session).await, Some(EventKind::Stage1Start));
        assert_eq!(session.state(), SessionState::Streaming);

        session.cancellation_token().cancel();
        assert_eq!(next_kind(&mut session).await, Some(EventKind::Cancelled));
        assert!(session.next_event().await.unwrap().is_none());
        assert_eq!(session.outcome().events, 2);
    }

    #[tokio::test]
    async fn test_transport_error_moves_to_errored() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"stage1_start\"}\n\n")),
            Err(CouncilError::TransportError("reset".to_string())),
        ]);
        let mut session = DeliberationStream::new(
            "conv-1",
            TransportReader::from_stream(body),
            CancellationToken::new(),
            &StreamConfig::default(),
        );

        assert!(session.next_event().await.unwrap().is_some());
        assert!(session.next_event().await.is_err());
        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_with_closure() {
        let session = stream_of(vec![
            "data: {\"type\":\"stage3_start\"}\n\n",
            "data: {\"type\":\"stage3_token\",\"content\":\"ok\"}\n\ndata: {\"type\":\"complete\"}\n\n",
        ]);

        let mut seen = Vec::new();
        let outcome = session
            .dispatch(&mut |event: &DeliberationEvent| seen.push(event.event_type().to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["stage3_start", "stage3_token", "complete"]);
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.events, 3);
        assert_eq!(outcome.conversation_id, "conv-1");
    }
}
