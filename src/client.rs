use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{CouncilError, Result};
use crate::models::StreamRequest;
use crate::registry::SessionRegistry;
use crate::streaming::{DeliberationStream, EventHandler, SessionId, SessionOutcome};
use crate::transport::TransportReader;

/// Options for a callback-driven session.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Token shared with the caller; a fresh one is created when absent.
    pub cancel: Option<CancellationToken>,
}

/// Client for the council streaming endpoints.
///
/// Every streaming endpoint answers with the same framed event body, so a
/// single code path serves them all; the [`StreamRequest`] decides where the
/// body is sent.
#[derive(Clone)]
pub struct CouncilClient {
    client: Client,
    config: ClientConfig,
    registry: SessionRegistry,
}

impl CouncilClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        // Sessions run until the server closes them, so only connecting is
        // bounded.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.api.connect_timeout_secs))
            .build()
            .map_err(|e| {
                CouncilError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            registry: SessionRegistry::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sessions started with [`initiate`](Self::initiate) that are still running.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send `request` and return the session as a pull-based event stream.
    ///
    /// Fails if the request cannot be sent or the server answers with a
    /// non-success status. If `cancel` fires before the response arrives the
    /// returned stream yields only the cancellation event.
    pub async fn open<R>(
        &self,
        conversation_id: &str,
        request: &R,
        cancel: CancellationToken,
    ) -> Result<DeliberationStream>
    where
        R: StreamRequest,
    {
        if conversation_id.trim().is_empty() {
            return Err(CouncilError::InvalidRequest(
                "Conversation id is empty".to_string(),
            ));
        }

        if request.content().trim().is_empty() {
            return Err(CouncilError::InvalidRequest(
                "Message content is empty".to_string(),
            ));
        }

        let url = self.endpoint(&request.path(conversation_id));
        let body = serde_json::to_vec(request)?;

        info!(
            conversation_id = %conversation_id,
            "Council: Sending {} bytes to: {}",
            body.len(),
            url
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(body);

        if let Some(token) = &self.config.api.token {
            builder = builder.bearer_auth(token);
        }

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            response = builder.send() => Some(response),
        };

        let Some(response) = sent else {
            debug!(conversation_id = %conversation_id, "Cancelled before the response arrived");
            return Ok(self.stream(conversation_id, TransportReader::empty(), cancel));
        };

        let response = response
            .map_err(|e| CouncilError::TransportError(format!("Council request failed: {}", e)))?;

        let status = response.status();
        info!("Council responded with status: {}", status);

        if !status.is_success() {
            let error_body = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                text = response.text() => Some(text.unwrap_or_else(|_| "Unknown error".to_string())),
            };

            let Some(error_body) = error_body else {
                debug!(conversation_id = %conversation_id, "Cancelled while reading the error body");
                return Ok(self.stream(conversation_id, TransportReader::empty(), cancel));
            };

            return Err(CouncilError::HttpStatus {
                status: status.as_u16(),
                body: error_body,
            });
        }

        if response.content_length() == Some(0) {
            return Err(CouncilError::MissingBody);
        }

        Ok(self.stream(
            conversation_id,
            TransportReader::from_response(response),
            cancel,
        ))
    }

    /// Start a session in the background and deliver its events to `handler`.
    ///
    /// The handler sees every decoded event in order, including the
    /// `cancelled` event when the session is cancelled. Transport failures
    /// come back from [`StreamHandle::wait`].
    pub fn initiate<R, H>(
        &self,
        conversation_id: &str,
        request: R,
        mut handler: H,
        options: StreamOptions,
    ) -> StreamHandle
    where
        R: StreamRequest + 'static,
        H: EventHandler + 'static,
    {
        let cancel = options.cancel.unwrap_or_default();
        let session_id = self
            .registry
            .register_with_token(conversation_id, cancel.clone());

        let client = self.clone();
        let conversation_id = conversation_id.to_string();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            // Dropped when the task ends, panics included.
            let _registration = Registration {
                registry: client.registry.clone(),
                session_id,
            };

            match client.open(&conversation_id, &request, task_cancel).await {
                Ok(stream) => stream.with_session_id(session_id).dispatch(&mut handler).await,
                Err(e) => Err(e),
            }
        });

        StreamHandle {
            session_id,
            cancel,
            join,
        }
    }

    /// Cancel every running session of a conversation.
    pub fn cancel_conversation(&self, conversation_id: &str) -> usize {
        self.registry.cancel_conversation(conversation_id)
    }

    fn stream(
        &self,
        conversation_id: &str,
        transport: TransportReader,
        cancel: CancellationToken,
    ) -> DeliberationStream {
        DeliberationStream::new(conversation_id, transport, cancel, &self.config.stream)
    }
}

/// Registry entry of a spawned session, removed on drop.
struct Registration {
    registry: SessionRegistry,
    session_id: SessionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}

/// Handle to a session started with [`CouncilClient::initiate`].
pub struct StreamHandle {
    session_id: SessionId,
    cancel: CancellationToken,
    join: JoinHandle<Result<SessionOutcome>>,
}

impl StreamHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Abort the session. The handler receives one `cancelled` event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the session to end.
    pub async fn wait(self) -> Result<SessionOutcome> {
        self.join.await?
    }
}
