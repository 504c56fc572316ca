//! # Council Stream
//!
//! A streaming client for multi-model council deliberations.
//!
//! ## Overview
//!
//! A council server answers a question in three stages, all streamed over a
//! single long-lived HTTP response:
//! - **Stage 1** - every participating model drafts an answer
//! - **Stage 2** - the models review and rank each other's anonymised drafts
//! - **Stage 3** - a synthesizer writes the final answer
//!
//! This library turns that response body into an ordered sequence of typed
//! [`DeliberationEvent`]s:
//! - Stateful UTF-8 decoding across chunk boundaries
//! - Reassembly of blank-line delimited frames split across chunks
//! - Tolerant decoding of `data:` payload lines (bad lines are skipped)
//! - Mid-stream cancellation with a single synthesized `cancelled` event
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use council_stream::{ClientConfig, CouncilClient, MessageRequest, StreamOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CouncilClient::new(ClientConfig::from_env()?)?;
//!
//! let handle = client.initiate(
//!     "conversation-id",
//!     MessageRequest::new("Should we open a second warehouse?"),
//!     |event: &council_stream::DeliberationEvent| {
//!         println!("{} {:?}", event.event_type(), event.payload());
//!     },
//!     StreamOptions::default(),
//! );
//!
//! let outcome = handle.wait().await?;
//! println!("{} events", outcome.events);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, callback sessions and handles
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and handling
//! - [`metrics`] - Process-wide stream counters
//! - [`models`] - Request bodies and deliberation events
//! - [`registry`] - Cancellation handles of running sessions
//! - [`streaming`] - Decoder, frame assembler, event parser and session loop
//! - [`transport`] - Chunk reader over a response body

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod streaming;
pub mod transport;

pub use client::{CouncilClient, StreamHandle, StreamOptions};
pub use config::{ClientConfig, TrailingFramePolicy};
pub use error::{CouncilError, Result};
pub use models::{
    ChatRequest, DeliberationEvent, DeliberationScope, EventKind, MessageRequest, ResponseMode,
};
pub use streaming::{DeliberationStream, EventHandler, SessionOutcome, SessionState};
