use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Wire `type` values that map onto a typed variant.
const KNOWN_TYPES: &[&str] = &[
    "stage1_start",
    "stage1_token",
    "stage1_model_complete",
    "stage1_complete",
    "stage2_start",
    "stage2_token",
    "stage2_complete",
    "stage3_start",
    "stage3_token",
    "stage3_complete",
    "title_complete",
    "complete",
    "error",
];

/// Type of the event synthesized locally on cancellation. The server may not
/// send it.
const CANCELLED_TYPE: &str = "cancelled";

/// Typed view of a deliberation event.
///
/// Stage 1 carries a draft answer per participating model, stage 2 the
/// anonymised peer rankings, stage 3 the synthesized final answer. Any `type`
/// this crate does not know about is kept as [`EventKind::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Stage1Start,
    Stage1Token {
        #[serde(default)]
        model: String,
        #[serde(default)]
        content: String,
    },
    Stage1ModelComplete {
        #[serde(default)]
        model: String,
        #[serde(default)]
        response: Option<String>,
    },
    Stage1Complete {
        #[serde(default)]
        data: Vec<Stage1Response>,
    },
    Stage2Start,
    Stage2Token {
        #[serde(default)]
        model: String,
        #[serde(default)]
        content: String,
    },
    Stage2Complete {
        #[serde(default)]
        data: Vec<Stage2Ranking>,
        #[serde(default)]
        metadata: Option<Stage2Metadata>,
    },
    Stage3Start,
    Stage3Token {
        #[serde(default)]
        content: String,
    },
    Stage3Complete {
        #[serde(default)]
        data: Stage3Result,
    },
    TitleComplete {
        #[serde(default)]
        data: TitleData,
    },
    /// Server-side end of the deliberation.
    Complete,
    /// Server-side failure reported inside the stream.
    Error {
        #[serde(default)]
        message: String,
    },
    /// Synthesized locally when the caller cancels the session.
    #[serde(skip)]
    Cancelled,
    /// A `type` this crate has no variant for. Consumers treat it as a no-op.
    #[serde(skip)]
    Unknown { event_type: String },
}

/// One event of a deliberation: its typed view plus the payload exactly as
/// the server sent it, minus the `type` key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliberationEvent {
    kind: EventKind,
    payload: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage1Response {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage2Ranking {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub ranking: String,
    #[serde(default)]
    pub parsed_ranking: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage2Metadata {
    /// Anonymous label ("Response A") to model identifier.
    #[serde(default)]
    pub label_to_model: HashMap<String, String>,
    #[serde(default)]
    pub aggregate_rankings: Vec<AggregateRanking>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub average_rank: f64,
    #[serde(default)]
    pub rankings_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage3Result {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleData {
    #[serde(default)]
    pub title: String,
}

/// Why a `data:` payload could not become an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    NotAnObject,
    MissingType,
    /// The payload claims a type only this crate may produce.
    ReservedType(String),
}

impl std::fmt::Display for EventDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "payload is not a JSON object"),
            Self::MissingType => write!(f, "payload has no string `type` field"),
            Self::ReservedType(t) => write!(f, "event type `{}` is reserved", t),
        }
    }
}

impl EventKind {
    /// The wire discriminator of this kind.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Stage1Start => "stage1_start",
            Self::Stage1Token { .. } => "stage1_token",
            Self::Stage1ModelComplete { .. } => "stage1_model_complete",
            Self::Stage1Complete { .. } => "stage1_complete",
            Self::Stage2Start => "stage2_start",
            Self::Stage2Token { .. } => "stage2_token",
            Self::Stage2Complete { .. } => "stage2_complete",
            Self::Stage3Start => "stage3_start",
            Self::Stage3Token { .. } => "stage3_token",
            Self::Stage3Complete { .. } => "stage3_complete",
            Self::TitleComplete { .. } => "title_complete",
            Self::Complete => "complete",
            Self::Error { .. } => "error",
            Self::Cancelled => CANCELLED_TYPE,
            Self::Unknown { event_type } => event_type,
        }
    }

    /// Deliberation stage (1-3) the event belongs to, if any.
    pub fn stage(&self) -> Option<u8> {
        match self {
            Self::Stage1Start
            | Self::Stage1Token { .. }
            | Self::Stage1ModelComplete { .. }
            | Self::Stage1Complete { .. } => Some(1),
            Self::Stage2Start | Self::Stage2Token { .. } | Self::Stage2Complete { .. } => Some(2),
            Self::Stage3Start | Self::Stage3Token { .. } | Self::Stage3Complete { .. } => Some(3),
            _ => None,
        }
    }
}

impl DeliberationEvent {
    /// Build an event from a decoded JSON value.
    ///
    /// The payload is kept untouched. A known `type` whose fields do not fit
    /// the typed shape gets the `Unknown` kind so the payload still reaches
    /// the caller.
    pub fn from_value(mut value: Value) -> Result<Self, EventDecodeError> {
        let event_type = match value.as_object().map(|o| o.get("type")) {
            None => return Err(EventDecodeError::NotAnObject),
            Some(Some(Value::String(t))) => t.clone(),
            Some(_) => return Err(EventDecodeError::MissingType),
        };

        if event_type == CANCELLED_TYPE {
            return Err(EventDecodeError::ReservedType(event_type));
        }

        let kind = if KNOWN_TYPES.contains(&event_type.as_str()) {
            EventKind::deserialize(&value).unwrap_or_else(|e| {
                warn!(%event_type, error = %e, "Event payload does not match its type, keeping it untyped");
                EventKind::Unknown {
                    event_type: event_type.clone(),
                }
            })
        } else {
            EventKind::Unknown { event_type }
        };

        if let Some(object) = value.as_object_mut() {
            object.remove("type");
        }
        let Value::Object(payload) = value else {
            return Err(EventDecodeError::NotAnObject);
        };

        Ok(Self { kind, payload })
    }

    /// The event delivered once when a session is cancelled.
    pub(crate) fn cancelled() -> Self {
        Self {
            kind: EventKind::Cancelled,
            payload: Map::new(),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn into_kind(self) -> EventKind {
        self.kind
    }

    /// The wire discriminator of this event.
    pub fn event_type(&self) -> &str {
        self.kind.event_type()
    }

    /// The event's fields as received, without the `type` key.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Whether this event ends the deliberation from the caller's view.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Complete | EventKind::Error { .. } | EventKind::Cancelled
        )
    }

    pub fn stage(&self) -> Option<u8> {
        self.kind.stage()
    }
}
