use serde::{Deserialize, Serialize};

/// A request body that one of the council streaming endpoints accepts.
///
/// Both endpoints answer with the same framed event stream, so the consumer
/// only needs to know where to send the body.
pub trait StreamRequest: Serialize + Send + Sync {
    /// Path of the endpoint relative to the API base URL.
    fn path(&self, conversation_id: &str) -> String;

    /// The user's message text.
    fn content(&self) -> &str;
}

/// Requested verbosity of the synthesized answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Simple,
    Detailed,
}

/// Scope of a deliberation: which advisors take part and what context they
/// receive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliberationScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default)]
    pub department_ids: Vec<String>,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub playbook_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Full three-stage council deliberation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    #[serde(flatten)]
    pub scope: DeliberationScope,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<ResponseMode>,
}

/// Follow-up chat answered by the synthesizer alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(flatten)]
    pub scope: DeliberationScope,
}

impl MessageRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            scope: DeliberationScope::default(),
            attachment_ids: Vec::new(),
            response_mode: None,
        }
    }

    pub fn with_scope(mut self, scope: DeliberationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_attachments(mut self, attachment_ids: Vec<String>) -> Self {
        self.attachment_ids = attachment_ids;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = Some(mode);
        self
    }
}

impl ChatRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            scope: DeliberationScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: DeliberationScope) -> Self {
        self.scope = scope;
        self
    }
}

impl StreamRequest for MessageRequest {
    fn path(&self, conversation_id: &str) -> String {
        format!("conversations/{}/message/stream", conversation_id)
    }

    fn content(&self) -> &str {
        &self.content
    }
}

impl StreamRequest for ChatRequest {
    fn path(&self, conversation_id: &str) -> String {
        format!("conversations/{}/chat/stream", conversation_id)
    }

    fn content(&self) -> &str {
        &self.content
    }
}
