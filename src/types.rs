use serde::{Deserialize, Serialize};

/// Point-in-time read of a page's interactive surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub has_search_field: bool,
    pub search_field_label: Option<String>,
    pub button_labels: Vec<String>,
    pub link_labels: Vec<String>,
}

/// What the initial spoken command asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    DestinationPage(String),
    GenericQuestion(String),
}

/// One interpreted next step of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    TypeInSearch(String),
    ClickButton(String),
    Stop,
    Unrecognized,
}

/// Live loop state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub current_address: String,
    pub last_snapshot: PageSnapshot,
    pub terminated: bool,
}

impl Session {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            current_address: address.into(),
            last_snapshot: PageSnapshot::default(),
            terminated: false,
        }
    }

    /// Record a fresh inspection. Address and snapshot always move together.
    pub fn observe(&mut self, address: impl Into<String>, snapshot: PageSnapshot) {
        self.current_address = address.into();
        self.last_snapshot = snapshot;
    }
}

/// States of the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Start,
    /// Describe the page at `address` and inspect it.
    Summarizing { address: String },
    AwaitingReply,
    Interpreting { reply: String },
    Actuating { action: Action },
    /// `before` identifies the page the action was performed on.
    Reinspecting { before: Option<String> },
    Terminated,
    Failed { reason: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Failed { .. })
    }
}

/// How a session run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Events streamed to web clients while the agent talks and acts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    SessionStarted { address: String },
    Spoke { text: String },
    Heard { text: String },
    Action { description: String },
    Answer { text: String },
    SessionEnded { outcome: String },
}
