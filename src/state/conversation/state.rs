use super::super::interrupt::{Interrupt, InterruptCoordinator, TurnState};
use super::super::message::AiMessage;
use super::super::workspace::Workspace;
use crate::api::{ApiClient, DocumentBackend};
use crate::config::Config;
use crate::tool_preview::PreviewEngine;
use crate::types::{ApiMessage, ApprovalChoice};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a front end needs to redraw, pushed as it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    MessageUpdated {
        message_id: String,
        delta: String,
    },
    MessageFinished {
        message_id: String,
    },
    ToolCallUpdated {
        message_id: String,
        index: usize,
        name: Option<String>,
        raw_args: String,
        loading: bool,
    },
    PreviewStaged {
        document_id: String,
        tool_call_id: Option<String>,
    },
    PreviewCleared {
        document_id: String,
        committed: bool,
    },
    InterruptRaised(Interrupt),
    InterruptResolved {
        interrupt_id: String,
        choice: ApprovalChoice,
    },
    RefreshFileTree,
    Warning(String),
    Error(String),
    TurnComplete,
}

/// One editing session: the documents, the agent conversation and the turn
/// currently in flight.
pub struct ConversationManager {
    pub(super) client: Arc<ApiClient>,
    pub(super) documents: Arc<dyn DocumentBackend>,
    pub(super) workspace: Workspace,
    pub(super) previews: PreviewEngine,
    pub(super) coordinator: InterruptCoordinator,
    pub(super) api_messages: Vec<ApiMessage>,
    pub(super) ai_messages: Vec<AiMessage>,
    pub(super) thread_id: String,
    pub(super) cancel: CancellationToken,
    /// Preview targets that could not be loaded this turn.
    pub(super) unavailable_targets: HashSet<String>,
    pub(super) updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

impl ConversationManager {
    pub fn new(client: ApiClient, documents: Arc<dyn DocumentBackend>, config: &Config) -> Self {
        Self {
            client: Arc::new(client),
            documents,
            workspace: Workspace::new(),
            previews: PreviewEngine::new(
                config.document_extension.clone(),
                config.diff_context_lines,
            ),
            coordinator: InterruptCoordinator::new(),
            api_messages: Vec::new(),
            ai_messages: Vec::new(),
            thread_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            unavailable_targets: HashSet::new(),
            updates: None,
        }
    }

    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<SessionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn previews(&self) -> &PreviewEngine {
        &self.previews
    }

    pub fn messages(&self) -> &[AiMessage] {
        &self.ai_messages
    }

    pub fn api_messages(&self) -> &[ApiMessage] {
        &self.api_messages
    }

    pub fn interrupt(&self) -> Option<&Interrupt> {
        self.coordinator.active()
    }

    pub fn state(&self) -> TurnState {
        self.coordinator.state()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Token for the running turn. Clone it before awaiting a turn to be able
    /// to cancel from elsewhere; a fresh token is issued when the turn ends.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
