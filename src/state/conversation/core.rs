use super::streaming::StreamOutcome;
use super::{ConversationManager, SessionUpdate};
use crate::api::ByteStream;
use crate::state::TurnState;
use crate::types::{ApiMessage, ApprovalChoice, ApprovalRequest};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

impl ConversationManager {
    /// Starts a turn and consumes its stream. Returns once the stream closes:
    /// either the turn is over, or it is paused on an interrupt.
    pub async fn send_user_message(&mut self, text: impl Into<String>) -> Result<()> {
        self.coordinator.begin_turn()?;
        self.api_messages.push(ApiMessage::user(text));

        let stream = self
            .client
            .create_stream(&self.thread_id, &self.api_messages)
            .await
            .context("Failed to start agent turn");
        match stream {
            Ok(stream) => self.run_turn_stream(stream).await,
            Err(error) => Err(self.fail_turn(error)),
        }
    }

    pub async fn approve_interrupt(&mut self) -> Result<()> {
        self.resolve_interrupt(ApprovalChoice::Approve, None).await
    }

    pub async fn reject_interrupt(&mut self) -> Result<()> {
        self.resolve_interrupt(ApprovalChoice::Reject, None).await
    }

    /// Applies the decision locally, tells the server, then consumes the
    /// continuation of the turn.
    pub async fn resolve_interrupt(
        &mut self,
        choice: ApprovalChoice,
        additional_data: Option<String>,
    ) -> Result<()> {
        let interrupt = self.coordinator.resolve(choice)?;

        if let Some(document_id) = interrupt.target_document_id.as_deref() {
            let cleared = match choice {
                ApprovalChoice::Approve => self.previews.confirm(&mut self.workspace, document_id),
                ApprovalChoice::Reject => self.previews.discard(&mut self.workspace, document_id),
            };
            if cleared.is_some() {
                self.emit(SessionUpdate::PreviewCleared {
                    document_id: document_id.to_string(),
                    committed: choice == ApprovalChoice::Approve,
                });
            }
        }
        self.emit(SessionUpdate::InterruptResolved {
            interrupt_id: interrupt.id.clone(),
            choice,
        });
        tracing::info!(interrupt_id = %interrupt.id, choice = choice.wire_value(), "posting approval");

        let request = ApprovalRequest {
            interrupt_id: interrupt.id,
            choice,
            additional_data,
        };
        let stream = self
            .client
            .resume_stream(&self.thread_id, &request)
            .await
            .context("Failed to post approval");
        match stream {
            Ok(stream) => self.run_turn_stream(stream).await,
            Err(error) => Err(self.fail_turn(error)),
        }
    }

    /// Aborts the running turn. While a stream is being consumed use a
    /// [`ConversationManager::cancel_handle`] clone instead; this method
    /// covers a turn paused on an interrupt.
    pub fn cancel_turn(&mut self) {
        match self.coordinator.state() {
            TurnState::Idle => {}
            TurnState::Streaming => self.cancel.cancel(),
            TurnState::PausedForApproval => {
                self.cancel.cancel();
                tracing::info!(thread_id = %self.thread_id, "paused turn cancelled");
                self.end_turn();
            }
        }
    }

    async fn run_turn_stream(&mut self, stream: ByteStream) -> Result<()> {
        match self.consume_stream(stream).await {
            Ok(StreamOutcome::Closed) if self.coordinator.state() == TurnState::PausedForApproval => {
                Ok(())
            }
            Ok(StreamOutcome::Closed) | Ok(StreamOutcome::Cancelled) => {
                self.end_turn();
                Ok(())
            }
            Err(error) => Err(self.fail_turn(error.context("Agent stream failed"))),
        }
    }

    /// Transport failures are reported but never leave the session stuck.
    fn fail_turn(&mut self, error: anyhow::Error) -> anyhow::Error {
        tracing::warn!(error = %format!("{error:#}"), "turn failed");
        self.emit(SessionUpdate::Error(format!("{error:#}")));
        self.end_turn();
        error
    }

    /// Finalizes the last message, rolls back previews nobody confirmed and
    /// returns to idle.
    pub(super) fn end_turn(&mut self) {
        self.finish_current_message();
        for preview in self.previews.discard_all(&mut self.workspace) {
            tracing::debug!(document_id = %preview.document_id, "rolling back unconfirmed preview");
            self.emit(SessionUpdate::PreviewCleared {
                document_id: preview.document_id,
                committed: false,
            });
        }
        self.coordinator.finish_turn();
        self.unavailable_targets.clear();
        self.cancel = CancellationToken::new();
        self.emit(SessionUpdate::TurnComplete);
    }
}
