use super::super::interrupt::Interrupt;
use super::super::message::AiMessage;
use super::{ConversationManager, SessionUpdate};
use crate::api::stream::StreamParser;
use crate::api::ByteStream;
use crate::types::{ApiMessage, MessageChunk, StreamEvent, ToolResultEvent};
use anyhow::Result;
use futures::StreamExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StreamOutcome {
    Closed,
    Cancelled,
}

impl ConversationManager {
    pub(super) fn emit(&self, update: SessionUpdate) {
        if let Some(tx) = &self.updates {
            let _ = tx.send(update);
        }
    }

    /// Reads the stream to its end (or until the turn is cancelled),
    /// dispatching every event as it is decoded.
    pub(super) async fn consume_stream(&mut self, mut stream: ByteStream) -> Result<StreamOutcome> {
        let cancel = self.cancel.clone();
        let mut parser = StreamParser::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(thread_id = %self.thread_id, "turn cancelled");
                    return Ok(StreamOutcome::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            for event in parser.process(&chunk) {
                self.handle_stream_event(event).await;
            }
        }

        if let Some(event) = parser.finish() {
            self.handle_stream_event(event).await;
        }
        Ok(StreamOutcome::Closed)
    }

    async fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::MessageChunk(chunk) => self.handle_message_chunk(chunk).await,
            StreamEvent::ToolResult(result) => self.handle_tool_result(result),
            StreamEvent::Interrupt(descriptor) => {
                let interrupt = Interrupt::from_descriptor(descriptor);
                self.preview_interrupt_target(&interrupt).await;
                match self.coordinator.pause(interrupt) {
                    Ok(active) => {
                        let raised = SessionUpdate::InterruptRaised(active.clone());
                        self.emit(raised);
                    }
                    Err(error) => self.emit(SessionUpdate::Warning(error.to_string())),
                }
            }
            StreamEvent::Unknown => {
                tracing::debug!("ignoring unknown stream event");
            }
        }
    }

    async fn handle_message_chunk(&mut self, chunk: MessageChunk) {
        let starts_new_message = self
            .ai_messages
            .last()
            .map_or(true, |message| message.is_finished() || message.id() != chunk.id);
        if starts_new_message {
            self.finish_current_message();
            self.ai_messages.push(AiMessage::new(chunk.id.clone()));
        }
        let Some(message) = self.ai_messages.last_mut() else {
            return;
        };

        if let Some(delta) = chunk.content.as_deref().filter(|delta| !delta.is_empty()) {
            message.append_content(delta);
            self.emit(SessionUpdate::MessageUpdated {
                message_id: chunk.id.clone(),
                delta: delta.to_string(),
            });
        }

        for tool_chunk in &chunk.tool_call_chunks {
            let Some(message) = self.ai_messages.last_mut() else {
                return;
            };
            let pending = message.push_tool_call_chunk(tool_chunk).clone();
            self.emit(SessionUpdate::ToolCallUpdated {
                message_id: chunk.id.clone(),
                index: pending.index,
                name: pending.name.clone(),
                raw_args: pending.raw_args.clone(),
                loading: pending.is_loading(),
            });
            self.preview_pending_call(&chunk.id, &pending).await;
        }
    }

    /// The server ran a tool: refresh listings, and a matching preview is now
    /// the document's committed content.
    fn handle_tool_result(&mut self, result: ToolResultEvent) {
        self.emit(SessionUpdate::RefreshFileTree);

        let Some(tool_call_id) = result.tool_call_id.as_deref() else {
            return;
        };
        let Some(executed) = self.previews.confirm_call(&mut self.workspace, tool_call_id) else {
            return;
        };
        tracing::debug!(document_id = %executed.document_id, tool_call_id, "tool result committed preview");
        if executed.still_staged {
            self.emit(SessionUpdate::PreviewStaged {
                tool_call_id: self
                    .previews
                    .get(&executed.document_id)
                    .and_then(|preview| preview.tool_call_id())
                    .map(str::to_string),
                document_id: executed.document_id,
            });
        } else {
            self.emit(SessionUpdate::PreviewCleared {
                document_id: executed.document_id,
                committed: true,
            });
        }
    }

    /// Freezes the message being streamed and records its text in the
    /// conversation history.
    pub(super) fn finish_current_message(&mut self) {
        let Some(message) = self.ai_messages.last_mut() else {
            return;
        };
        if message.is_finished() {
            return;
        }
        message.finish();
        let message_id = message.id().to_string();
        let content = message.content().to_string();
        if !content.is_empty() {
            self.api_messages.push(ApiMessage::assistant(content));
        }
        self.emit(SessionUpdate::MessageFinished { message_id });
    }
}
