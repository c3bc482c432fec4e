use crate::tools::assembler::{PendingToolCall, ToolCall, ToolCallAssembler};
use crate::types::ToolCallChunk;

/// One assistant message, mutated in place while its chunks stream in.
#[derive(Debug)]
pub struct AiMessage {
    id: String,
    content: String,
    assembler: ToolCallAssembler,
    tool_calls: Vec<ToolCall>,
    finished: bool,
}

impl AiMessage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            assembler: ToolCallAssembler::new(),
            tool_calls: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tool calls as they stand: the finalized list once finished, otherwise
    /// nothing (use [`AiMessage::pending_tool_calls`] while streaming).
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn pending_tool_calls(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.assembler.calls()
    }

    /// Appends one streamed text delta as-is; repeated text is kept.
    pub fn append_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub fn push_tool_call_chunk(&mut self, chunk: &ToolCallChunk) -> &PendingToolCall {
        self.assembler.push(chunk)
    }

    /// Freezes the message. Idempotent.
    pub fn finish(&mut self) -> &[ToolCall] {
        if !self.finished {
            self.tool_calls = self.assembler.finalize();
            self.finished = true;
        }
        &self.tool_calls
    }
}
