mod api;

pub use api::{
    ApiMessage, ApprovalChoice, ApprovalRequest, InterruptDescriptor, MessageChunk, StreamEvent,
    ToolCallChunk, ToolResultEvent,
};
