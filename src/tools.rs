pub mod assembler;
pub mod edits;

pub use assembler::{parse_partial_args, ParsedArgs, PendingToolCall, ToolCall, ToolCallAssembler};
pub use edits::{FileEdit, LineEdit};
