use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("document {0} is still loading; seed it before editing")]
    NotLoaded(String),
    #[error("unknown tab bar: {0}")]
    UnknownTabBar(String),
    #[error("document {document_id} is not open in tab bar {tab_bar_id}")]
    NotInTabBar {
        tab_bar_id: String,
        document_id: String,
    },
    #[error("tab index {index} out of range for tab bar {tab_bar_id} ({len} tabs)")]
    IndexOutOfRange {
        tab_bar_id: String,
        index: usize,
        len: usize,
    },
    #[error("document {0} already exists")]
    AlreadyExists(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("tool {0} does not edit files")]
    UnsupportedTool(String),
    #[error("{tool} is missing argument '{argument}'")]
    MissingArgument {
        tool: &'static str,
        argument: &'static str,
    },
    #[error("invalid argument '{argument}' for {tool}: {reason}")]
    InvalidArgument {
        tool: &'static str,
        argument: &'static str,
        reason: String,
    },
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("a turn is already running")]
    Busy,
    #[error("no turn is streaming")]
    NotStreaming,
    #[error("interrupt {incoming} arrived while {active} is still pending")]
    AlreadyPaused { active: String, incoming: String },
    #[error("no interrupt is pending")]
    NotPaused,
}
