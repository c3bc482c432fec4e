mod core;
mod documents;
mod previews;
mod state;
mod streaming;


pub use state::{ConversationManager, SessionUpdate};
