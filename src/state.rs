pub mod content_store;
mod conversation;
pub mod interrupt;
pub mod message;
pub mod tab_bars;
pub mod workspace;

pub use content_store::ContentStore;
pub use conversation::{ConversationManager, SessionUpdate};
pub use interrupt::{Interrupt, InterruptCoordinator, TurnState};
pub use message::AiMessage;
pub use tab_bars::{TabBar, TabBarRegistry, MAIN_TAB_BAR_ID};
pub use workspace::Workspace;
