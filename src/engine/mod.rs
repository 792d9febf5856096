pub mod chat;
pub mod conversation;

pub use chat::{process_message, ChatCore, ChatServices};
pub use conversation::{Conversation, ConversationOutcome, MAX_MODEL_CALLS};
