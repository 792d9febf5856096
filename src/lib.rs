pub mod api;
pub mod capabilities;
pub mod config;
pub mod devices;
pub mod engine;
pub mod error;
pub mod plugins;
pub mod providers;
pub mod types;

pub use config::Config;
pub use error::{CapabilityError, ConversationError, LanguageApiError};
pub use types::*;
