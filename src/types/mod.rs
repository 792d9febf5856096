pub mod message;
pub mod settings;

pub use message::{BotMessage, Message, MessageSection, SectionKind, Sender};
pub use settings::{
    Alias, ChatRequest, LanguageSettings, LanguageSettingsBatch, NetworkSettings, Options,
    PluginList, PluginSettings,
};
