pub mod languages;
pub mod llm;
pub mod openai;

pub use languages::{
    default_languages, LanguageKind, LanguageModelFactory, LanguageRegistry, API_KEY_FIELD,
};
pub use llm::{
    ChatMessage, CompletionRequest, FunctionCall, LanguageModel, ModelReply, Role,
    ScriptedLanguageModel,
};
pub use openai::OpenAiModel;
