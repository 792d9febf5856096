use std::sync::Arc;

use super::llm::LanguageModel;
use super::openai::{OpenAiModel, OPENAI_API_BASE};
use crate::error::ConversationError;
use crate::types::LanguageSettings;

pub const API_KEY_FIELD: &str = "API Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageKind {
    OpenAi,
}

impl LanguageKind {
    pub fn all() -> Vec<Self> {
        vec![LanguageKind::OpenAi]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageKind::OpenAi => "Open AI",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.name() == name)
    }

    pub fn default_settings(&self) -> LanguageSettings {
        match self {
            LanguageKind::OpenAi => LanguageSettings {
                name: self.name().to_string(),
                description: "Natural Language Processing using OpenAI's API.".to_string(),
                fields: [(API_KEY_FIELD.to_string(), String::new())].into_iter().collect(),
            },
        }
    }
}

pub fn default_languages() -> Vec<LanguageSettings> {
    LanguageKind::all()
        .iter()
        .map(LanguageKind::default_settings)
        .collect()
}

/// Builds the language model collaborator for one request.
pub trait LanguageModelFactory: Send + Sync {
    fn create(&self, settings: &LanguageSettings) -> Result<Arc<dyn LanguageModel>, ConversationError>;
}

/// Resolves language settings against the built-in languages.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    fallback_api_key: Option<String>,
    openai_base_url: String,
}

impl LanguageRegistry {
    pub fn new(fallback_api_key: Option<String>) -> Self {
        Self {
            fallback_api_key,
            openai_base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_openai_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.openai_base_url = base_url.into();
        self
    }

    /// The request's key wins over the configured one; blanks count as unset.
    pub fn api_key(&self, settings: &LanguageSettings) -> Option<String> {
        settings
            .fields
            .get(API_KEY_FIELD)
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.fallback_api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
            })
    }
}

impl LanguageModelFactory for LanguageRegistry {
    fn create(&self, settings: &LanguageSettings) -> Result<Arc<dyn LanguageModel>, ConversationError> {
        let kind = LanguageKind::from_name(&settings.name)
            .ok_or_else(|| ConversationError::UnknownLanguage(settings.name.clone()))?;
        let api_key = self
            .api_key(settings)
            .ok_or_else(|| ConversationError::MissingApiKey(settings.name.clone()))?;

        match kind {
            LanguageKind::OpenAi => Ok(Arc::new(
                OpenAiModel::new(api_key).with_base_url(self.openai_base_url.clone()),
            )),
        }
    }
}
