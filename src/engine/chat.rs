use log::{error, info};
use std::sync::Arc;

use super::conversation::{Conversation, ConversationOutcome};
use crate::capabilities::CapabilitySet;
use crate::config::ChatConfiguration;
use crate::devices::{DeviceContext, DeviceTransport, DeviceType};
use crate::error::ConversationError;
use crate::plugins::{select_plugins, PluginContext, PluginServices};
use crate::providers::LanguageModelFactory;
use crate::types::{BotMessage, ChatRequest};

/// Long-lived collaborators shared by every chat request.
#[derive(Clone)]
pub struct ChatServices {
    pub chat: ChatConfiguration,
    pub transport: Arc<dyn DeviceTransport>,
    pub plugins: PluginServices,
    pub languages: Arc<dyn LanguageModelFactory>,
}

/// One chat request's language, device and plugin capabilities, assembled.
pub struct ChatCore {
    conversation: Conversation,
}

impl ChatCore {
    pub fn new(services: &ChatServices, request: &ChatRequest) -> Result<Self, ConversationError> {
        let model = services.languages.create(&request.language_settings)?;

        let device_name = &request.network_settings.device_type;
        let device_type = DeviceType::from_vendor_name(device_name)
            .ok_or_else(|| ConversationError::UnknownDeviceType(device_name.clone()))?;
        let context = DeviceContext::new(request.network_settings.clone(), services.transport.clone())
            .map_err(ConversationError::Setup)?;

        let mut capabilities = CapabilitySet::new();
        capabilities.extend(device_type.bind(context).map_err(ConversationError::Setup)?);

        for (kind, settings) in select_plugins(request.plugin_list.as_ref()) {
            let context = PluginContext {
                settings,
                services: services.plugins.clone(),
            };
            capabilities.extend(kind.bind(context).map_err(ConversationError::Setup)?);
        }

        info!(
            "Prepared {} for {} with functions [{}]",
            request.language_settings.name,
            device_type.vendor_name(),
            capabilities.names().join(", ")
        );

        let conversation = Conversation::new(model, capabilities, services.chat.clone())
            .with_aliases(request.aliases.clone());
        Ok(Self { conversation })
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        self.conversation.capabilities()
    }

    pub async fn run(&self, request: &ChatRequest) -> Result<ConversationOutcome, ConversationError> {
        self.conversation.run(&request.message_history).await
    }
}

/// Answers one chat request. Every failure becomes a single error section.
pub async fn process_message(services: &ChatServices, request: &ChatRequest) -> BotMessage {
    let outcome = match ChatCore::new(services, request) {
        Ok(core) => core.run(request).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => BotMessage::answer(outcome.function_outputs, outcome.final_text),
        Err(e) => {
            error!("Chat request failed: {}", e);
            BotMessage::error(e.user_message())
        }
    }
}
