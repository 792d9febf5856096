use log::{error, info};
use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::capabilities::CapabilitySet;
use crate::config::ChatConfiguration;
use crate::error::ConversationError;
use crate::providers::{ChatMessage, CompletionRequest, LanguageModel, ModelReply};
use crate::types::{Alias, Message, Sender};

/// Model calls allowed per chat request: one that may call a function,
/// one that must answer.
pub const MAX_MODEL_CALLS: usize = 2;

/// Result of one completed request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOutcome {
    /// Raw output of every executed function, in execution order.
    pub function_outputs: Vec<String>,
    pub final_text: String,
}

/// Drives the model through one request cycle over a fixed capability set.
pub struct Conversation {
    model: Arc<dyn LanguageModel>,
    capabilities: CapabilitySet,
    chat: ChatConfiguration,
    aliases: Vec<Alias>,
}

impl Conversation {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        capabilities: CapabilitySet,
        chat: ChatConfiguration,
    ) -> Self {
        Self {
            model,
            capabilities,
            chat,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<Alias>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = self.chat.prompt.clone();
        for alias in &self.aliases {
            prompt.push_str(&format!("\n\"{}\" refers to \"{}\".", alias.name, alias.value));
        }
        prompt
    }

    fn request(&self, history: &[ChatMessage], offer_functions: bool) -> CompletionRequest {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::system(self.system_prompt()));

        CompletionRequest {
            model: self.chat.model.clone(),
            messages,
            functions: if offer_functions {
                self.capabilities.wire_schemas()
            } else {
                Vec::new()
            },
            max_tokens: Some(self.chat.max_tokens),
            temperature: Some(self.chat.temperature),
            top_p: Some(self.chat.top_p),
        }
    }

    /// Runs the cycle for `history`. Only the first model call is offered
    /// functions, so at most one function executes.
    pub async fn run(&self, history: &[Message]) -> Result<ConversationOutcome, ConversationError> {
        let mut messages: Vec<ChatMessage> = history.iter().map(to_chat_message).collect();
        let mut function_outputs = Vec::new();

        for round in 0..MAX_MODEL_CALLS {
            let request = self.request(&messages, round == 0);
            let offered: Vec<&str> = request.functions.iter().map(|f| f.name.as_str()).collect();
            info!(
                "Model call {} with {} messages, functions: [{}]",
                round + 1,
                request.messages.len(),
                offered.join(", ")
            );

            let reply = self.model.complete(&request).await.map_err(|e| {
                error!("Model call {} failed: {}", round + 1, e);
                ConversationError::from(e)
            })?;

            let call = match reply {
                ModelReply::Text(final_text) => {
                    info!(
                        "Model answered after {} function call(s)",
                        function_outputs.len()
                    );
                    return Ok(ConversationOutcome {
                        function_outputs,
                        final_text,
                    });
                }
                ModelReply::FunctionCall(call) => call,
            };

            info!("Model requested {}({})", call.name, call.arguments);
            if !offered.contains(&call.name.as_str()) {
                error!("Function {} was not offered in this round", call.name);
                return Err(ConversationError::UnknownFunction(call.name));
            }
            let capability = self
                .capabilities
                .get(&call.name)
                .ok_or_else(|| ConversationError::UnknownFunction(call.name.clone()))?;

            let output = capability.invoke(&call.arguments).await.map_err(|e| {
                error!("Function {} failed: {}", call.name, e);
                ConversationError::from(e)
            })?;

            let name = call.name.clone();
            messages.push(ChatMessage::function_request(call));
            messages.push(ChatMessage::function_result(name, compact_whitespace(&output)));
            function_outputs.push(output);
        }

        Err(ConversationError::RoundLimitExceeded(MAX_MODEL_CALLS))
    }
}

pub fn to_chat_message(message: &Message) -> ChatMessage {
    match message.sender {
        Sender::User => ChatMessage::user(message.flattened()),
        Sender::Assistant => ChatMessage::assistant(message.flattened()),
    }
}

/// Collapses newline runs and space runs to save tokens.
pub fn compact_whitespace(text: &str) -> String {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    let (newlines, spaces) = PATTERNS.get_or_init(|| {
        (
            Regex::new(r"\n+").expect("newline pattern must compile"),
            Regex::new(r" +").expect("space pattern must compile"),
        )
    });
    let text = newlines.replace_all(text, "\n");
    spaces.replace_all(&text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{bind_provider, Provider};
    use crate::devices::testing::{context, CannedTransport};
    use crate::devices::CiscoIosPlatform;
    use crate::error::{CapabilityError, LanguageApiError};
    use crate::providers::{Role, ScriptedLanguageModel};
    use crate::types::MessageSection;

    fn ios_capabilities(transport: CannedTransport) -> CapabilitySet {
        let platform =
            CiscoIosPlatform::construct(context("Cisco IOS", Arc::new(transport))).unwrap();
        bind_provider(platform).into_iter().collect()
    }

    fn conversation(model: Arc<ScriptedLanguageModel>, capabilities: CapabilitySet) -> Conversation {
        let chat = ChatConfiguration {
            prompt: "You are a network assistant.".to_string(),
            ..ChatConfiguration::default()
        };
        Conversation::new(model, capabilities, chat)
    }

    #[test]
    fn test_compact_whitespace() {
        assert_eq!(compact_whitespace("a\n\n\nb    c"), "a\nb c");
        assert_eq!(compact_whitespace("plain"), "plain");
    }

    #[test]
    fn test_system_prompt_includes_aliases() {
        let model = Arc::new(ScriptedLanguageModel::new());
        let conversation = conversation(model, CapabilitySet::new()).with_aliases(vec![Alias {
            name: "core".to_string(),
            value: "r1.lab".to_string(),
        }]);
        assert_eq!(
            conversation.system_prompt(),
            "You are a network assistant.\n\"core\" refers to \"r1.lab\"."
        );
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_in_one_call() {
        let model = Arc::new(ScriptedLanguageModel::new().then_text("Hello!"));
        let outcome = conversation(model.clone(), ios_capabilities(CannedTransport::default()))
            .run(&[Message::user("hi")])
            .await
            .unwrap();

        assert!(outcome.function_outputs.is_empty());
        assert_eq!(outcome.final_text, "Hello!");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].functions.len(), 2);
        let roles: Vec<Role> = requests[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::System]);
    }

    #[tokio::test]
    async fn test_function_result_folded_into_history() {
        let transport = CannedTransport::default().reply("r1", "show clock", "10:00    UTC\n\n\nMon");
        let model = Arc::new(
            ScriptedLanguageModel::new()
                .then_call("execute_command", r#"{"hostnames": ["r1"], "command": "show clock"}"#)
                .then_text("It is 10:00 UTC."),
        );

        let outcome = conversation(model.clone(), ios_capabilities(transport))
            .run(&[Message::user("what time is it on r1?")])
            .await
            .unwrap();

        assert_eq!(
            outcome.function_outputs,
            vec![r#"{"r1":{"command":"show clock","output":"10:00    UTC\n\n\nMon"}}"#]
        );
        assert_eq!(outcome.final_text, "It is 10:00 UTC.");

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].functions.is_empty());
        let folded = &requests[1].messages[2];
        assert_eq!(folded.role, Role::Function);
        assert_eq!(folded.name.as_deref(), Some("execute_command"));
        assert!(folded.content.contains(r#"10:00 UTC\n\n\nMon"#));
        assert_eq!(requests[1].messages.last().unwrap().role, Role::System);
    }

    #[tokio::test]
    async fn test_second_function_call_is_refused() {
        let model = Arc::new(
            ScriptedLanguageModel::new()
                .then_call("get_lldp_neighbors", r#"{"hostnames": ["r1"]}"#)
                .then_call("get_lldp_neighbors", r#"{"hostnames": ["r2"]}"#),
        );

        let err = conversation(model.clone(), ios_capabilities(CannedTransport::default()))
            .run(&[Message::user("neighbors?")])
            .await
            .unwrap_err();

        assert!(matches!(err, ConversationError::UnknownFunction(ref n) if n == "get_lldp_neighbors"));
        assert!(model.requests()[1].functions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_abort_cycle() {
        let model = Arc::new(ScriptedLanguageModel::new().then_call("execute_command", "{not json"));

        let err = conversation(model.clone(), ios_capabilities(CannedTransport::default()))
            .run(&[Message::user("run it")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConversationError::Capability(CapabilityError::ArgumentParse { .. })
        ));
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_is_terminal() {
        let model = Arc::new(ScriptedLanguageModel::new().then_error(LanguageApiError::OutOfTokens));

        let err = conversation(model, CapabilitySet::new())
            .run(&[Message::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConversationError::LanguageApi(LanguageApiError::OutOfTokens)
        ));
    }

    #[test]
    fn test_history_flattening() {
        let message = Message {
            sender: Sender::Assistant,
            sections: vec![
                MessageSection::new(crate::types::SectionKind::Code, "{\"r1\": \"up\"}"),
                MessageSection::new(crate::types::SectionKind::Text, "r1 is up."),
            ],
            timestamp: 0,
        };
        let chat = to_chat_message(&message);
        assert_eq!(chat.role, Role::Assistant);
        assert_eq!(chat.content, "{\"r1\": \"up\"}\nr1 is up.");
    }
}
